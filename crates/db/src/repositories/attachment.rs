//! Request attachment repository.

use std::sync::Arc;

use crate::entities::{request_attachment, RequestAttachment};
use docreq_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder};

/// Attachment repository for database operations.
#[derive(Clone)]
pub struct AttachmentRepository {
    db: Arc<DatabaseConnection>,
}

impl AttachmentRepository {
    /// Create a new attachment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get an attachment by ID.
    pub async fn get_by_id(&self, id: i64) -> AppResult<request_attachment::Model> {
        RequestAttachment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Attachment {id} not found")))
    }

    /// Get all attachments of a request, oldest first.
    pub async fn find_by_request(
        &self,
        request_id: i64,
    ) -> AppResult<Vec<request_attachment::Model>> {
        RequestAttachment::find()
            .filter(request_attachment::Column::RequestId.eq(request_id))
            .order_by_asc(request_attachment::Column::CreatedAt)
            .order_by_asc(request_attachment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an attachment record.
    pub async fn delete(&self, attachment: request_attachment::Model) -> AppResult<()> {
        attachment
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
