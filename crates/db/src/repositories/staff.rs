//! Staff repository.

use std::sync::Arc;

use crate::entities::{staff, Staff};
use docreq_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Staff repository for database operations.
#[derive(Clone)]
pub struct StaffRepository {
    db: Arc<DatabaseConnection>,
}

impl StaffRepository {
    /// Create a new staff repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get a staff member by ID.
    pub async fn get_by_id(&self, id: i64) -> AppResult<staff::Model> {
        Staff::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Staff {id} not found")))
    }

    /// Find a staff member by API token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<staff::Model>> {
        Staff::find()
            .filter(staff::Column::ApiToken.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
