//! Payment repository.

use std::sync::Arc;

use crate::entities::{
    payment_history::{self, PaymentRecordStatus},
    payment_status_history, PaymentHistory, PaymentStatusHistory,
};
use docreq_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

/// Payment repository for database operations.
#[derive(Clone)]
pub struct PaymentRepository {
    db: Arc<DatabaseConnection>,
}

impl PaymentRepository {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get all payment attempts of a request, newest first.
    pub async fn find_by_request(&self, request_id: i64) -> AppResult<Vec<payment_history::Model>> {
        PaymentHistory::find()
            .filter(payment_history::Column::RequestId.eq(request_id))
            .order_by_desc(payment_history::Column::CreatedAt)
            .order_by_desc(payment_history::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the attempt currently awaiting verification, if any.
    pub async fn find_pending_by_request(
        &self,
        request_id: i64,
    ) -> AppResult<Option<payment_history::Model>> {
        PaymentHistory::find()
            .filter(payment_history::Column::RequestId.eq(request_id))
            .filter(payment_history::Column::PaymentStatus.eq(PaymentRecordStatus::PendingVerification))
            .order_by_desc(payment_history::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the status history of a payment, newest first.
    pub async fn status_history(
        &self,
        payment_id: i64,
    ) -> AppResult<Vec<payment_status_history::Model>> {
        PaymentStatusHistory::find()
            .filter(payment_status_history::Column::PaymentId.eq(payment_id))
            .order_by_desc(payment_status_history::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
