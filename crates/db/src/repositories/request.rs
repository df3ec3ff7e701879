//! Document request repository.
//!
//! Every status mutation goes through [`RequestRepository::append_status`],
//! which performs a conditional update on the status column and writes the
//! history row and any side records in the same transaction.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use docreq_common::{AppError, AppResult};
use sea_orm::{
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set,
    TransactionTrait,
};

use crate::entities::{
    document_request::{self, DocumentType, PaymentStatus, RequestStatus},
    payment_history::{self, PaymentMethod, PaymentRecordStatus},
    payment_status_history, request_attachment, request_status_history, student, DocumentRequest,
    PaymentHistory, RequestStatusHistory,
};

/// Filters for staff request listings.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub document_type: Option<DocumentType>,
    pub payment_status: Option<PaymentStatus>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTimeWithTimeZone>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTimeWithTimeZone>,
    /// Case-insensitive substring of reference, student number or name.
    pub search: Option<String>,
}

/// Who wrote a history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryActor {
    pub id: i64,
    pub is_staff: bool,
}

/// Write against a payment record performed with a status change.
#[derive(Debug, Clone)]
pub enum PaymentWrite {
    /// Insert a new payment attempt.
    Record(payment_history::ActiveModel),
    /// Move a pending attempt to its verified outcome.
    Resolve {
        payment_id: i64,
        status: PaymentRecordStatus,
        notes: Option<String>,
    },
}

/// Payment columns on the request.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub date: Option<NaiveDate>,
    pub write: Option<PaymentWrite>,
}

/// Delivery columns on the request.
#[derive(Debug, Clone)]
pub struct DeliveryUpdate {
    pub tracking_number: String,
    pub delivery_date: NaiveDate,
}

/// A single guarded status transition.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub request_id: i64,
    /// Status the request must still have for the change to apply.
    pub expected: RequestStatus,
    pub next: RequestStatus,
    pub notes: Option<String>,
    pub actor: HistoryActor,
    payment: Option<PaymentUpdate>,
    delivery: Option<DeliveryUpdate>,
    attachments: Vec<request_attachment::ActiveModel>,
}

impl StatusChange {
    /// Create a status change from `expected` to `next`.
    #[must_use]
    pub const fn new(
        request_id: i64,
        expected: RequestStatus,
        next: RequestStatus,
        actor: HistoryActor,
    ) -> Self {
        Self {
            request_id,
            expected,
            next,
            notes: None,
            actor,
            payment: None,
            delivery: None,
            attachments: Vec::new(),
        }
    }

    /// Set the history note.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Attach a file record written in the same transaction.
    #[must_use]
    pub fn with_attachment(mut self, attachment: request_attachment::ActiveModel) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Result of an applied status change.
#[derive(Debug, Clone)]
pub struct AppliedChange {
    /// The request after the change.
    pub request: document_request::Model,
    /// The history row written.
    pub history: request_status_history::Model,
}

/// Document request repository for database operations.
#[derive(Clone)]
pub struct RequestRepository {
    db: Arc<DatabaseConnection>,
}

impl RequestRepository {
    /// Create a new request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a request with its initial history row and attachments.
    pub async fn create(
        &self,
        request: document_request::ActiveModel,
        notes: Option<String>,
        actor: HistoryActor,
        attachments: Vec<request_attachment::ActiveModel>,
    ) -> AppResult<document_request::Model> {
        let txn = self.begin().await?;

        let model = request.insert(&txn).await.map_err(db_err)?;

        for mut attachment in attachments {
            attachment.request_id = Set(model.id);
            attachment.insert(&txn).await.map_err(db_err)?;
        }

        insert_history(&txn, model.id, model.status, notes, actor).await?;

        txn.commit().await.map_err(db_err)?;

        tracing::info!(request_id = model.id, reference = %model.reference, "Request created");
        Ok(model)
    }

    /// Get a request by ID.
    pub async fn get_by_id(&self, id: i64) -> AppResult<document_request::Model> {
        DocumentRequest::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound(format!("Request {id} not found")))
    }

    /// Find a request by its reference.
    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> AppResult<Option<document_request::Model>> {
        DocumentRequest::find()
            .filter(document_request::Column::Reference.eq(reference))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Check whether a reference is already taken.
    pub async fn reference_exists(&self, reference: &str) -> AppResult<bool> {
        Ok(self.find_by_reference(reference).await?.is_some())
    }

    /// Get all requests of a student, newest first.
    pub async fn find_by_student(&self, student_id: i64) -> AppResult<Vec<document_request::Model>> {
        DocumentRequest::find()
            .filter(document_request::Column::StudentId.eq(student_id))
            .order_by_desc(document_request::Column::CreatedAt)
            .order_by_desc(document_request::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a page of requests matching the filter, newest first.
    pub async fn find_all(
        &self,
        filter: &RequestFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<document_request::Model>> {
        apply_filter(DocumentRequest::find(), filter)
            .order_by_desc(document_request::Column::CreatedAt)
            .order_by_desc(document_request::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Count requests matching the filter.
    pub async fn count(&self, filter: &RequestFilter) -> AppResult<u64> {
        apply_filter(DocumentRequest::find(), filter)
            .count(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get the status history of a request, newest first.
    pub async fn status_history(
        &self,
        request_id: i64,
    ) -> AppResult<Vec<request_status_history::Model>> {
        RequestStatusHistory::find()
            .filter(request_status_history::Column::RequestId.eq(request_id))
            .order_by_desc(request_status_history::Column::CreatedAt)
            .order_by_desc(request_status_history::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Apply a guarded status change.
    ///
    /// Fails with [`AppError::Conflict`] when the request no longer has
    /// `change.expected` as its status; nothing is written in that case.
    pub async fn append_status(&self, change: StatusChange) -> AppResult<AppliedChange> {
        let txn = self.begin().await?;
        let now = Utc::now();

        let mut update = DocumentRequest::update_many()
            .col_expr(document_request::Column::Status, Expr::value(change.next))
            .col_expr(document_request::Column::UpdatedAt, Expr::value(now))
            .filter(document_request::Column::Id.eq(change.request_id))
            .filter(document_request::Column::Status.eq(change.expected));

        if change.next == RequestStatus::Completed {
            update = update.col_expr(document_request::Column::CompletedAt, Expr::value(now));
        }

        if let Some(payment) = &change.payment {
            update = update.col_expr(
                document_request::Column::PaymentStatus,
                Expr::value(payment.status),
            );
            if let Some(method) = payment.method {
                update = update.col_expr(document_request::Column::PaymentMethod, Expr::value(method));
            }
            if let Some(reference) = &payment.reference {
                update = update.col_expr(
                    document_request::Column::PaymentReference,
                    Expr::value(reference.clone()),
                );
            }
            if let Some(date) = payment.date {
                update = update.col_expr(document_request::Column::PaymentDate, Expr::value(date));
            }
        }

        if let Some(delivery) = &change.delivery {
            update = update
                .col_expr(
                    document_request::Column::TrackingNumber,
                    Expr::value(delivery.tracking_number.clone()),
                )
                .col_expr(
                    document_request::Column::DeliveryDate,
                    Expr::value(delivery.delivery_date),
                );
        }

        let result = update.exec(&txn).await.map_err(db_err)?;
        if result.rows_affected == 0 {
            txn.rollback().await.map_err(db_err)?;
            tracing::warn!(
                request_id = change.request_id,
                expected = %change.expected,
                next = %change.next,
                "Status changed concurrently"
            );
            return Err(AppError::Conflict(format!(
                "Request {} is no longer {}",
                change.request_id, change.expected
            )));
        }

        if let Some(write) = change.payment.and_then(|p| p.write) {
            apply_payment_write(&txn, change.request_id, write, change.actor).await?;
        }

        for mut attachment in change.attachments {
            attachment.request_id = Set(change.request_id);
            attachment.insert(&txn).await.map_err(db_err)?;
        }

        let history =
            insert_history(&txn, change.request_id, change.next, change.notes, change.actor)
                .await?;

        let request = DocumentRequest::find_by_id(change.request_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", change.request_id)))?;

        txn.commit().await.map_err(db_err)?;

        tracing::info!(
            request_id = change.request_id,
            from = %change.expected,
            to = %change.next,
            actor_id = change.actor.id,
            "Request status changed"
        );

        Ok(AppliedChange { request, history })
    }

    /// Apply a status change that also updates the payment columns.
    pub async fn update_payment(
        &self,
        mut change: StatusChange,
        payment: PaymentUpdate,
    ) -> AppResult<AppliedChange> {
        change.payment = Some(payment);
        self.append_status(change).await
    }

    /// Apply a status change that also records delivery details.
    pub async fn update_delivery(
        &self,
        mut change: StatusChange,
        delivery: DeliveryUpdate,
    ) -> AppResult<AppliedChange> {
        change.delivery = Some(delivery);
        self.append_status(change).await
    }

    /// Cancel a request on behalf of its student.
    pub async fn cancel(
        &self,
        request_id: i64,
        expected: RequestStatus,
        student_id: i64,
        reason: Option<String>,
    ) -> AppResult<AppliedChange> {
        let mut change = StatusChange::new(
            request_id,
            expected,
            RequestStatus::Cancelled,
            HistoryActor {
                id: student_id,
                is_staff: false,
            },
        );
        change.notes = reason;
        self.append_status(change).await
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db.begin().await.map_err(db_err)
    }
}

fn db_err(e: sea_orm::DbErr) -> AppError {
    AppError::Database(e.to_string())
}

fn apply_filter(
    mut query: Select<DocumentRequest>,
    filter: &RequestFilter,
) -> Select<DocumentRequest> {
    if let Some(status) = filter.status {
        query = query.filter(document_request::Column::Status.eq(status));
    }
    if let Some(document_type) = filter.document_type {
        query = query.filter(document_request::Column::DocumentType.eq(document_type));
    }
    if let Some(payment_status) = filter.payment_status {
        query = query.filter(document_request::Column::PaymentStatus.eq(payment_status));
    }
    if let Some(from) = filter.created_from {
        query = query.filter(document_request::Column::CreatedAt.gte(from));
    }
    if let Some(before) = filter.created_before {
        query = query.filter(document_request::Column::CreatedAt.lt(before));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        let lower = |col: Expr| Expr::expr(Func::lower(col));

        query = query
            .join(JoinType::InnerJoin, document_request::Relation::Student.def())
            .filter(
                Condition::any()
                    .add(
                        lower(Expr::col((DocumentRequest, document_request::Column::Reference)))
                            .like(pattern.clone()),
                    )
                    .add(
                        lower(Expr::col((student::Entity, student::Column::StudentNumber)))
                            .like(pattern.clone()),
                    )
                    .add(
                        lower(Expr::col((student::Entity, student::Column::FirstName)))
                            .like(pattern.clone()),
                    )
                    .add(
                        lower(Expr::col((student::Entity, student::Column::LastName)))
                            .like(pattern),
                    ),
            );
    }
    query
}

pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn insert_history(
    txn: &DatabaseTransaction,
    request_id: i64,
    status: RequestStatus,
    notes: Option<String>,
    actor: HistoryActor,
) -> AppResult<request_status_history::Model> {
    request_status_history::ActiveModel {
        request_id: Set(request_id),
        status: Set(status),
        notes: Set(notes),
        created_by: Set(actor.id),
        created_by_staff: Set(actor.is_staff),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(db_err)
}

async fn apply_payment_write(
    txn: &DatabaseTransaction,
    request_id: i64,
    write: PaymentWrite,
    actor: HistoryActor,
) -> AppResult<()> {
    match write {
        PaymentWrite::Record(mut payment) => {
            payment.request_id = Set(request_id);
            payment.insert(txn).await.map_err(db_err)?;
        }
        PaymentWrite::Resolve {
            payment_id,
            status,
            notes,
        } => {
            let result = PaymentHistory::update_many()
                .col_expr(payment_history::Column::PaymentStatus, Expr::value(status))
                .col_expr(payment_history::Column::UpdatedBy, Expr::value(actor.id))
                .col_expr(payment_history::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(payment_history::Column::Id.eq(payment_id))
                .filter(
                    payment_history::Column::PaymentStatus
                        .eq(PaymentRecordStatus::PendingVerification),
                )
                .exec(txn)
                .await
                .map_err(db_err)?;

            if result.rows_affected == 0 {
                return Err(AppError::Conflict(format!(
                    "Payment {payment_id} is no longer awaiting verification"
                )));
            }

            payment_status_history::ActiveModel {
                payment_id: Set(payment_id),
                status: Set(status),
                notes: Set(notes),
                created_by: Set(actor.id),
                created_at: Set(Utc::now().into()),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(db_err)?;
        }
    }
    Ok(())
}
