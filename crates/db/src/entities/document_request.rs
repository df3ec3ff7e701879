//! Document request entity.
//!
//! The aggregate root of the request lifecycle. Rows are never deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::payment_history::PaymentMethod;

/// Kind of official document requested.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[sea_orm(string_value = "transcript")]
    Transcript,
    #[sea_orm(string_value = "certificate")]
    Certificate,
    #[sea_orm(string_value = "graduation")]
    Graduation,
    #[sea_orm(string_value = "enrollment")]
    Enrollment,
    #[sea_orm(string_value = "general")]
    General,
}

/// How the finished document reaches the student.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    #[sea_orm(string_value = "pickup")]
    Pickup,
    #[sea_orm(string_value = "postal")]
    Postal,
    #[sea_orm(string_value = "digital")]
    Digital,
}

/// Payment state tracked on the request itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum PaymentStatus {
    #[sea_orm(string_value = "not_required")]
    NotRequired,
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "pending_verification")]
    PendingVerification,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Lifecycle status of a request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum RequestStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "awaiting_payment")]
    AwaitingPayment,
    #[sea_orm(string_value = "awaiting_verification")]
    AwaitingVerification,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "preparing")]
    Preparing,
    #[sea_orm(string_value = "ready_for_pickup")]
    ReadyForPickup,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "need_more_info")]
    NeedMoreInfo,
}

impl RequestStatus {
    /// Whether no further transition may leave this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Whether the owning student may still cancel.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::AwaitingVerification | Self::AwaitingPayment
        )
    }

    /// Stored string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingPayment => "awaiting_payment",
            Self::AwaitingVerification => "awaiting_verification",
            Self::Processing => "processing",
            Self::Preparing => "preparing",
            Self::ReadyForPickup => "ready_for_pickup",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::NeedMoreInfo => "need_more_info",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document request model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning student.
    pub student_id: i64,
    /// Human-facing reference (`REQ` + YYMMDD + 4 digits).
    #[sea_orm(unique)]
    pub reference: String,
    pub document_type: DocumentType,
    pub copies: i32,
    pub purpose: String,
    pub delivery_method: DeliveryMethod,
    /// Present iff `delivery_method` is postal.
    pub delivery_address: Option<String>,
    pub document_fee: i64,
    pub shipping_fee: i64,
    /// Always `document_fee + shipping_fee`.
    pub total_fee: i64,
    pub payment_status: PaymentStatus,
    pub status: RequestStatus,
    pub tracking_number: Option<String>,
    pub delivery_date: Option<Date>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub payment_date: Option<Date>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
    #[sea_orm(has_many = "super::request_status_history::Entity")]
    StatusHistory,
    #[sea_orm(has_many = "super::payment_history::Entity")]
    Payment,
    #[sea_orm(has_many = "super::request_attachment::Entity")]
    Attachment,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::request_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::payment_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl Related<super::request_attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = RequestStatus::iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![
                RequestStatus::Completed,
                RequestStatus::Rejected,
                RequestStatus::Cancelled
            ]
        );
    }

    #[test]
    fn test_as_str_matches_stored_value() {
        for status in RequestStatus::iter() {
            assert_eq!(status.as_str(), status.to_value());
        }
    }
}
