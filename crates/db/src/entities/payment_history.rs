//! Payment history entity.
//!
//! One row per payment attempt (slip submission).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment channel chosen by the student.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "qr_payment")]
    QrPayment,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
}

/// Status of a single payment attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum PaymentRecordStatus {
    #[sea_orm(string_value = "pending_verification")]
    #[default]
    PendingVerification,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Payment history model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_id: i64,
    /// Equals the request's `total_fee` when created.
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_reference: String,
    pub payment_date: Date,
    pub payment_status: PaymentRecordStatus,
    pub transaction_id: Option<String>,
    /// Staff member who verified the payment.
    pub updated_by: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document_request::Entity",
        from = "Column::RequestId",
        to = "super::document_request::Column::Id"
    )]
    DocumentRequest,
    #[sea_orm(has_many = "super::payment_status_history::Entity")]
    StatusHistory,
}

impl Related<super::document_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DocumentRequest.def()
    }
}

impl Related<super::payment_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
