//! Request status history entity.
//!
//! Append-only audit trail; the newest row always mirrors the request status.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::document_request::RequestStatus;

/// Status history model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "request_status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_id: i64,
    pub status: RequestStatus,
    pub notes: Option<String>,
    /// Student or staff id depending on `created_by_staff`.
    pub created_by: i64,
    pub created_by_staff: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document_request::Entity",
        from = "Column::RequestId",
        to = "super::document_request::Column::Id"
    )]
    DocumentRequest,
}

impl Related<super::document_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DocumentRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
