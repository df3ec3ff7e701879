//! Request attachment entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Purpose of an attached file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    #[sea_orm(string_value = "payment_slip")]
    PaymentSlip,
    #[sea_orm(string_value = "digital_document")]
    DigitalDocument,
    #[sea_orm(string_value = "supporting_document")]
    SupportingDocument,
}

/// Request attachment model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "request_attachments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_id: i64,
    /// Generated file name.
    pub file_name: String,
    /// Storage key relative to the upload root.
    pub file_path: String,
    /// MIME type.
    pub file_type: String,
    pub original_name: String,
    /// MD5 hex digest of the stored contents.
    pub md5: String,
    pub attachment_type: AttachmentType,
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
