//! Student entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Student model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// University-issued student number.
    #[sea_orm(unique)]
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub faculty: Option<String>,
    pub major: Option<String>,
    /// Contact address kept on the profile.
    pub address: Option<String>,
    /// Bearer token used by the API.
    #[serde(skip_serializing)]
    #[sea_orm(unique)]
    pub api_token: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::document_request::Entity")]
    DocumentRequest,
}

impl Related<super::document_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DocumentRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Full display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
