//! Staff entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Staff model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "staff")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub username: String,
    pub full_name: String,
    pub email: String,
    /// Free-form role label (e.g. `registrar`, `admin`).
    pub role: String,
    #[serde(skip_serializing)]
    #[sea_orm(unique)]
    pub api_token: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
