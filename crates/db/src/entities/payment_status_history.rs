//! Payment status history entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::payment_history::PaymentRecordStatus;

/// Payment status history model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub payment_id: i64,
    pub status: PaymentRecordStatus,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payment_history::Entity",
        from = "Column::PaymentId",
        to = "super::payment_history::Column::Id"
    )]
    Payment,
}

impl Related<super::payment_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
