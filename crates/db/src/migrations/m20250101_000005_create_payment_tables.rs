//! Create `payment_history` and `payment_status_history` tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentHistory::RequestId).big_integer().not_null())
                    .col(ColumnDef::new(PaymentHistory::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(PaymentHistory::PaymentMethod)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentHistory::PaymentReference)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentHistory::PaymentDate).date().not_null())
                    .col(
                        ColumnDef::new(PaymentHistory::PaymentStatus)
                            .string_len(32)
                            .not_null()
                            .default("pending_verification"),
                    )
                    .col(ColumnDef::new(PaymentHistory::TransactionId).string_len(128))
                    .col(ColumnDef::new(PaymentHistory::UpdatedBy).big_integer())
                    .col(
                        ColumnDef::new(PaymentHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(PaymentHistory::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_history_request")
                            .from(PaymentHistory::Table, PaymentHistory::RequestId)
                            .to(DocumentRequests::Table, DocumentRequests::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_history_request_id")
                    .table(PaymentHistory::Table)
                    .col(PaymentHistory::RequestId)
                    .to_owned(),
            )
            .await?;

        // At most one attempt awaiting verification per request
        manager
            .get_connection()
            .execute_unprepared(
                r"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_payment_history_one_pending
                ON payment_history (request_id)
                WHERE payment_status = 'pending_verification';
                ",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaymentStatusHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentStatusHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentStatusHistory::PaymentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentStatusHistory::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentStatusHistory::Notes).text())
                    .col(
                        ColumnDef::new(PaymentStatusHistory::CreatedBy)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentStatusHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_status_history_payment")
                            .from(PaymentStatusHistory::Table, PaymentStatusHistory::PaymentId)
                            .to(PaymentHistory::Table, PaymentHistory::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_status_history_payment_id")
                    .table(PaymentStatusHistory::Table)
                    .col(PaymentStatusHistory::PaymentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentStatusHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PaymentHistory {
    Table,
    Id,
    RequestId,
    Amount,
    PaymentMethod,
    PaymentReference,
    PaymentDate,
    PaymentStatus,
    TransactionId,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum PaymentStatusHistory {
    Table,
    Id,
    PaymentId,
    Status,
    Notes,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum DocumentRequests {
    Table,
    Id,
}
