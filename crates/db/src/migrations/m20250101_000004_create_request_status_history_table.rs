//! Create `request_status_history` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RequestStatusHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RequestStatusHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RequestStatusHistory::RequestId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestStatusHistory::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RequestStatusHistory::Notes).text())
                    .col(
                        ColumnDef::new(RequestStatusHistory::CreatedBy)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestStatusHistory::CreatedByStaff)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(RequestStatusHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_request_status_history_request")
                            .from(RequestStatusHistory::Table, RequestStatusHistory::RequestId)
                            .to(DocumentRequests::Table, DocumentRequests::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (request_id, created_at) for newest-first history reads
        manager
            .create_index(
                Index::create()
                    .name("idx_request_status_history_request_created")
                    .table(RequestStatusHistory::Table)
                    .col(RequestStatusHistory::RequestId)
                    .col(RequestStatusHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RequestStatusHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RequestStatusHistory {
    Table,
    Id,
    RequestId,
    Status,
    Notes,
    CreatedBy,
    CreatedByStaff,
    CreatedAt,
}

#[derive(Iden)]
enum DocumentRequests {
    Table,
    Id,
}
