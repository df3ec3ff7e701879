//! Create `staff` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Staff::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Staff::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Staff::Username)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Staff::FullName).string_len(256).not_null())
                    .col(ColumnDef::new(Staff::Email).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Staff::Role)
                            .string_len(32)
                            .not_null()
                            .default("registrar"),
                    )
                    .col(ColumnDef::new(Staff::ApiToken).string_len(64).unique_key())
                    .col(
                        ColumnDef::new(Staff::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Staff::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Staff {
    Table,
    Id,
    Username,
    FullName,
    Email,
    Role,
    ApiToken,
    CreatedAt,
}
