//! Create `students` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Students::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Students::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Students::StudentNumber)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Students::FirstName).string_len(128).not_null())
                    .col(ColumnDef::new(Students::LastName).string_len(128).not_null())
                    .col(ColumnDef::new(Students::Email).string_len(256).not_null())
                    .col(ColumnDef::new(Students::Phone).string_len(32))
                    .col(ColumnDef::new(Students::Faculty).string_len(128))
                    .col(ColumnDef::new(Students::Major).string_len(128))
                    .col(ColumnDef::new(Students::Address).text())
                    .col(ColumnDef::new(Students::ApiToken).string_len(64).unique_key())
                    .col(
                        ColumnDef::new(Students::CreatedAt)
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
            .drop_table(Table::drop().table(Students::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Students {
    Table,
    Id,
    StudentNumber,
    FirstName,
    LastName,
    Email,
    Phone,
    Faculty,
    Major,
    Address,
    ApiToken,
    CreatedAt,
}
