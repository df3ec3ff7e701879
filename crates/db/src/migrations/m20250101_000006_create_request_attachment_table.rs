//! Create `request_attachments` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RequestAttachments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RequestAttachments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RequestAttachments::RequestId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestAttachments::FileName)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestAttachments::FilePath)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestAttachments::FileType)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestAttachments::OriginalName)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(RequestAttachments::Md5).char_len(32).not_null())
                    .col(
                        ColumnDef::new(RequestAttachments::AttachmentType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestAttachments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_request_attachments_request")
                            .from(RequestAttachments::Table, RequestAttachments::RequestId)
                            .to(DocumentRequests::Table, DocumentRequests::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_request_attachments_request_id")
                    .table(RequestAttachments::Table)
                    .col(RequestAttachments::RequestId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RequestAttachments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RequestAttachments {
    Table,
    Id,
    RequestId,
    FileName,
    FilePath,
    FileType,
    OriginalName,
    Md5,
    AttachmentType,
    CreatedAt,
}

#[derive(Iden)]
enum DocumentRequests {
    Table,
    Id,
}
