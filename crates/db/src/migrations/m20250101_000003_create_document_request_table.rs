//! Create `document_requests` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DocumentRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DocumentRequests::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DocumentRequests::StudentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DocumentRequests::Reference)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(DocumentRequests::DocumentType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DocumentRequests::Copies).integer().not_null())
                    .col(ColumnDef::new(DocumentRequests::Purpose).text().not_null())
                    .col(
                        ColumnDef::new(DocumentRequests::DeliveryMethod)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DocumentRequests::DeliveryAddress).text())
                    .col(
                        ColumnDef::new(DocumentRequests::DocumentFee)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DocumentRequests::ShippingFee)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DocumentRequests::TotalFee)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DocumentRequests::PaymentStatus)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(DocumentRequests::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(DocumentRequests::TrackingNumber).string_len(64))
                    .col(ColumnDef::new(DocumentRequests::DeliveryDate).date())
                    .col(ColumnDef::new(DocumentRequests::PaymentMethod).string_len(32))
                    .col(ColumnDef::new(DocumentRequests::PaymentReference).string_len(128))
                    .col(ColumnDef::new(DocumentRequests::PaymentDate).date())
                    .col(ColumnDef::new(DocumentRequests::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(DocumentRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DocumentRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_document_requests_student")
                            .from(DocumentRequests::Table, DocumentRequests::StudentId)
                            .to(Students::Table, Students::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .check(
                        Expr::col(DocumentRequests::TotalFee).eq(
                            Expr::col(DocumentRequests::DocumentFee)
                                .add(Expr::col(DocumentRequests::ShippingFee)),
                        ),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: student_id (student's own request list)
        manager
            .create_index(
                Index::create()
                    .name("idx_document_requests_student_id")
                    .table(DocumentRequests::Table)
                    .col(DocumentRequests::StudentId)
                    .to_owned(),
            )
            .await?;

        // Index: (status, created_at) for staff listing
        manager
            .create_index(
                Index::create()
                    .name("idx_document_requests_status_created_at")
                    .table(DocumentRequests::Table)
                    .col(DocumentRequests::Status)
                    .col(DocumentRequests::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DocumentRequests::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DocumentRequests {
    Table,
    Id,
    StudentId,
    Reference,
    DocumentType,
    Copies,
    Purpose,
    DeliveryMethod,
    DeliveryAddress,
    DocumentFee,
    ShippingFee,
    TotalFee,
    PaymentStatus,
    Status,
    TrackingNumber,
    DeliveryDate,
    PaymentMethod,
    PaymentReference,
    PaymentDate,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Students {
    Table,
    Id,
}
