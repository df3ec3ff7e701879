//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_student_table;
mod m20250101_000002_create_staff_table;
mod m20250101_000003_create_document_request_table;
mod m20250101_000004_create_request_status_history_table;
mod m20250101_000005_create_payment_tables;
mod m20250101_000006_create_request_attachment_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_student_table::Migration),
            Box::new(m20250101_000002_create_staff_table::Migration),
            Box::new(m20250101_000003_create_document_request_table::Migration),
            Box::new(m20250101_000004_create_request_status_history_table::Migration),
            Box::new(m20250101_000005_create_payment_tables::Migration),
            Box::new(m20250101_000006_create_request_attachment_table::Migration),
        ]
    }
}
