//! Test support.
//!
//! [`fixtures`] builds entity models for `MockDatabase` result sets.
//! [`TestDatabase`] creates a throwaway, migrated `PostgreSQL` database for
//! the ignored integration tests.

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

/// Entity models with stable, recognisable values.
///
/// Every fixture belongs to student 1 unless it takes a student id, so a
/// request fixture and `student(1)` line up the way a real row pair would.
pub mod fixtures {
    use chrono::{NaiveDate, Utc};

    use crate::entities::{
        document_request::{self, DeliveryMethod, DocumentType, PaymentStatus, RequestStatus},
        payment_history::{self, PaymentMethod, PaymentRecordStatus},
        payment_status_history,
        request_attachment::{self, AttachmentType},
        request_status_history, staff, student,
    };

    /// Student owning the default fixtures.
    pub const STUDENT_ID: i64 = 1;

    /// Student `id`; student 1 is `6501234567`.
    #[must_use]
    pub fn student(id: i64) -> student::Model {
        student::Model {
            id,
            student_number: (6_501_234_566 + id).to_string(),
            first_name: "Somchai".to_string(),
            last_name: "Jaidee".to_string(),
            email: format!("student{id}@example.ac.th"),
            phone: Some("0812345678".to_string()),
            faculty: Some("Science".to_string()),
            major: Some("Computer Science".to_string()),
            address: None,
            api_token: Some(format!("student-token-{id}")),
            created_at: Utc::now().into(),
        }
    }

    /// Registrar staff member `id`.
    #[must_use]
    pub fn staff(id: i64) -> staff::Model {
        staff::Model {
            id,
            username: format!("registrar{id}"),
            full_name: "Registrar Office".to_string(),
            email: "registrar@example.ac.th".to_string(),
            role: "registrar".to_string(),
            api_token: Some(format!("staff-token-{id}")),
            created_at: Utc::now().into(),
        }
    }

    /// Two transcripts for pickup, 200 THB unpaid. Request 1 is `REQ2510181234`.
    #[must_use]
    pub fn request(id: i64, status: RequestStatus) -> document_request::Model {
        document_request::Model {
            id,
            student_id: STUDENT_ID,
            reference: format!("REQ251018{}", 1233 + id),
            document_type: DocumentType::Transcript,
            copies: 2,
            purpose: "Scholarship".to_string(),
            delivery_method: DeliveryMethod::Pickup,
            delivery_address: None,
            document_fee: 200,
            shipping_fee: 0,
            total_fee: 200,
            payment_status: PaymentStatus::Pending,
            status,
            tracking_number: None,
            delivery_date: None,
            payment_method: None,
            payment_reference: None,
            payment_date: None,
            completed_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    /// Status history entry written by the student.
    #[must_use]
    pub fn history(id: i64, request_id: i64, status: RequestStatus) -> request_status_history::Model {
        request_status_history::Model {
            id,
            request_id,
            status,
            notes: None,
            created_by: STUDENT_ID,
            created_by_staff: false,
            created_at: Utc::now().into(),
        }
    }

    /// Bank transfer covering the default request fee.
    #[must_use]
    pub fn payment(id: i64, request_id: i64, status: PaymentRecordStatus) -> payment_history::Model {
        payment_history::Model {
            id,
            request_id,
            amount: 200,
            payment_method: PaymentMethod::BankTransfer,
            payment_reference: "TRX-001".to_string(),
            payment_date: NaiveDate::from_ymd_opt(2025, 10, 18).unwrap_or_default(),
            payment_status: status,
            transaction_id: None,
            updated_by: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    /// Payment status change made by staff 9.
    #[must_use]
    pub fn payment_status_entry(
        id: i64,
        payment_id: i64,
        status: PaymentRecordStatus,
    ) -> payment_status_history::Model {
        payment_status_history::Model {
            id,
            payment_id,
            status,
            notes: None,
            created_by: 9,
            created_at: Utc::now().into(),
        }
    }

    /// PNG stored under `202510/slip.png`.
    #[must_use]
    pub fn attachment(
        id: i64,
        request_id: i64,
        attachment_type: AttachmentType,
    ) -> request_attachment::Model {
        request_attachment::Model {
            id,
            request_id,
            file_name: "slip.png".to_string(),
            file_path: "202510/slip.png".to_string(),
            file_type: "image/png".to_string(),
            original_name: "slip.png".to_string(),
            md5: "5d41402abc4b2a76b9719d911017c592".to_string(),
            attachment_type,
            created_at: Utc::now().into(),
        }
    }
}

/// Connection settings for integration tests, read from `TEST_DB_*`.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Database the tests connect to.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        Self {
            host: var("TEST_DB_HOST", "localhost"),
            port: var("TEST_DB_PORT", "5433").parse().unwrap_or(5433),
            username: var("TEST_DB_USER", "docreq_test"),
            password: var("TEST_DB_PASSWORD", "docreq_test"),
            database: var("TEST_DB_NAME", "docreq_test"),
        }
    }
}

impl TestDbConfig {
    /// URL of the configured database.
    #[must_use]
    pub fn database_url(&self) -> String {
        self.url_for(&self.database)
    }

    /// URL of the maintenance database used to create and drop test databases.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        self.url_for("postgres")
    }

    fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A migrated database owned by one test.
pub struct TestDatabase {
    conn: DatabaseConnection,
    config: TestDbConfig,
}

impl TestDatabase {
    /// Create a database with a random name and run every migration on it.
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        config.database = format!("docreq_test_{}", &suffix[..8]);

        let admin = Database::connect(&config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", config.database),
            ))
            .await?;
        admin.close().await?;

        let conn = Database::connect(&config.database_url()).await?;
        crate::migrations::Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Created test database");
        Ok(Self { conn, config })
    }

    /// Connection to the test database.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Close the connection and drop the database.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        self.conn.close().await?;

        let admin = Database::connect(&self.config.postgres_url()).await?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", self.config.database),
            ))
            .await?;
        admin.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;
    use crate::entities::document_request::RequestStatus;

    #[test]
    fn test_postgres_url_targets_maintenance_database() {
        let config = TestDbConfig {
            database: "docreq_test_1234abcd".to_string(),
            ..TestDbConfig::default()
        };
        assert!(config.postgres_url().ends_with("/postgres"));
        assert!(config.database_url().ends_with("/docreq_test_1234abcd"));
    }

    #[test]
    fn test_request_fixture_is_consistent() {
        let request = fixtures::request(1, RequestStatus::Pending);
        let student = fixtures::student(request.student_id);

        assert_eq!(request.reference, "REQ2510181234");
        assert_eq!(student.student_number, "6501234567");
        assert_eq!(request.total_fee, request.document_fee + request.shipping_fee);
    }
}
