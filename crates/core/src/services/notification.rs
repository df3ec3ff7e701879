//! Notification dispatch.
//!
//! Lifecycle transitions inform the student (and, for new requests, the
//! registrar staff) through a [`NotificationDispatcher`]. Sending happens
//! after the transition commits and its failure never undoes it.

use async_trait::async_trait;
use docreq_common::AppResult;
use std::sync::Arc;

/// Data of the submission confirmation sent to the student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfirmation {
    pub reference: String,
    pub document_type: String,
    pub copies: i32,
    pub delivery_method: String,
    pub request_date: String,
    pub estimated_days: u32,
    pub estimated_date: String,
}

/// Data of a status change notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub reference: String,
    pub document_type: String,
    pub old_status: String,
    pub new_status: String,
    pub update_date: String,
    pub message: Option<String>,
}

/// A finished document delivered by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalDocument {
    pub reference: String,
    pub document_type: String,
    pub copies: i32,
    pub completed_date: String,
    pub message: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Staff alert about a new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequestAlert {
    pub reference: String,
    pub student_name: String,
    pub student_number: String,
    pub document_type: String,
    pub copies: i32,
    pub delivery_method: String,
    pub request_date: String,
}

/// Outbound notifications.
///
/// Implementations report delivery problems as errors; callers log them and
/// carry on.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Confirm a new request to the student.
    async fn send_request_confirmation(&self, to: &str, data: &RequestConfirmation)
    -> AppResult<()>;

    /// Tell the student their request changed status.
    async fn send_status_update(&self, to: &str, data: &StatusUpdate) -> AppResult<()>;

    /// Email the finished document to the student.
    async fn send_digital_document(&self, to: &str, data: &DigitalDocument) -> AppResult<()>;

    /// Alert staff about a new request.
    async fn send_new_request_alert(&self, to: &[String], data: &NewRequestAlert)
    -> AppResult<()>;
}

/// A dispatcher that drops every notification, used when email is disabled.
#[derive(Clone, Default)]
pub struct NoOpDispatcher;

#[async_trait]
impl NotificationDispatcher for NoOpDispatcher {
    async fn send_request_confirmation(
        &self,
        to: &str,
        data: &RequestConfirmation,
    ) -> AppResult<()> {
        tracing::debug!(to = %to, reference = %data.reference, "Email disabled, skipping confirmation");
        Ok(())
    }

    async fn send_status_update(&self, to: &str, data: &StatusUpdate) -> AppResult<()> {
        tracing::debug!(to = %to, reference = %data.reference, "Email disabled, skipping status update");
        Ok(())
    }

    async fn send_digital_document(&self, to: &str, data: &DigitalDocument) -> AppResult<()> {
        tracing::debug!(to = %to, reference = %data.reference, "Email disabled, skipping digital document");
        Ok(())
    }

    async fn send_new_request_alert(
        &self,
        _to: &[String],
        data: &NewRequestAlert,
    ) -> AppResult<()> {
        tracing::debug!(reference = %data.reference, "Email disabled, skipping staff alert");
        Ok(())
    }
}

/// Shared dispatcher handle.
pub type Dispatcher = Arc<dyn NotificationDispatcher>;
