//! Database entities.

#![allow(missing_docs)]

pub mod document_request;
pub mod payment_history;
pub mod payment_status_history;
pub mod request_attachment;
pub mod request_status_history;
pub mod staff;
pub mod student;

pub use document_request::Entity as DocumentRequest;
pub use payment_history::Entity as PaymentHistory;
pub use payment_status_history::Entity as PaymentStatusHistory;
pub use request_attachment::Entity as RequestAttachment;
pub use request_status_history::Entity as RequestStatusHistory;
pub use staff::Entity as Staff;
pub use student::Entity as Student;
