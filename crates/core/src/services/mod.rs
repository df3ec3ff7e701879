//! Business logic services.

#![allow(missing_docs)]

pub mod access;
pub mod email;
pub mod fees;
pub mod lifecycle;
pub mod notification;
pub mod presentation;
pub mod processing;
pub mod request;
pub mod student;

pub use access::{
    Actor, ActorKind, AuthService, can_mutate, can_view, ensure_can_mutate, ensure_can_view,
    ensure_kind,
};
pub use email::{EmailAttachment, EmailMessage, EmailTemplates, SmtpDispatcher};
pub use fees::{FeeBreakdown, POSTAL_FEE, base_fee, calculate_fees, delivery_fee};
pub use lifecycle::{Action, transition};
pub use notification::{
    DigitalDocument, Dispatcher, NewRequestAlert, NoOpDispatcher, NotificationDispatcher,
    RequestConfirmation, StatusUpdate,
};
pub use presentation::{
    AttachmentView, HistoryView, PaymentView, RequestDetail, RequestView, StudentView,
};
pub use processing::{Estimate, ProcessingCalendar, add_working_days};
pub use request::{
    CancelRequestInput, DashboardStats, DigitalDocumentInput, FileUpload, ListRequestsQuery,
    ListedRequest, Outcome, PaymentDecision, PickupInput, PostalAddress, RejectRequestInput,
    RequestPage, RequestService, RequestSettings, ShipRequestInput, SubmitPaymentInput,
    SubmitRequestInput, UpdateStatusInput, VerifyPaymentInput,
};
pub use student::{
    ListStudentsQuery, StudentDetail, StudentPage, StudentService, UpdateStudentInput,
};
