//! Database repositories.

mod attachment;
mod payment;
mod request;
mod staff;
mod student;

pub use attachment::AttachmentRepository;
pub use payment::PaymentRepository;
pub use request::{
    AppliedChange, DeliveryUpdate, HistoryActor, PaymentUpdate, PaymentWrite, RequestFilter,
    RequestRepository, StatusChange,
};
pub use staff::StaffRepository;
pub use student::StudentRepository;
