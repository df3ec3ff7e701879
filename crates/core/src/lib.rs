//! Business rules for document requests: fees, lifecycle, access control,
//! notifications and the request service tying them together.

pub mod services;

pub use services::*;
