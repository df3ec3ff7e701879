//! HTTP API for document requests.
//!
//! - **Endpoints**: fee preview, student requests and staff administration
//! - **Extractors**: authenticated actor and staff guards
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod multipart;
pub mod response;

pub use endpoints::router;
