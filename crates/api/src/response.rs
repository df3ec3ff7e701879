//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docreq_core::Outcome;
use serde::Serialize;

/// Standard API response wrapper.
///
/// Errors are rendered by `AppError` itself, so this only carries success
/// payloads.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    /// Set when a state change committed but its email could not be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub const fn ok(data: T) -> Self {
        Self {
            data,
            warning: None,
            status: StatusCode::OK,
        }
    }

    /// Build a response from a service outcome, mapping its value.
    pub fn from_outcome<U>(outcome: Outcome<U>, map: impl FnOnce(U) -> T) -> Self {
        Self {
            data: map(outcome.value),
            warning: outcome.warning,
            status: StatusCode::OK,
        }
    }

    /// Turn the response into `201 Created`, keeping data and warning.
    #[must_use]
    pub fn into_created(mut self) -> Self {
        self.status = StatusCode::CREATED;
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// Empty success response.
#[must_use]
pub fn ok() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
