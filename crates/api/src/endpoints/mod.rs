//! API endpoints.

mod admin;
mod fees;
mod requests;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/fees", fees::router())
        .nest("/requests", requests::router())
        .nest("/admin", admin::router())
}
