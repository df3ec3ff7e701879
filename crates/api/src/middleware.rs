//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use docreq_core::{AuthService, RequestService, StudentService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub request_service: RequestService,
    pub student_service: StudentService,
}

/// Authentication middleware.
///
/// Resolves a bearer token to an actor and stores it in the request
/// extensions. Unknown tokens pass through anonymously; handlers that need
/// an actor reject the request themselves.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.auth_service.authenticate(token.trim()).await {
            Ok(Some(actor)) => {
                req.extensions_mut().insert(actor);
            }
            Ok(None) => {
                tracing::debug!("Unknown API token");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token lookup failed");
            }
        }
    }

    next.run(req).await
}
