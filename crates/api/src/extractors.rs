//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use docreq_common::AppError;
use docreq_core::{Actor, ActorKind};

/// Authenticated actor extractor.
#[derive(Debug, Clone, Copy)]
pub struct AuthActor(pub Actor);

impl<S> FromRequestParts<S> for AuthActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<Actor>()
            .copied()
            .map(AuthActor)
            .ok_or(AppError::Unauthorized)
    }
}

/// Authenticated staff extractor.
#[derive(Debug, Clone, Copy)]
pub struct StaffActor(pub Actor);

impl<S> FromRequestParts<S> for StaffActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthActor(actor) = AuthActor::from_request_parts(parts, state).await?;
        if actor.kind == ActorKind::Staff {
            Ok(Self(actor))
        } else {
            Err(AppError::Forbidden("Staff access required".to_string()))
        }
    }
}
