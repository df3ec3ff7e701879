//! Access control.
//!
//! Students see and act on their own requests only; staff act on any.

use docreq_common::{AppError, AppResult};
use docreq_db::{
    entities::document_request,
    repositories::{HistoryActor, StaffRepository, StudentRepository},
};
use serde::Serialize;

/// Kind of authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Student,
    Staff,
}

/// An authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: i64,
    pub kind: ActorKind,
}

impl Actor {
    #[must_use]
    pub const fn student(id: i64) -> Self {
        Self {
            id,
            kind: ActorKind::Student,
        }
    }

    #[must_use]
    pub const fn staff(id: i64) -> Self {
        Self {
            id,
            kind: ActorKind::Staff,
        }
    }

    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self.kind, ActorKind::Staff)
    }

    /// Author recorded on history rows.
    #[must_use]
    pub const fn history_actor(&self) -> HistoryActor {
        HistoryActor {
            id: self.id,
            is_staff: self.is_staff(),
        }
    }
}

/// Whether the actor may see the request.
#[must_use]
pub const fn can_view(actor: &Actor, request: &document_request::Model) -> bool {
    actor.is_staff() || request.student_id == actor.id
}

/// Whether the actor may change the request.
#[must_use]
pub const fn can_mutate(actor: &Actor, request: &document_request::Model) -> bool {
    can_view(actor, request)
}

pub fn ensure_can_view(actor: &Actor, request: &document_request::Model) -> AppResult<()> {
    if can_view(actor, request) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Request {} belongs to another student",
            request.reference
        )))
    }
}

pub fn ensure_can_mutate(actor: &Actor, request: &document_request::Model) -> AppResult<()> {
    if can_mutate(actor, request) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Request {} belongs to another student",
            request.reference
        )))
    }
}

/// Require a particular kind of actor.
pub fn ensure_kind(actor: &Actor, kind: ActorKind) -> AppResult<()> {
    if actor.kind == kind {
        Ok(())
    } else {
        Err(AppError::Forbidden(match kind {
            ActorKind::Staff => "Staff access required".to_string(),
            ActorKind::Student => "Only the requesting student may do this".to_string(),
        }))
    }
}

/// Resolves API tokens to actors.
#[derive(Clone)]
pub struct AuthService {
    student_repo: StudentRepository,
    staff_repo: StaffRepository,
}

impl AuthService {
    #[must_use]
    pub const fn new(student_repo: StudentRepository, staff_repo: StaffRepository) -> Self {
        Self {
            student_repo,
            staff_repo,
        }
    }

    /// Look up the actor owning a bearer token. Staff tokens win on a clash.
    pub async fn authenticate(&self, token: &str) -> AppResult<Option<Actor>> {
        if token.is_empty() {
            return Ok(None);
        }

        if let Some(staff) = self.staff_repo.find_by_token(token).await? {
            return Ok(Some(Actor::staff(staff.id)));
        }

        Ok(self
            .student_repo
            .find_by_token(token)
            .await?
            .map(|student| Actor::student(student.id)))
    }
}
