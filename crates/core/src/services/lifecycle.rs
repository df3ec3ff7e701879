//! Request lifecycle.
//!
//! Every status change a request can undergo is an [`Action`]. The only
//! place that decides whether an action is allowed from a given status is
//! [`transition`]; callers then persist the result through the guarded
//! update in the request repository.

use docreq_common::{AppError, AppResult};
use docreq_db::entities::document_request::RequestStatus;

use super::access::ActorKind;

/// A lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Student uploads a payment slip.
    SubmitPayment,
    /// Staff accepts the pending payment.
    ApprovePayment,
    /// Staff refuses the pending payment.
    RejectPayment,
    /// Staff moves the request to a chosen status.
    UpdateStatus(RequestStatus),
    /// Staff refuses the request.
    Reject,
    /// Staff hands the document to the post.
    Ship,
    /// Student collected the document at the counter.
    PickUp,
    /// Staff emails the finished document.
    SendDigitalDocument,
    /// Student withdraws the request.
    Cancel,
}

impl Action {
    /// Who may perform this action.
    #[must_use]
    pub const fn performed_by(self) -> ActorKind {
        match self {
            Self::SubmitPayment | Self::Cancel => ActorKind::Student,
            _ => ActorKind::Staff,
        }
    }

    /// Short name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SubmitPayment => "submit_payment",
            Self::ApprovePayment => "approve_payment",
            Self::RejectPayment => "reject_payment",
            Self::UpdateStatus(_) => "update_status",
            Self::Reject => "reject",
            Self::Ship => "ship",
            Self::PickUp => "pick_up",
            Self::SendDigitalDocument => "send_digital_document",
            Self::Cancel => "cancel",
        }
    }
}

/// Resolve the status an action leads to from `current`.
///
/// Terminal statuses accept no action at all. A request awaiting payment
/// verification only leaves that state through approval, rejection of the
/// payment or of the request, digital delivery, or cancellation.
pub fn transition(current: RequestStatus, action: Action) -> AppResult<RequestStatus> {
    use RequestStatus as S;

    if current.is_terminal() {
        return Err(invalid(current, action));
    }

    let next = match (action, current) {
        (Action::SubmitPayment, S::Pending | S::AwaitingPayment) => S::AwaitingVerification,
        (Action::ApprovePayment, S::AwaitingVerification) => S::Processing,
        (Action::RejectPayment, S::AwaitingVerification) => S::AwaitingPayment,
        (Action::UpdateStatus(target), _)
            if target != current
                && target != S::AwaitingVerification
                && current != S::AwaitingVerification =>
        {
            target
        }
        (Action::Reject, _) => S::Rejected,
        (Action::Ship, S::Processing | S::ReadyForPickup) => S::Shipped,
        (Action::PickUp, S::ReadyForPickup) => S::Completed,
        (Action::SendDigitalDocument, _) => S::Completed,
        (Action::Cancel, status) if status.is_cancellable() => S::Cancelled,
        _ => return Err(invalid(current, action)),
    };

    Ok(next)
}

fn invalid(current: RequestStatus, action: Action) -> AppError {
    match action {
        Action::UpdateStatus(target) => AppError::InvalidTransition(format!(
            "Cannot change status from {current} to {target}"
        )),
        _ => AppError::InvalidTransition(format!(
            "Cannot {} a request that is {current}",
            action.name()
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    const ALL_ACTIONS: [Action; 8] = [
        Action::SubmitPayment,
        Action::ApprovePayment,
        Action::RejectPayment,
        Action::Reject,
        Action::Ship,
        Action::PickUp,
        Action::SendDigitalDocument,
        Action::Cancel,
    ];

    #[test]
    fn test_payment_path() {
        let status = transition(RequestStatus::Pending, Action::SubmitPayment).unwrap();
        assert_eq!(status, RequestStatus::AwaitingVerification);

        assert_eq!(
            transition(status, Action::ApprovePayment).unwrap(),
            RequestStatus::Processing
        );
        assert_eq!(
            transition(status, Action::RejectPayment).unwrap(),
            RequestStatus::AwaitingPayment
        );
        assert_eq!(
            transition(RequestStatus::AwaitingPayment, Action::SubmitPayment).unwrap(),
            RequestStatus::AwaitingVerification
        );
    }

    #[test]
    fn test_payment_cannot_be_resubmitted_while_verifying() {
        let err = transition(RequestStatus::AwaitingVerification, Action::SubmitPayment).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn test_terminal_statuses_reject_everything() {
        for status in RequestStatus::iter().filter(|s| s.is_terminal()) {
            for action in ALL_ACTIONS {
                let err = transition(status, action).unwrap_err();
                assert!(matches!(err, AppError::InvalidTransition(_)), "{status} {action:?}");
            }
            for target in RequestStatus::iter() {
                assert!(transition(status, Action::UpdateStatus(target)).is_err());
            }
        }
    }

    #[test]
    fn test_cancel_only_before_processing() {
        for status in RequestStatus::iter().filter(|s| !s.is_terminal()) {
            let result = transition(status, Action::Cancel);
            if status.is_cancellable() {
                assert_eq!(result.unwrap(), RequestStatus::Cancelled);
            } else {
                assert!(matches!(result, Err(AppError::InvalidTransition(_))));
            }
        }
        assert!(transition(RequestStatus::Processing, Action::Cancel).is_err());
    }

    #[test]
    fn test_pick_up_requires_ready_for_pickup() {
        assert_eq!(
            transition(RequestStatus::ReadyForPickup, Action::PickUp).unwrap(),
            RequestStatus::Completed
        );
        assert!(transition(RequestStatus::Processing, Action::PickUp).is_err());
        assert!(transition(RequestStatus::Shipped, Action::PickUp).is_err());
    }

    #[test]
    fn test_ship_from_processing_or_ready() {
        assert_eq!(
            transition(RequestStatus::Processing, Action::Ship).unwrap(),
            RequestStatus::Shipped
        );
        assert_eq!(
            transition(RequestStatus::ReadyForPickup, Action::Ship).unwrap(),
            RequestStatus::Shipped
        );
        assert!(transition(RequestStatus::Pending, Action::Ship).is_err());
    }

    #[test]
    fn test_update_status_rules() {
        assert_eq!(
            transition(
                RequestStatus::Processing,
                Action::UpdateStatus(RequestStatus::Preparing)
            )
            .unwrap(),
            RequestStatus::Preparing
        );
        assert!(
            transition(
                RequestStatus::Processing,
                Action::UpdateStatus(RequestStatus::Processing)
            )
            .is_err()
        );
        assert!(
            transition(
                RequestStatus::Pending,
                Action::UpdateStatus(RequestStatus::AwaitingVerification)
            )
            .is_err()
        );
    }

    #[test]
    fn test_update_status_cannot_leave_payment_verification() {
        for target in RequestStatus::iter() {
            let err = transition(
                RequestStatus::AwaitingVerification,
                Action::UpdateStatus(target),
            )
            .unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)), "{target}");
        }
    }

    #[test]
    fn test_digital_document_and_reject_from_any_open_status() {
        for status in RequestStatus::iter().filter(|s| !s.is_terminal()) {
            assert_eq!(
                transition(status, Action::SendDigitalDocument).unwrap(),
                RequestStatus::Completed
            );
            assert_eq!(
                transition(status, Action::Reject).unwrap(),
                RequestStatus::Rejected
            );
        }
    }

    #[test]
    fn test_actor_kinds() {
        assert_eq!(Action::Cancel.performed_by(), ActorKind::Student);
        assert_eq!(Action::SubmitPayment.performed_by(), ActorKind::Student);
        assert_eq!(Action::ApprovePayment.performed_by(), ActorKind::Staff);
        assert_eq!(
            Action::UpdateStatus(RequestStatus::Preparing).performed_by(),
            ActorKind::Staff
        );
    }
}
