//! Request status transitions
//!
//! Creation lands a request directly in `Submitted`. From there a single
//! decision moves it to `Approved` or `Rejected`, both of which are final in
//! this crate. `Draft` can only leave through [`submit`]. `PendingApproval`
//! and `Completed` are reserved for downstream workflows and have no edges.
use super::error::{Action, AuthorizationError, RequestError, TransitionError};
use super::permissions::UserPermissions;
use super::request::{ApprovalOutcome, Request, RequestPatch, RequestStatus};

/// An approver's verdict on one or more requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: ApprovalOutcome,
    pub comments: Option<String>,
}

impl Decision {
    pub fn approve() -> Self {
        Self {
            outcome: ApprovalOutcome::Approved,
            comments: None,
        }
    }
    pub fn reject() -> Self {
        Self {
            outcome: ApprovalOutcome::Rejected,
            comments: None,
        }
    }
    pub fn with_comments(mut self, comments: &str) -> Self {
        self.comments = Some(comments.to_string());
        self
    }
}

impl RequestStatus {
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Draft, RequestStatus::Submitted)
                | (RequestStatus::Submitted, RequestStatus::Approved)
                | (RequestStatus::Submitted, RequestStatus::Rejected)
        )
    }
}

fn ensure_transition(from: RequestStatus, to: RequestStatus) -> Result<(), TransitionError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(TransitionError::NotAllowed { from, to })
    }
}

/// Draft -> Submitted. The caller must be able to edit the request.
pub fn submit(
    request: &Request,
    actor_email: &str,
    permissions: &UserPermissions,
) -> Result<RequestPatch, RequestError> {
    if !permissions.can_edit {
        return Err(AuthorizationError::new(actor_email, Action::Edit, Some(request.id)).into());
    }
    ensure_transition(request.status, RequestStatus::Submitted)?;

    Ok(RequestPatch {
        status: Some(RequestStatus::Submitted),
        ..RequestPatch::default()
    })
}

/// Submitted -> Approved | Rejected.
///
/// Returns one patch carrying status, outcome and comments together; writing
/// it with a single store update keeps the three fields in step.
pub fn decide(
    request: &Request,
    decision: &Decision,
    actor_email: &str,
    permissions: &UserPermissions,
) -> Result<RequestPatch, RequestError> {
    if !permissions.can_approve {
        return Err(AuthorizationError::new(actor_email, Action::Approve, Some(request.id)).into());
    }
    let next = RequestStatus::from(decision.outcome);
    ensure_transition(request.status, next)?;

    Ok(RequestPatch {
        status: Some(next),
        approval_outcome: Some(decision.outcome),
        approver_comments: Some(decision.comments.clone().unwrap_or_default()),
        ..RequestPatch::default()
    })
}
