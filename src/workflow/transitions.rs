// src/workflow/transitions.rs
//
// The canonical approval chain and which role signs off each step. The
// engine itself only enforces hard guards (terminal states, reserved
// targets); callers that want the strict chain consult this table before
// asking the engine to move a request.

use crate::db::models::requests::RequestStatus;
use crate::workflow::queue::Role;

/// Targets the chain expects next from a given status. Draft leaves through
/// `submit`, and terminal statuses have nowhere to go.
pub fn allowed_targets(from: &RequestStatus) -> &'static [RequestStatus] {
    match from {
        RequestStatus::Submitted => &[RequestStatus::Reviewed, RequestStatus::Declined],
        RequestStatus::Reviewed => &[RequestStatus::Verified, RequestStatus::Declined],
        RequestStatus::Verified => &[RequestStatus::Authorized, RequestStatus::Declined],
        RequestStatus::Authorized => &[
            RequestStatus::Forwarded,
            RequestStatus::Approved,
            RequestStatus::Declined,
        ],
        RequestStatus::Forwarded => &[RequestStatus::Approved, RequestStatus::Declined],
        RequestStatus::Draft
        | RequestStatus::Approved
        | RequestStatus::Declined
        | RequestStatus::Procured => &[],
    }
}

pub fn is_chain_step(from: &RequestStatus, to: &RequestStatus) -> bool {
    allowed_targets(from).contains(to)
}

/// Which role may move a request into `target`. System admins may take any
/// step; everyone else is bound to their own stage of the chain.
pub fn role_may_set(role: Option<Role>, target: &RequestStatus) -> bool {
    let Some(role) = role else {
        return false;
    };
    if role == Role::SystemAdmin {
        return true;
    }
    match target {
        RequestStatus::Reviewed => role == Role::ProjectManager,
        RequestStatus::Verified => role == Role::AssetDirector,
        RequestStatus::Authorized => role == Role::FinanceDirector,
        RequestStatus::Forwarded => {
            matches!(role, Role::AssetDirector | Role::FinanceDirector)
        }
        RequestStatus::Approved | RequestStatus::Declined => role == Role::AssetDirector,
        _ => false,
    }
}
