use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::requests::RequestStatus;
use crate::db::store::StoreError;

/// One field-level problem found while validating a creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldViolation {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The creation payload was rejected. Carries every violation found in
    /// one pass, not just the first.
    #[error("Request validation failed")]
    Validation(Vec<FieldViolation>),

    #[error("Request {0} not found")]
    NotFound(i32),

    #[error("Cannot move request from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Request is not approved (current status: {status})")]
    NotApproved { status: RequestStatus },

    #[error("Request is already linked to procurement order {0}")]
    AlreadyLinked(i32),

    #[error("Request does not meet the restock eligibility rules")]
    RestockIneligible(Vec<String>),

    #[error("Database error: {0}")]
    Storage(#[from] StoreError),
}
