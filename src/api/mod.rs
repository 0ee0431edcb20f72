pub mod auth;
pub mod health;
pub mod inventory;
pub mod requests;

use axum::http::StatusCode;
use serde_json::json;

use crate::db::store::StoreError;
use crate::utils::api_response::ApiResponse;
use crate::workflow::error::WorkflowError;

pub(crate) fn store_error(err: StoreError) -> ApiResponse<()> {
    workflow_error_response(WorkflowError::Storage(err))
}

/// Maps workflow errors onto the response envelope. Validation and restock
/// failures carry their structured violations in `errors`; storage failures
/// are logged here and reported without internals.
pub(crate) fn workflow_error_response(err: WorkflowError) -> ApiResponse<()> {
    match err {
        WorkflowError::Validation(violations) => ApiResponse::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Request validation failed",
            Some(json!({ "fields": violations })),
        ),
        WorkflowError::NotFound(id) => ApiResponse::error(
            StatusCode::NOT_FOUND,
            format!("Request {id} not found"),
            None,
        ),
        WorkflowError::InvalidTransition { from, to } => ApiResponse::error(
            StatusCode::CONFLICT,
            format!("Cannot move request from {from} to {to}"),
            None,
        ),
        WorkflowError::NotApproved { status } => ApiResponse::error(
            StatusCode::CONFLICT,
            format!("Request is not approved (current status: {status})"),
            None,
        ),
        WorkflowError::AlreadyLinked(order) => ApiResponse::error(
            StatusCode::CONFLICT,
            format!("Request is already linked to procurement order {order}"),
            None,
        ),
        WorkflowError::RestockIneligible(violations) => ApiResponse::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Request does not meet the restock eligibility rules",
            Some(json!({ "violations": violations })),
        ),
        WorkflowError::Storage(err) => {
            tracing::error!("Database error while handling a request: {err}");
            ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Database error", None)
        }
    }
}
