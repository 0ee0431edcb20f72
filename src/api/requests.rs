use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::api::auth::Claims;
use crate::api::{store_error, workflow_error_response};
use crate::app_state::AppState;
use crate::db::models::audit::AuditLogEntry;
use crate::db::models::requests::{NewRequest, Request, RequestStatus, RequestType, Urgency};
use crate::utils::api_response::ApiResponse;
use crate::workflow::engine::ProcurementEligibility;
use crate::workflow::error::{FieldViolation, WorkflowError};
use crate::workflow::queue::{ActorContext, Role};
use crate::workflow::transitions;

pub fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/requests", post(create_request))
        .route("/requests/pending", get(get_pending_requests))
        .route("/requests/approved", get(get_approved_requests))
        .route("/requests/{request_id}", get(get_request_by_id))
        .route("/requests/{request_id}/audit", get(get_request_audit_trail))
        .route("/requests/{request_id}/submit", post(submit_request))
        .route("/requests/{request_id}/status", patch(update_request_status))
        .route("/requests/{request_id}/procurement", post(link_procurement_order))
        .route(
            "/requests/{request_id}/procurement/eligibility",
            get(get_procurement_eligibility),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionRequestBody {
    pub target_status: RequestStatus,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkProcurementBody {
    pub procurement_order_id: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ApprovedQueueParams {
    /// Narrow the queue to a single project
    pub project_id: Option<i32>,
}

async fn fetch_request(state: &AppState, request_id: i32) -> Result<Request, ApiResponse<()>> {
    state
        .requests
        .find_request(request_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| workflow_error_response(WorkflowError::NotFound(request_id)))
}

#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewRequest,
    responses(
        (status = 201, description = "Request created as a draft", body = Request),
        (status = 422, description = "Field validation or restock eligibility failed"),
        (status = 500, description = "Failed to create request")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(mut payload): Json<NewRequest>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    // The caller is the requester unless the payload names someone else.
    if payload.requested_by.is_none() {
        payload.requested_by = Some(user_id);
    }

    let request = state
        .engine
        .create(payload)
        .await
        .map_err(workflow_error_response)?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Request created",
        request,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/pending",
    responses(
        (status = 200, description = "In-flight requests visible to the caller's role, most urgent first", body = Vec<Request>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_pending_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
) -> Result<ApiResponse<Vec<Request>>, ApiResponse<()>> {
    let requests = state
        .queues
        .pending_for(&actor)
        .await
        .map_err(workflow_error_response)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Pending requests",
        requests,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/approved",
    params(ApprovedQueueParams),
    responses(
        (status = 200, description = "Approved requests awaiting a procurement order, soonest needed first", body = Vec<Request>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_approved_requests(
    State(state): State<AppState>,
    Query(params): Query<ApprovedQueueParams>,
) -> Result<ApiResponse<Vec<Request>>, ApiResponse<()>> {
    let requests = state
        .queues
        .approved_awaiting_procurement(params.project_id)
        .await
        .map_err(workflow_error_response)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Approved requests awaiting procurement",
        requests,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(
        ("request_id" = i32, Path, description = "Procurement request ID")
    ),
    responses(
        (status = 200, description = "Request retrieved", body = Request),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request_by_id(
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let request = fetch_request(&state, request_id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request retrieved",
        request,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}/audit",
    params(
        ("request_id" = i32, Path, description = "Procurement request ID")
    ),
    responses(
        (status = 200, description = "Audit trail in the order it was written", body = Vec<AuditLogEntry>),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request_audit_trail(
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<Vec<AuditLogEntry>>, ApiResponse<()>> {
    fetch_request(&state, request_id).await?;

    let trail = state
        .requests
        .audit_trail(request_id)
        .await
        .map_err(store_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request audit trail",
        trail,
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/submit",
    params(
        ("request_id" = i32, Path, description = "Procurement request ID")
    ),
    responses(
        (status = 200, description = "Draft submitted into the approval flow", body = Request),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not a draft")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn submit_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let request = state
        .engine
        .submit(request_id, user_id)
        .await
        .map_err(workflow_error_response)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request submitted",
        request,
    ))
}

#[utoipa::path(
    patch,
    path = "/requests/{request_id}/status",
    params(
        ("request_id" = i32, Path, description = "Procurement request ID")
    ),
    request_body = TransitionRequestBody,
    responses(
        (status = 200, description = "Request moved to the target status", body = Request),
        (status = 403, description = "Caller's role does not sign off this step"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Target is not the next step of the approval chain")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn update_request_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(actor): Extension<ActorContext>,
    Path(request_id): Path<i32>,
    Json(body): Json<TransitionRequestBody>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    if !transitions::role_may_set(actor.role(), &body.target_status) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            format!("Your role cannot move requests to {}", body.target_status),
            None,
        ));
    }

    let current = fetch_request(&state, request_id).await?;
    if !transitions::is_chain_step(&current.status, &body.target_status) {
        return Err(workflow_error_response(WorkflowError::InvalidTransition {
            from: current.status,
            to: body.target_status,
        }));
    }

    let updated = state
        .engine
        .transition(request_id, body.target_status, user_id, body.remarks)
        .await
        .map_err(workflow_error_response)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request status updated",
        updated,
    ))
}

#[utoipa::path(
    post,
    path = "/requests/{request_id}/procurement",
    params(
        ("request_id" = i32, Path, description = "Procurement request ID")
    ),
    request_body = LinkProcurementBody,
    responses(
        (status = 200, description = "Request linked to the procurement order"),
        (status = 403, description = "Caller is not a procurement officer"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not approved or already linked")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn link_procurement_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(actor): Extension<ActorContext>,
    Path(request_id): Path<i32>,
    Json(body): Json<LinkProcurementBody>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    if !matches!(
        actor.role(),
        Some(Role::ProcurementOfficer) | Some(Role::SystemAdmin)
    ) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only procurement officers can link procurement orders",
            None,
        ));
    }

    state
        .engine
        .link_to_procurement_order(request_id, body.procurement_order_id, Some(user_id))
        .await
        .map_err(workflow_error_response)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        format!(
            "Request linked to procurement order {}",
            body.procurement_order_id
        ),
        (),
    ))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}/procurement/eligibility",
    params(
        ("request_id" = i32, Path, description = "Procurement request ID")
    ),
    responses(
        (status = 200, description = "Whether the request could be procured right now", body = ProcurementEligibility),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_procurement_eligibility(
    State(state): State<AppState>,
    Path(request_id): Path<i32>,
) -> Result<ApiResponse<ProcurementEligibility>, ApiResponse<()>> {
    let eligibility = state
        .engine
        .can_be_procured(request_id)
        .await
        .map_err(workflow_error_response)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Procurement eligibility",
        eligibility,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        create_request,
        get_pending_requests,
        get_approved_requests,
        get_request_by_id,
        get_request_audit_trail,
        submit_request,
        update_request_status,
        link_procurement_order,
        get_procurement_eligibility
    ),
    components(schemas(
        Request,
        NewRequest,
        RequestStatus,
        RequestType,
        Urgency,
        AuditLogEntry,
        ProcurementEligibility,
        TransitionRequestBody,
        LinkProcurementBody,
        FieldViolation
    )),
    tags(
        (name = "Requests", description = "Endpoints for the procurement request approval workflow")
    )
)]
pub struct RequestDoc;
