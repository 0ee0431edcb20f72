// src/workflow/engine.rs
//
// The approval workflow engine. Every mutation of a request goes through
// here: creation with collected validation, submission, status transitions
// and procurement-order linking. The engine performs hard guards only
// (terminal states, reserved targets, the exactly-once link); the canonical
// chain and role sign-off live in `transitions` and are enforced by callers.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::audit::{actions, AuditSeed};
use crate::db::models::requests::{
    InsertRequest, NewRequest, Request, RequestStatus, RequestType, Urgency,
};
use crate::db::store::{
    InventoryStore, RequestStore, RequestPatch, StatusGuard, UpdateOutcome,
};
use crate::workflow::error::{FieldViolation, WorkflowError};
use crate::workflow::restock;

/// Statuses a generic transition may land in. Drafts enter the flow through
/// `submit`, and procured is only reachable by linking a procurement order.
const TRANSITION_TARGETS: &[RequestStatus] = &[
    RequestStatus::Reviewed,
    RequestStatus::Verified,
    RequestStatus::Authorized,
    RequestStatus::Forwarded,
    RequestStatus::Approved,
    RequestStatus::Declined,
];

/// Statuses a transition may leave. Everything except declined and procured.
const ACTIVE_STATUSES: &[RequestStatus] = &[
    RequestStatus::Draft,
    RequestStatus::Submitted,
    RequestStatus::Reviewed,
    RequestStatus::Forwarded,
    RequestStatus::Verified,
    RequestStatus::Authorized,
    RequestStatus::Approved,
];

const MAX_DESCRIPTION_LEN: usize = 1000;

/// Answer to "could this request be procured right now?", with the blocking
/// reason when it cannot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProcurementEligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProcurementEligibility {
    fn eligible() -> Self {
        ProcurementEligibility {
            eligible: true,
            reason: None,
        }
    }

    fn blocked(reason: String) -> Self {
        ProcurementEligibility {
            eligible: false,
            reason: Some(reason),
        }
    }

    pub fn for_request(request: &Request) -> Self {
        if let Some(order) = request.procurement_id {
            return ProcurementEligibility::blocked(format!(
                "Request is already linked to procurement order {order}"
            ));
        }
        if request.status != RequestStatus::Approved {
            return ProcurementEligibility::blocked(format!(
                "Request is not approved (current status: {})",
                request.status
            ));
        }
        ProcurementEligibility::eligible()
    }
}

pub struct WorkflowEngine {
    requests: Arc<dyn RequestStore>,
    inventory: Arc<dyn InventoryStore>,
}

impl WorkflowEngine {
    pub fn new(requests: Arc<dyn RequestStore>, inventory: Arc<dyn InventoryStore>) -> Self {
        WorkflowEngine { requests, inventory }
    }

    /// Creates a request in draft. The payload is validated in one pass and
    /// every violation is reported together; nothing is written unless all
    /// checks pass. Restock requests are additionally checked against the
    /// inventory item they restock.
    pub async fn create(&self, data: NewRequest) -> Result<Request, WorkflowError> {
        let mut violations = Vec::new();

        if data.project_id.is_none() {
            violations.push(FieldViolation::new("project_id", "a project is required"));
        }

        let request_type = RequestType::parse(&data.request_type);
        if request_type.is_none() {
            violations.push(FieldViolation::new(
                "request_type",
                format!("'{}' is not a recognized request type", data.request_type),
            ));
        }

        let description = data
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if description.is_empty() {
            violations.push(FieldViolation::new("description", "a description is required"));
        } else if description.len() > MAX_DESCRIPTION_LEN {
            violations.push(FieldViolation::new(
                "description",
                format!("description must be at most {MAX_DESCRIPTION_LEN} characters"),
            ));
        }

        if data.requested_by.is_none() {
            violations.push(FieldViolation::new(
                "requested_by",
                "a requesting user is required",
            ));
        }

        if let Some(date_needed) = data.date_needed {
            if date_needed <= Utc::now().date_naive() {
                violations.push(FieldViolation::new(
                    "date_needed",
                    "date needed must be in the future",
                ));
            }
        }

        let urgency = match data.urgency.as_deref() {
            None => Urgency::Normal,
            Some(raw) => Urgency::parse(raw).unwrap_or_else(|| {
                violations.push(FieldViolation::new(
                    "urgency",
                    format!("'{raw}' is not a recognized urgency"),
                ));
                Urgency::Normal
            }),
        };

        let is_restock = data.is_restock.unwrap_or(false)
            || matches!(request_type, Some(RequestType::Restock));

        let (project_id, request_type, requested_by) =
            match (data.project_id, request_type, data.requested_by) {
                (Some(project), Some(parsed), Some(user)) if violations.is_empty() => {
                    (project, parsed, user)
                }
                _ => return Err(WorkflowError::Validation(violations)),
            };

        if is_restock {
            let item = match data.inventory_item_id {
                Some(item_id) => self.inventory.find_item_with_category(item_id).await?,
                None => None,
            };
            restock::validate(&data, item.as_ref()).map_err(WorkflowError::RestockIneligible)?;
        }

        let insert = InsertRequest {
            project_id,
            request_type,
            category: data.category,
            is_restock,
            inventory_item_id: data.inventory_item_id,
            description,
            quantity: data.quantity,
            unit: data.unit,
            estimated_cost: data.estimated_cost,
            urgency,
            date_needed: data.date_needed,
            requested_by,
        };
        let seed = AuditSeed {
            actor_id: Some(requested_by),
            action: actions::REQUEST_CREATED,
            new_status: Some(RequestStatus::Draft),
            remarks: None,
        };
        let request = self.requests.insert_request(insert, seed).await?;

        tracing::info!(request_id = request.id, "Created procurement request");
        Ok(request)
    }

    /// Moves a draft into the approval flow. Only drafts can be submitted,
    /// so resubmitting is rejected and audited nothing.
    pub async fn submit(&self, request_id: i32, actor_id: i32) -> Result<Request, WorkflowError> {
        let outcome = self
            .requests
            .update_request_if(
                request_id,
                StatusGuard::status_in(&[RequestStatus::Draft]),
                RequestPatch {
                    status: Some(RequestStatus::Submitted),
                    ..RequestPatch::default()
                },
                AuditSeed {
                    actor_id: Some(actor_id),
                    action: actions::REQUEST_SUBMITTED,
                    new_status: Some(RequestStatus::Submitted),
                    remarks: None,
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(request) => Ok(request),
            UpdateOutcome::GuardFailed(row) => Err(WorkflowError::InvalidTransition {
                from: row.status,
                to: RequestStatus::Submitted,
            }),
            UpdateOutcome::Missing => Err(WorkflowError::NotFound(request_id)),
        }
    }

    /// Moves a request to `target`, stamping the acting user on the field
    /// that matches the step. Supplied remarks overwrite the request's
    /// remarks; absent remarks leave them untouched.
    ///
    /// Deliberately permissive between active statuses. The hard guards:
    /// draft, submitted and procured are never transition targets, and
    /// terminal rows never move.
    pub async fn transition(
        &self,
        request_id: i32,
        target: RequestStatus,
        actor_id: i32,
        remarks: Option<String>,
    ) -> Result<Request, WorkflowError> {
        let current = self
            .requests
            .find_request(request_id)
            .await?
            .ok_or(WorkflowError::NotFound(request_id))?;

        if !TRANSITION_TARGETS.contains(&target) || current.status.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }

        let mut patch = RequestPatch {
            status: Some(target.clone()),
            remarks: remarks.clone(),
            ..RequestPatch::default()
        };
        match target {
            RequestStatus::Reviewed => patch.reviewed_by = Some(actor_id),
            RequestStatus::Verified => patch.verified_by = Some(actor_id),
            RequestStatus::Authorized => patch.authorized_by = Some(actor_id),
            RequestStatus::Approved => patch.approved_by = Some(actor_id),
            RequestStatus::Declined => patch.declined_by = Some(actor_id),
            _ => {}
        }

        let outcome = self
            .requests
            .update_request_if(
                request_id,
                StatusGuard::status_in(ACTIVE_STATUSES),
                patch,
                AuditSeed {
                    actor_id: Some(actor_id),
                    action: actions::STATUS_CHANGED,
                    new_status: Some(target.clone()),
                    remarks,
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(request) => {
                tracing::info!(request_id, status = %request.status, "Request status changed");
                Ok(request)
            }
            // The row reached a terminal status between our read and the
            // guarded update.
            UpdateOutcome::GuardFailed(row) => Err(WorkflowError::InvalidTransition {
                from: row.status,
                to: target,
            }),
            UpdateOutcome::Missing => Err(WorkflowError::NotFound(request_id)),
        }
    }

    /// Links an approved request to its procurement order, exactly once.
    /// The store's guarded update decides the winner under concurrency; the
    /// loser learns which order got there first.
    pub async fn link_to_procurement_order(
        &self,
        request_id: i32,
        procurement_order_id: i32,
        actor_id: Option<i32>,
    ) -> Result<(), WorkflowError> {
        let outcome = self
            .requests
            .update_request_if(
                request_id,
                StatusGuard::approved_and_unlinked(),
                RequestPatch {
                    status: Some(RequestStatus::Procured),
                    procurement_id: Some(procurement_order_id),
                    ..RequestPatch::default()
                },
                AuditSeed {
                    actor_id,
                    action: actions::LINKED_TO_PROCUREMENT,
                    new_status: Some(RequestStatus::Procured),
                    remarks: Some(format!("Linked to procurement order {procurement_order_id}")),
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(_) => {
                tracing::info!(request_id, procurement_order_id, "Linked request to procurement order");
                Ok(())
            }
            UpdateOutcome::GuardFailed(row) => match row.procurement_id {
                Some(existing) => Err(WorkflowError::AlreadyLinked(existing)),
                None => Err(WorkflowError::NotApproved { status: row.status }),
            },
            UpdateOutcome::Missing => Err(WorkflowError::NotFound(request_id)),
        }
    }

    /// Non-mutating preview of the link guard.
    pub async fn can_be_procured(
        &self,
        request_id: i32,
    ) -> Result<ProcurementEligibility, WorkflowError> {
        let request = self
            .requests
            .find_request(request_id)
            .await?
            .ok_or(WorkflowError::NotFound(request_id))?;
        Ok(ProcurementEligibility::for_request(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::db::models::inventory::{InventoryItem, ItemStatus, ItemWithCategory};
    use crate::db::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, WorkflowEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = WorkflowEngine::new(store.clone(), store.clone());
        (store, engine)
    }

    fn valid_payload() -> NewRequest {
        NewRequest {
            project_id: Some(1),
            request_type: "material".to_string(),
            description: Some("Cement bags for the slab pour".to_string()),
            estimated_cost: Some(1_200.0),
            requested_by: Some(7),
            ..NewRequest::default()
        }
    }

    fn consumable_item(id: i32) -> ItemWithCategory {
        let at = chrono::DateTime::UNIX_EPOCH.naive_utc();
        ItemWithCategory {
            item: InventoryItem {
                id,
                name: "Safety gloves".to_string(),
                category_id: 1,
                project_id: Some(1),
                quantity: 100,
                available_quantity: 8,
                status: ItemStatus::Available,
                unit: Some("box".to_string()),
                created_at: at,
                updated_at: at,
            },
            category_name: "Consumables".to_string(),
            is_consumable: true,
        }
    }

    async fn approved_request(engine: &WorkflowEngine) -> Request {
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();
        engine
            .transition(request.id, RequestStatus::Reviewed, 2, None)
            .await
            .unwrap();
        engine
            .transition(request.id, RequestStatus::Verified, 3, None)
            .await
            .unwrap();
        engine
            .transition(request.id, RequestStatus::Authorized, 4, None)
            .await
            .unwrap();
        engine
            .transition(request.id, RequestStatus::Approved, 3, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_lands_in_draft_and_audits_it() {
        let (store, engine) = setup();

        let request = engine.create(valid_payload()).await.unwrap();

        assert_eq!(request.status, RequestStatus::Draft);
        assert_eq!(request.urgency, Urgency::Normal);
        assert_eq!(request.requested_by, 7);
        assert_eq!(request.procurement_id, None);

        let trail = store.audit_trail(request.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, actions::REQUEST_CREATED);
        assert_eq!(trail[0].old_status, None);
        assert_eq!(trail[0].new_status, Some(RequestStatus::Draft));
        assert_eq!(trail[0].actor_id, Some(7));
    }

    #[tokio::test]
    async fn create_reports_every_violation_at_once() {
        let (store, engine) = setup();

        let err = engine.create(NewRequest::default()).await.unwrap_err();
        let WorkflowError::Validation(violations) = err else {
            panic!("expected a validation error");
        };

        let fields: Vec<&str> = violations.iter().map(|v| v.field).collect();
        assert_eq!(violations.len(), 4);
        for field in ["project_id", "request_type", "description", "requested_by"] {
            assert!(fields.contains(&field), "missing violation for {field}");
        }

        // Nothing may be written when validation fails.
        assert!(store.list_in_flight().await.unwrap().is_empty());
        assert_eq!(store.find_request(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn create_rejects_date_needed_that_is_not_in_the_future() {
        let (_, engine) = setup();

        for offset in [Duration::zero(), Duration::days(-3)] {
            let payload = NewRequest {
                date_needed: Some(Utc::now().date_naive() + offset),
                ..valid_payload()
            };
            let err = engine.create(payload).await.unwrap_err();
            let WorkflowError::Validation(violations) = err else {
                panic!("expected a validation error");
            };
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].field, "date_needed");
        }
    }

    #[tokio::test]
    async fn create_rejects_overlong_description_and_unknown_urgency() {
        let (_, engine) = setup();

        let payload = NewRequest {
            description: Some("x".repeat(1001)),
            urgency: Some("panic".to_string()),
            ..valid_payload()
        };
        let err = engine.create(payload).await.unwrap_err();
        let WorkflowError::Validation(violations) = err else {
            panic!("expected a validation error");
        };
        let fields: Vec<&str> = violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["description", "urgency"]);
    }

    #[tokio::test]
    async fn create_accepts_tomorrow_and_known_urgency() {
        let (_, engine) = setup();

        let payload = NewRequest {
            date_needed: Some(Utc::now().date_naive() + Duration::days(1)),
            urgency: Some("Critical".to_string()),
            ..valid_payload()
        };
        let request = engine.create(payload).await.unwrap();
        assert_eq!(request.urgency, Urgency::Critical);
    }

    #[tokio::test]
    async fn restock_requires_its_inventory_item() {
        let (_, engine) = setup();

        let payload = NewRequest {
            request_type: "restock".to_string(),
            ..valid_payload()
        };
        let err = engine.create(payload).await.unwrap_err();
        let WorkflowError::RestockIneligible(violations) = err else {
            panic!("expected a restock eligibility error");
        };
        assert!(violations.iter().any(|v| v.contains("required")));
    }

    #[tokio::test]
    async fn restock_rejects_non_consumable_item() {
        let (store, engine) = setup();
        let mut item = consumable_item(5);
        item.is_consumable = false;
        store.add_item(item);

        let payload = NewRequest {
            is_restock: Some(true),
            inventory_item_id: Some(5),
            ..valid_payload()
        };
        let err = engine.create(payload).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RestockIneligible(_)));
    }

    #[tokio::test]
    async fn restock_flag_follows_the_request_type() {
        let (store, engine) = setup();
        store.add_item(consumable_item(5));

        let payload = NewRequest {
            request_type: "restock".to_string(),
            inventory_item_id: Some(5),
            quantity: Some(40),
            ..valid_payload()
        };
        let request = engine.create(payload).await.unwrap();

        assert!(request.is_restock);
        assert_eq!(request.inventory_item_id, Some(5));
        assert_eq!(request.request_type, RequestType::Restock);
    }

    #[tokio::test]
    async fn submit_moves_draft_into_the_flow() {
        let (store, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();

        let submitted = engine.submit(request.id, 7).await.unwrap();
        assert_eq!(submitted.status, RequestStatus::Submitted);

        let trail = store.audit_trail(request.id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].action, actions::REQUEST_SUBMITTED);
        assert_eq!(trail[1].old_status, Some(RequestStatus::Draft));
        assert_eq!(trail[1].new_status, Some(RequestStatus::Submitted));
    }

    #[tokio::test]
    async fn submit_rejects_anything_but_draft() {
        let (store, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();

        let err = engine.submit(request.id, 7).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition {
                from: RequestStatus::Submitted,
                to: RequestStatus::Submitted,
            }
        ));

        // The failed resubmit must not leave an audit entry.
        let trail = store.audit_trail(request.id).await.unwrap();
        assert_eq!(
            trail
                .iter()
                .filter(|e| e.action == actions::REQUEST_SUBMITTED)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn operations_on_missing_requests_report_not_found() {
        let (_, engine) = setup();

        assert!(matches!(
            engine.submit(404, 1).await.unwrap_err(),
            WorkflowError::NotFound(404)
        ));
        assert!(matches!(
            engine
                .transition(404, RequestStatus::Reviewed, 1, None)
                .await
                .unwrap_err(),
            WorkflowError::NotFound(404)
        ));
        assert!(matches!(
            engine
                .link_to_procurement_order(404, 1, None)
                .await
                .unwrap_err(),
            WorkflowError::NotFound(404)
        ));
        assert!(matches!(
            engine.can_be_procured(404).await.unwrap_err(),
            WorkflowError::NotFound(404)
        ));
    }

    #[tokio::test]
    async fn transitions_stamp_the_acting_user_per_step() {
        let (store, engine) = setup();
        let request = approved_request(&engine).await;

        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.reviewed_by, Some(2));
        assert_eq!(request.verified_by, Some(3));
        assert_eq!(request.authorized_by, Some(4));
        assert_eq!(request.approved_by, Some(3));
        assert_eq!(request.declined_by, None);

        let stored = store.find_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored, request);
    }

    #[tokio::test]
    async fn decline_stamps_its_own_field() {
        let (_, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();

        let declined = engine
            .transition(request.id, RequestStatus::Declined, 3, Some("Budget exhausted".to_string()))
            .await
            .unwrap();

        assert_eq!(declined.status, RequestStatus::Declined);
        assert_eq!(declined.declined_by, Some(3));
        assert_eq!(declined.approved_by, None);
        assert_eq!(declined.remarks.as_deref(), Some("Budget exhausted"));
    }

    #[tokio::test]
    async fn remarks_overwrite_only_when_provided() {
        let (_, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();

        let reviewed = engine
            .transition(request.id, RequestStatus::Reviewed, 2, Some("Looks fine".to_string()))
            .await
            .unwrap();
        assert_eq!(reviewed.remarks.as_deref(), Some("Looks fine"));

        let verified = engine
            .transition(request.id, RequestStatus::Verified, 3, None)
            .await
            .unwrap();
        assert_eq!(verified.remarks.as_deref(), Some("Looks fine"));

        let authorized = engine
            .transition(request.id, RequestStatus::Authorized, 4, Some("Within budget".to_string()))
            .await
            .unwrap();
        assert_eq!(authorized.remarks.as_deref(), Some("Within budget"));
    }

    #[tokio::test]
    async fn transition_rejects_reserved_targets() {
        let (_, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();

        for target in [
            RequestStatus::Draft,
            RequestStatus::Submitted,
            RequestStatus::Procured,
        ] {
            let err = engine
                .transition(request.id, target.clone(), 1, None)
                .await
                .unwrap_err();
            assert!(
                matches!(err, WorkflowError::InvalidTransition { .. }),
                "{target} must not be reachable through transition"
            );
        }
    }

    #[tokio::test]
    async fn terminal_requests_never_move_again() {
        let (_, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();
        engine
            .transition(request.id, RequestStatus::Declined, 3, None)
            .await
            .unwrap();

        let err = engine
            .transition(request.id, RequestStatus::Reviewed, 3, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition {
                from: RequestStatus::Declined,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn engine_permits_skipping_between_active_statuses() {
        // The canonical chain is enforced by callers; the engine itself only
        // blocks reserved targets and terminal rows.
        let (_, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();

        let approved = engine
            .transition(request.id, RequestStatus::Approved, 3, None)
            .await
            .unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.approved_by, Some(3));
    }

    #[tokio::test]
    async fn link_marks_the_request_procured_exactly_once() {
        let (store, engine) = setup();
        let request = approved_request(&engine).await;

        engine
            .link_to_procurement_order(request.id, 900, Some(11))
            .await
            .unwrap();

        let row = store.find_request(request.id).await.unwrap().unwrap();
        assert_eq!(row.status, RequestStatus::Procured);
        assert_eq!(row.procurement_id, Some(900));

        let err = engine
            .link_to_procurement_order(request.id, 901, Some(11))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyLinked(900)));
    }

    #[tokio::test]
    async fn link_rejects_requests_that_are_not_approved() {
        let (_, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();

        let err = engine
            .link_to_procurement_order(request.id, 900, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NotApproved {
                status: RequestStatus::Submitted
            }
        ));
    }

    #[tokio::test]
    async fn racing_links_pick_exactly_one_winner() {
        let (store, engine) = setup();
        let request = approved_request(&engine).await;

        let (first, second) = tokio::join!(
            engine.link_to_procurement_order(request.id, 501, Some(11)),
            engine.link_to_procurement_order(request.id, 502, Some(12)),
        );

        let winner = match (&first, &second) {
            (Ok(()), Err(WorkflowError::AlreadyLinked(existing))) => {
                assert_eq!(*existing, 501);
                501
            }
            (Err(WorkflowError::AlreadyLinked(existing)), Ok(())) => {
                assert_eq!(*existing, 502);
                502
            }
            other => panic!("expected exactly one winning link, got {other:?}"),
        };

        let row = store.find_request(request.id).await.unwrap().unwrap();
        assert_eq!(row.status, RequestStatus::Procured);
        assert_eq!(row.procurement_id, Some(winner));

        let trail = store.audit_trail(request.id).await.unwrap();
        assert_eq!(
            trail
                .iter()
                .filter(|e| e.action == actions::LINKED_TO_PROCUREMENT)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn eligibility_mirrors_the_link_guard() {
        let (_, engine) = setup();
        let request = engine.create(valid_payload()).await.unwrap();
        engine.submit(request.id, 7).await.unwrap();

        let pending = engine.can_be_procured(request.id).await.unwrap();
        assert!(!pending.eligible);
        assert!(pending.reason.unwrap().contains("not approved"));

        engine
            .transition(request.id, RequestStatus::Approved, 3, None)
            .await
            .unwrap();
        let ready = engine.can_be_procured(request.id).await.unwrap();
        assert!(ready.eligible);
        assert_eq!(ready.reason, None);

        engine
            .link_to_procurement_order(request.id, 900, None)
            .await
            .unwrap();
        let linked = engine.can_be_procured(request.id).await.unwrap();
        assert!(!linked.eligible);
        assert!(linked.reason.unwrap().contains("900"));
    }

    #[tokio::test]
    async fn audit_trail_chains_old_and_new_status_across_the_lifecycle() {
        let (store, engine) = setup();
        let request = approved_request(&engine).await;
        engine
            .link_to_procurement_order(request.id, 77, Some(5))
            .await
            .unwrap();

        let trail = store.audit_trail(request.id).await.unwrap();
        let seen: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(
            seen,
            vec![
                actions::REQUEST_CREATED,
                actions::REQUEST_SUBMITTED,
                actions::STATUS_CHANGED,
                actions::STATUS_CHANGED,
                actions::STATUS_CHANGED,
                actions::STATUS_CHANGED,
                actions::LINKED_TO_PROCUREMENT,
            ]
        );

        assert_eq!(trail[0].old_status, None);
        for pair in trail.windows(2) {
            assert_eq!(pair[0].new_status, pair[1].old_status);
        }
        assert_eq!(
            trail.last().unwrap().new_status,
            Some(RequestStatus::Procured)
        );
    }
}
