// src/workflow/queue.rs
//
// Role-scoped approval queues. Visibility and ordering are pure functions
// over request rows; the projector glues them to the store.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::db::models::requests::{Request, RequestType};
use crate::db::store::RequestStore;
use crate::workflow::error::WorkflowError;

/// Requests with an estimated cost above this amount always land in the
/// finance director's queue, whatever their type.
pub const FINANCE_REVIEW_THRESHOLD: f64 = 50_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SystemAdmin,
    AssetDirector,
    FinanceDirector,
    ProcurementOfficer,
    ProjectManager,
}

impl Role {
    /// Role names come from user records in several historical spellings
    /// ("Asset Director", "asset_director", "assetdirector"), so matching
    /// ignores case and separators.
    pub fn from_name(name: &str) -> Option<Role> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "systemadmin" | "admin" => Some(Role::SystemAdmin),
            "assetdirector" => Some(Role::AssetDirector),
            "financedirector" => Some(Role::FinanceDirector),
            "procurementofficer" => Some(Role::ProcurementOfficer),
            "projectmanager" => Some(Role::ProjectManager),
            _ => None,
        }
    }
}

/// The authenticated user a queue or transition is evaluated for.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: i32,
    pub role_name: String,
    pub managed_project_ids: Vec<i32>,
}

impl ActorContext {
    pub fn role(&self) -> Option<Role> {
        Role::from_name(&self.role_name)
    }
}

/// Whether a request belongs in this actor's pending queue. Unknown roles
/// see nothing.
pub fn visible_to(actor: &ActorContext, request: &Request) -> bool {
    match actor.role() {
        Some(Role::SystemAdmin) | Some(Role::AssetDirector) => true,
        Some(Role::FinanceDirector) => {
            let costly = request
                .estimated_cost
                .map_or(false, |cost| cost > FINANCE_REVIEW_THRESHOLD);
            costly
                || matches!(
                    request.request_type,
                    RequestType::PettyCash | RequestType::Service
                )
        }
        Some(Role::ProcurementOfficer) => matches!(
            request.request_type,
            RequestType::Material | RequestType::Tool | RequestType::Equipment
        ),
        Some(Role::ProjectManager) => actor.managed_project_ids.contains(&request.project_id),
        None => false,
    }
}

/// Most urgent first; equal urgency keeps submission order.
pub fn pending_order(a: &Request, b: &Request) -> Ordering {
    a.urgency
        .rank()
        .cmp(&b.urgency.rank())
        .then_with(|| a.created_at.cmp(&b.created_at))
}

/// Soonest needed first; requests without a needed-by date go last.
pub fn procurement_order(a: &Request, b: &Request) -> Ordering {
    let a_key = (a.date_needed.is_none(), a.date_needed);
    let b_key = (b.date_needed.is_none(), b.date_needed);
    a_key.cmp(&b_key).then_with(|| a.created_at.cmp(&b.created_at))
}

pub struct ApprovalQueueProjector {
    store: Arc<dyn RequestStore>,
}

impl ApprovalQueueProjector {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        ApprovalQueueProjector { store }
    }

    /// In-flight requests this actor's role puts in front of them.
    pub async fn pending_for(&self, actor: &ActorContext) -> Result<Vec<Request>, WorkflowError> {
        let mut requests: Vec<Request> = self
            .store
            .list_in_flight()
            .await?
            .into_iter()
            .filter(|request| visible_to(actor, request))
            .collect();
        requests.sort_by(pending_order);
        Ok(requests)
    }

    /// Approved requests still waiting for a procurement order.
    pub async fn approved_awaiting_procurement(
        &self,
        project_id: Option<i32>,
    ) -> Result<Vec<Request>, WorkflowError> {
        let mut requests = self.store.list_approved_unlinked(project_id).await?;
        requests.sort_by(procurement_order);
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::db::models::requests::{RequestStatus, Urgency};
    use crate::db::store::MemoryStore;

    fn actor(role: &str) -> ActorContext {
        ActorContext {
            user_id: 9,
            role_name: role.to_string(),
            managed_project_ids: vec![],
        }
    }

    fn pending(id: i32, project_id: i32) -> Request {
        let mut request = MemoryStore::blank_request(id, project_id);
        request.status = RequestStatus::Submitted;
        request
    }

    #[test]
    fn role_names_match_loosely() {
        assert_eq!(Role::from_name("Asset Director"), Some(Role::AssetDirector));
        assert_eq!(Role::from_name("asset_director"), Some(Role::AssetDirector));
        assert_eq!(Role::from_name("ASSETDIRECTOR"), Some(Role::AssetDirector));
        assert_eq!(Role::from_name("admin"), Some(Role::SystemAdmin));
        assert_eq!(Role::from_name("warehouse"), None);
    }

    #[test]
    fn finance_director_sees_costly_and_finance_typed_requests() {
        let finance = actor("Finance Director");

        let mut costly = pending(1, 1);
        costly.estimated_cost = Some(60_000.0);
        assert!(visible_to(&finance, &costly));

        let mut cheap = pending(2, 1);
        cheap.estimated_cost = Some(1_000.0);
        assert!(!visible_to(&finance, &cheap));

        let mut petty_cash = pending(3, 1);
        petty_cash.request_type = RequestType::PettyCash;
        petty_cash.estimated_cost = None;
        assert!(visible_to(&finance, &petty_cash));

        let mut service = pending(4, 1);
        service.request_type = RequestType::Service;
        service.estimated_cost = Some(100.0);
        assert!(visible_to(&finance, &service));
    }

    #[test]
    fn finance_threshold_is_exclusive() {
        let finance = actor("finance_director");
        let mut at_threshold = pending(1, 1);
        at_threshold.estimated_cost = Some(FINANCE_REVIEW_THRESHOLD);
        assert!(!visible_to(&finance, &at_threshold));
    }

    #[test]
    fn procurement_officer_sees_goods_requests_only() {
        let officer = actor("Procurement Officer");

        for (id, request_type, expected) in [
            (1, RequestType::Material, true),
            (2, RequestType::Tool, true),
            (3, RequestType::Equipment, true),
            (4, RequestType::Service, false),
            (5, RequestType::PettyCash, false),
        ] {
            let mut request = pending(id, 1);
            request.request_type = request_type;
            assert_eq!(visible_to(&officer, &request), expected);
        }
    }

    #[test]
    fn project_manager_sees_managed_projects_only() {
        let mut manager = actor("Project Manager");
        manager.managed_project_ids = vec![1, 3];

        assert!(visible_to(&manager, &pending(1, 1)));
        assert!(visible_to(&manager, &pending(2, 3)));
        assert!(!visible_to(&manager, &pending(3, 2)));
    }

    #[test]
    fn directors_and_admins_see_everything() {
        let mut costly = pending(1, 7);
        costly.estimated_cost = Some(1.0);
        assert!(visible_to(&actor("Asset Director"), &costly));
        assert!(visible_to(&actor("System Admin"), &costly));
    }

    #[test]
    fn unknown_role_sees_nothing() {
        assert!(!visible_to(&actor("warehouse"), &pending(1, 1)));
    }

    #[tokio::test]
    async fn pending_queue_orders_by_urgency_then_age() {
        let store = Arc::new(MemoryStore::new());
        let mut normal = pending(1, 1);
        normal.urgency = Urgency::Normal;
        let mut critical = pending(2, 1);
        critical.urgency = Urgency::Critical;
        let mut urgent = pending(3, 1);
        urgent.urgency = Urgency::Urgent;
        let mut older_critical = pending(4, 1);
        older_critical.urgency = Urgency::Critical;
        // Seeded ids produce increasing created_at, so make the later row older.
        older_critical.created_at = critical.created_at - chrono::Duration::hours(1);
        store.add_request(normal);
        store.add_request(critical);
        store.add_request(urgent);
        store.add_request(older_critical);

        let projector = ApprovalQueueProjector::new(store);
        let queue = projector.pending_for(&actor("System Admin")).await.unwrap();

        let ids: Vec<i32> = queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }

    #[tokio::test]
    async fn pending_queue_excludes_requests_outside_the_flow() {
        let store = Arc::new(MemoryStore::new());
        for (id, status) in [
            (1, RequestStatus::Draft),
            (2, RequestStatus::Submitted),
            (3, RequestStatus::Approved),
            (4, RequestStatus::Declined),
            (5, RequestStatus::Procured),
        ] {
            let mut request = MemoryStore::blank_request(id, 1);
            request.status = status;
            if request.status == RequestStatus::Procured {
                request.procurement_id = Some(77);
            }
            store.add_request(request);
        }

        let projector = ApprovalQueueProjector::new(store);
        let queue = projector.pending_for(&actor("System Admin")).await.unwrap();

        let ids: Vec<i32> = queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn pending_queue_applies_role_visibility() {
        let store = Arc::new(MemoryStore::new());
        let mut material = pending(1, 1);
        material.request_type = RequestType::Material;
        let mut service = pending(2, 1);
        service.request_type = RequestType::Service;
        store.add_request(material);
        store.add_request(service);

        let projector = ApprovalQueueProjector::new(store);
        let queue = projector
            .pending_for(&actor("Procurement Officer"))
            .await
            .unwrap();

        let ids: Vec<i32> = queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn approved_queue_orders_by_date_needed_with_undated_last() {
        let store = Arc::new(MemoryStore::new());
        let date = |day| NaiveDate::from_ymd_opt(2025, 6, day).unwrap();

        for (id, date_needed) in [(1, Some(date(20))), (2, Some(date(5))), (3, None)] {
            let mut request = MemoryStore::blank_request(id, 1);
            request.status = RequestStatus::Approved;
            request.date_needed = date_needed;
            store.add_request(request);
        }

        let projector = ApprovalQueueProjector::new(store);
        let queue = projector.approved_awaiting_procurement(None).await.unwrap();

        let ids: Vec<i32> = queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn approved_queue_narrows_to_one_project_and_skips_linked_rows() {
        let store = Arc::new(MemoryStore::new());
        let mut ours = MemoryStore::blank_request(1, 1);
        ours.status = RequestStatus::Approved;
        let mut other_project = MemoryStore::blank_request(2, 2);
        other_project.status = RequestStatus::Approved;
        let mut linked = MemoryStore::blank_request(3, 1);
        linked.status = RequestStatus::Procured;
        linked.procurement_id = Some(12);
        store.add_request(ours);
        store.add_request(other_project);
        store.add_request(linked);

        let projector = ApprovalQueueProjector::new(store);
        let queue = projector
            .approved_awaiting_procurement(Some(1))
            .await
            .unwrap();

        let ids: Vec<i32> = queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
    }
}
