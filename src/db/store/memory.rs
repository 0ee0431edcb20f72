use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::db::models::audit::{AuditLogEntry, AuditSeed};
use crate::db::models::inventory::ItemWithCategory;
use crate::db::models::requests::{InsertRequest, Request, RequestStatus, RequestType, Urgency};
use crate::db::store::{
    InventoryStore, RequestStore, RequestPatch, StatusGuard, StoreError, UpdateOutcome,
};

/// In-memory store for tests and local tooling. One mutex orders every
/// write, so the procurement-link guard behaves exactly as it does under
/// Postgres row locks: of two racing writers, only one sees the guard pass.
///
/// Timestamps come from a logical tick counter so rows created back to back
/// always have distinct, strictly increasing `created_at` values.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    requests: BTreeMap<i32, Request>,
    audit: Vec<AuditLogEntry>,
    items: HashMap<i32, ItemWithCategory>,
    managed_projects: HashMap<i32, Vec<i32>>,
    next_request_id: i32,
    next_audit_id: i32,
    ticks: i64,
}

fn tick_time(ticks: i64) -> NaiveDateTime {
    (chrono::DateTime::UNIX_EPOCH + chrono::Duration::seconds(ticks)).naive_utc()
}

impl Inner {
    fn push_audit(
        &mut self,
        request_id: i32,
        old_status: Option<RequestStatus>,
        seed: AuditSeed,
        at: NaiveDateTime,
    ) {
        self.next_audit_id += 1;
        self.audit.push(AuditLogEntry {
            id: self.next_audit_id,
            request_id,
            actor_id: seed.actor_id,
            action: seed.action.to_string(),
            old_status,
            new_status: seed.new_status,
            remarks: seed.remarks,
            created_at: at,
        });
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds an inventory item, keyed by its id.
    pub fn add_item(&self, item: ItemWithCategory) {
        let mut inner = self.lock();
        inner.items.insert(item.item.id, item);
    }

    /// Seeds a request as-is, without audit entries or id assignment.
    pub fn add_request(&self, request: Request) {
        let mut inner = self.lock();
        inner.next_request_id = inner.next_request_id.max(request.id);
        inner.requests.insert(request.id, request);
    }

    pub fn set_managed_projects(&self, user_id: i32, project_ids: Vec<i32>) {
        let mut inner = self.lock();
        inner.managed_projects.insert(user_id, project_ids);
    }

    /// Builds a bare request row for seeding, in draft with the given id.
    /// Tests adjust the fields they care about before calling `add_request`.
    pub fn blank_request(id: i32, project_id: i32) -> Request {
        let at = tick_time(i64::from(id));
        Request {
            id,
            project_id,
            request_type: RequestType::Material,
            category: None,
            is_restock: false,
            inventory_item_id: None,
            description: String::from("seeded request"),
            quantity: None,
            unit: None,
            estimated_cost: None,
            actual_cost: None,
            urgency: Urgency::Normal,
            date_needed: None,
            status: RequestStatus::Draft,
            remarks: None,
            requested_by: 1,
            reviewed_by: None,
            verified_by: None,
            authorized_by: None,
            approved_by: None,
            declined_by: None,
            procurement_id: None,
            created_at: at,
            updated_at: at,
        }
    }
}

fn sorted_by_creation(mut rows: Vec<Request>) -> Vec<Request> {
    rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    rows
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn find_request(&self, id: i32) -> Result<Option<Request>, StoreError> {
        Ok(self.lock().requests.get(&id).cloned())
    }

    async fn insert_request(&self, new: InsertRequest, audit: AuditSeed) -> Result<Request, StoreError> {
        let mut inner = self.lock();
        inner.next_request_id += 1;
        inner.ticks += 1;
        let id = inner.next_request_id;
        let now = tick_time(inner.ticks);

        let request = Request {
            id,
            project_id: new.project_id,
            request_type: new.request_type,
            category: new.category,
            is_restock: new.is_restock,
            inventory_item_id: new.inventory_item_id,
            description: new.description,
            quantity: new.quantity,
            unit: new.unit,
            estimated_cost: new.estimated_cost,
            actual_cost: None,
            urgency: new.urgency,
            date_needed: new.date_needed,
            status: RequestStatus::Draft,
            remarks: None,
            requested_by: new.requested_by,
            reviewed_by: None,
            verified_by: None,
            authorized_by: None,
            approved_by: None,
            declined_by: None,
            procurement_id: None,
            created_at: now,
            updated_at: now,
        };
        inner.requests.insert(id, request.clone());
        inner.push_audit(id, None, audit, now);

        Ok(request)
    }

    async fn update_request_if(
        &self,
        id: i32,
        guard: StatusGuard,
        patch: RequestPatch,
        audit: AuditSeed,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut inner = self.lock();
        inner.ticks += 1;
        let now = tick_time(inner.ticks);

        let Some(row) = inner.requests.get_mut(&id) else {
            return Ok(UpdateOutcome::Missing);
        };
        let previous = row.clone();
        if !guard.allows(&previous) {
            return Ok(UpdateOutcome::GuardFailed(previous));
        }

        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(remarks) = patch.remarks {
            row.remarks = Some(remarks);
        }
        if let Some(user) = patch.reviewed_by {
            row.reviewed_by = Some(user);
        }
        if let Some(user) = patch.verified_by {
            row.verified_by = Some(user);
        }
        if let Some(user) = patch.authorized_by {
            row.authorized_by = Some(user);
        }
        if let Some(user) = patch.approved_by {
            row.approved_by = Some(user);
        }
        if let Some(user) = patch.declined_by {
            row.declined_by = Some(user);
        }
        if let Some(order) = patch.procurement_id {
            row.procurement_id = Some(order);
        }
        row.updated_at = now;
        let updated = row.clone();

        inner.push_audit(id, Some(previous.status), audit, now);

        Ok(UpdateOutcome::Updated(updated))
    }

    async fn list_in_flight(&self) -> Result<Vec<Request>, StoreError> {
        let rows = self
            .lock()
            .requests
            .values()
            .filter(|r| r.status.is_in_flight())
            .cloned()
            .collect();
        Ok(sorted_by_creation(rows))
    }

    async fn list_approved_unlinked(&self, project_id: Option<i32>) -> Result<Vec<Request>, StoreError> {
        let rows = self
            .lock()
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::Approved && r.procurement_id.is_none())
            .filter(|r| project_id.map_or(true, |p| r.project_id == p))
            .cloned()
            .collect();
        Ok(sorted_by_creation(rows))
    }

    async fn audit_trail(&self, request_id: i32) -> Result<Vec<AuditLogEntry>, StoreError> {
        let entries = self
            .lock()
            .audit
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect();
        Ok(entries)
    }

    async fn managed_project_ids(&self, user_id: i32) -> Result<Vec<i32>, StoreError> {
        Ok(self
            .lock()
            .managed_projects
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn find_item_with_category(&self, item_id: i32) -> Result<Option<ItemWithCategory>, StoreError> {
        Ok(self.lock().items.get(&item_id).cloned())
    }
}
