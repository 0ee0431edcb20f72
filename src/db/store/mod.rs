// src/db/store/mod.rs
//
// Storage boundary for the approval workflow. The engine and queue
// projections talk to these traits; `PgRequestStore` backs them with
// Postgres and `MemoryStore` backs them in process for tests and tooling.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::db::models::audit::{AuditLogEntry, AuditSeed};
use crate::db::models::inventory::ItemWithCategory;
use crate::db::models::requests::{InsertRequest, Request, RequestStatus};

pub use memory::MemoryStore;
pub use postgres::PgRequestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Precondition a conditional update evaluates against the current row while
/// holding its lock. Updates whose guard fails leave the row untouched.
#[derive(Debug, Clone)]
pub struct StatusGuard {
    allowed: &'static [RequestStatus],
    require_unlinked: bool,
}

impl StatusGuard {
    /// Passes when the row's status is one of `allowed`.
    pub fn status_in(allowed: &'static [RequestStatus]) -> Self {
        StatusGuard {
            allowed,
            require_unlinked: false,
        }
    }

    /// Passes only for approved rows with no procurement order yet. This is
    /// the guard that makes procurement linking exactly-once.
    pub fn approved_and_unlinked() -> Self {
        StatusGuard {
            allowed: &[RequestStatus::Approved],
            require_unlinked: true,
        }
    }

    pub fn allows(&self, row: &Request) -> bool {
        self.allowed.contains(&row.status) && (!self.require_unlinked || row.procurement_id.is_none())
    }
}

/// Patch applied by a conditional update. `None` fields keep their current
/// value.
#[derive(Debug, Clone, Default)]
pub struct RequestPatch {
    pub status: Option<RequestStatus>,
    pub remarks: Option<String>,
    pub reviewed_by: Option<i32>,
    pub verified_by: Option<i32>,
    pub authorized_by: Option<i32>,
    pub approved_by: Option<i32>,
    pub declined_by: Option<i32>,
    pub procurement_id: Option<i32>,
}

/// Result of a conditional update. `GuardFailed` carries the row as it was
/// when the guard was evaluated so callers can report why it lost.
#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Request),
    GuardFailed(Request),
    Missing,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn find_request(&self, id: i32) -> Result<Option<Request>, StoreError>;

    /// Inserts a draft request and its creation audit entry in one
    /// transaction.
    async fn insert_request(&self, new: InsertRequest, audit: AuditSeed) -> Result<Request, StoreError>;

    /// Atomically re-reads the row, checks `guard`, applies `patch` and writes
    /// the audit entry. No write happens unless the guard passes, and the
    /// audit entry is written only alongside its update.
    async fn update_request_if(
        &self,
        id: i32,
        guard: StatusGuard,
        patch: RequestPatch,
        audit: AuditSeed,
    ) -> Result<UpdateOutcome, StoreError>;

    /// All requests currently moving through the approval chain, oldest first.
    async fn list_in_flight(&self) -> Result<Vec<Request>, StoreError>;

    /// Approved requests with no procurement order yet, optionally narrowed to
    /// one project, oldest first.
    async fn list_approved_unlinked(&self, project_id: Option<i32>) -> Result<Vec<Request>, StoreError>;

    async fn audit_trail(&self, request_id: i32) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Projects the given user manages, for scoping project-manager queues.
    async fn managed_project_ids(&self, user_id: i32) -> Result<Vec<i32>, StoreError>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn find_item_with_category(&self, item_id: i32) -> Result<Option<ItemWithCategory>, StoreError>;
}
