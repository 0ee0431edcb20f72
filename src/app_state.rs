use std::sync::Arc;

use sqlx::PgPool;

use crate::db::store::{InventoryStore, PgRequestStore, RequestStore};
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::queue::ApprovalQueueProjector;

/// Shared state handed to every handler: the raw pool for auth and health
/// queries, the stores behind the workflow, and the engine and queue
/// projections built on top of them.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub requests: Arc<dyn RequestStore>,
    pub inventory: Arc<dyn InventoryStore>,
    pub engine: Arc<WorkflowEngine>,
    pub queues: Arc<ApprovalQueueProjector>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let store = Arc::new(PgRequestStore::new(pool.clone()));
        let requests: Arc<dyn RequestStore> = store.clone();
        let inventory: Arc<dyn InventoryStore> = store;
        let engine = Arc::new(WorkflowEngine::new(requests.clone(), inventory.clone()));
        let queues = Arc::new(ApprovalQueueProjector::new(requests.clone()));

        AppState {
            pool,
            requests,
            inventory,
            engine,
            queues,
        }
    }
}
