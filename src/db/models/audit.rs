use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::requests::RequestStatus;

/// Well-known audit actions. Kept as plain strings in the log so new actions
/// never need a schema migration.
pub mod actions {
    pub const REQUEST_CREATED: &str = "request_created";
    pub const REQUEST_SUBMITTED: &str = "request_submitted";
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const LINKED_TO_PROCUREMENT: &str = "linked_to_procurement_order";
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: i32,
    pub request_id: i32,
    pub actor_id: Option<i32>,
    pub action: String,
    pub old_status: Option<RequestStatus>,
    pub new_status: Option<RequestStatus>,
    pub remarks: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Data for the audit entry a store writes in the same transaction as the
/// request mutation it describes. The store fills in `old_status` from the
/// row it read inside that transaction.
#[derive(Debug, Clone)]
pub struct AuditSeed {
    pub actor_id: Option<i32>,
    pub action: &'static str,
    pub new_status: Option<RequestStatus>,
    pub remarks: Option<String>,
}
