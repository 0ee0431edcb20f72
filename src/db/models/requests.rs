// src/db/models/requests.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Submitted,
    Reviewed,
    Forwarded,
    Verified,
    Authorized,
    Approved,
    Declined,
    Procured,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "Draft",
            RequestStatus::Submitted => "Submitted",
            RequestStatus::Reviewed => "Reviewed",
            RequestStatus::Forwarded => "Forwarded",
            RequestStatus::Verified => "Verified",
            RequestStatus::Authorized => "Authorized",
            RequestStatus::Approved => "Approved",
            RequestStatus::Declined => "Declined",
            RequestStatus::Procured => "Procured",
        }
    }

    /// Declined and procured requests never move again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Declined | RequestStatus::Procured)
    }

    /// Statuses between submission and the approval decision. These are the
    /// rows approvers see in their pending queues.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            RequestStatus::Submitted
                | RequestStatus::Reviewed
                | RequestStatus::Forwarded
                | RequestStatus::Verified
                | RequestStatus::Authorized
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_type", rename_all = "snake_case")]
pub enum RequestType {
    Material,
    Tool,
    Equipment,
    Service,
    PettyCash,
    Restock,
    Other,
}

impl RequestType {
    /// Parses a client-supplied type name, tolerating case and separator noise
    /// ("petty_cash", "Petty Cash" and "PettyCash" all match).
    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "material" => Some(RequestType::Material),
            "tool" => Some(RequestType::Tool),
            "equipment" => Some(RequestType::Equipment),
            "service" => Some(RequestType::Service),
            "pettycash" => Some(RequestType::PettyCash),
            "restock" => Some(RequestType::Restock),
            "other" => Some(RequestType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "urgency", rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Urgent,
    Critical,
}

impl Urgency {
    pub fn parse(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "normal" => Some(Urgency::Normal),
            "urgent" => Some(Urgency::Urgent),
            "critical" => Some(Urgency::Critical),
            _ => None,
        }
    }

    /// Sort rank for pending queues, most urgent first.
    pub fn rank(&self) -> u8 {
        match self {
            Urgency::Critical => 0,
            Urgency::Urgent => 1,
            Urgency::Normal => 2,
        }
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow, ToSchema)]
pub struct Request {
    pub id: i32,
    pub project_id: i32,
    pub request_type: RequestType,
    pub category: Option<String>,
    pub is_restock: bool,
    pub inventory_item_id: Option<i32>,
    pub description: String,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub urgency: Urgency,
    pub date_needed: Option<NaiveDate>,
    pub status: RequestStatus,
    pub remarks: Option<String>,
    pub requested_by: i32,
    pub reviewed_by: Option<i32>,
    pub verified_by: Option<i32>,
    pub authorized_by: Option<i32>,
    pub approved_by: Option<i32>,
    pub declined_by: Option<i32>,
    pub procurement_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Client payload for creating a request. Fields arrive loosely typed so the
/// workflow engine can report every violation in one pass instead of failing
/// on the first bad field.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct NewRequest {
    pub project_id: Option<i32>,
    #[serde(default)]
    pub request_type: String,
    pub category: Option<String>,
    pub is_restock: Option<bool>,
    pub inventory_item_id: Option<i32>,
    pub description: Option<String>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub estimated_cost: Option<f64>,
    pub urgency: Option<String>,
    pub date_needed: Option<NaiveDate>,
    pub requested_by: Option<i32>,
}

/// Fully validated creation data handed to the store. Every new request
/// starts out in draft.
#[derive(Debug, Clone)]
pub struct InsertRequest {
    pub project_id: i32,
    pub request_type: RequestType,
    pub category: Option<String>,
    pub is_restock: bool,
    pub inventory_item_id: Option<i32>,
    pub description: String,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub estimated_cost: Option<f64>,
    pub urgency: Urgency,
    pub date_needed: Option<NaiveDate>,
    pub requested_by: i32,
}
