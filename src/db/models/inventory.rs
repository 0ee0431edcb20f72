use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "item_status", rename_all = "snake_case")]
pub enum ItemStatus {
    Available,
    Borrowed,
    InMaintenance,
    Retired,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow, ToSchema)]
pub struct InventoryItem {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
    pub project_id: Option<i32>,
    pub quantity: i32,
    pub available_quantity: i32,
    pub status: ItemStatus,
    pub unit: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Inventory item joined with the category columns restock checks care about.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow, ToSchema)]
pub struct ItemWithCategory {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: InventoryItem,
    pub category_name: String,
    pub is_consumable: bool,
}
