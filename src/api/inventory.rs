use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::store_error;
use crate::app_state::AppState;
use crate::db::models::inventory::{InventoryItem, ItemStatus, ItemWithCategory};
use crate::db::models::requests::Urgency;
use crate::utils::api_response::ApiResponse;
use crate::workflow::restock;

pub fn inventory_routes() -> Router<AppState> {
    Router::new().route("/inventory/{item_id}/restock-info", get(get_restock_info))
}

/// Restock snapshot for an inventory item: how much stock is left and how
/// urgently a restock request should be filed.
#[derive(Debug, Serialize, ToSchema)]
pub struct RestockInfo {
    pub stock_level_percentage: f64,
    pub suggested_urgency: Urgency,
    #[serde(flatten)]
    pub item: ItemWithCategory,
}

#[utoipa::path(
    get,
    path = "/inventory/{item_id}/restock-info",
    params(
        ("item_id" = i32, Path, description = "Inventory item ID")
    ),
    responses(
        (status = 200, description = "Restock information for the item", body = RestockInfo),
        (status = 404, description = "Inventory item not found")
    ),
    tag = "Inventory",
    security(("bearerAuth" = []))
)]
pub async fn get_restock_info(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
) -> Result<ApiResponse<RestockInfo>, ApiResponse<()>> {
    let item = state
        .inventory
        .find_item_with_category(item_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            ApiResponse::<()>::error(
                StatusCode::NOT_FOUND,
                format!("Inventory item {item_id} not found"),
                None,
            )
        })?;

    let info = RestockInfo {
        stock_level_percentage: restock::stock_level_percentage(&item.item),
        suggested_urgency: restock::suggested_urgency(&item.item),
        item,
    };

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Restock information",
        info,
    ))
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(get_restock_info),
    components(schemas(RestockInfo, InventoryItem, ItemWithCategory, ItemStatus)),
    tags(
        (name = "Inventory", description = "Inventory lookups that feed restock requests")
    )
)]
pub struct InventoryDoc;
