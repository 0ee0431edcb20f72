// src/workflow/restock.rs
//
// Eligibility rules for restock requests and the stock-level heuristics the
// request form is prefilled from. Everything here is pure so the rules can
// be checked without a database.

use crate::db::models::inventory::{InventoryItem, ItemStatus, ItemWithCategory};
use crate::db::models::requests::{NewRequest, Urgency};

/// Checks a restock payload against the item it restocks. Returns the item
/// when every rule passes, otherwise every violated rule at once.
pub fn validate<'a>(
    data: &NewRequest,
    item: Option<&'a ItemWithCategory>,
) -> Result<&'a ItemWithCategory, Vec<String>> {
    let mut violations = Vec::new();

    if let Some(quantity) = data.quantity {
        if quantity <= 0 {
            violations.push("quantity must be greater than zero".to_string());
        }
    }

    let item = match (data.inventory_item_id, item) {
        (None, _) => {
            violations.push("an inventory item is required for restock requests".to_string());
            None
        }
        (Some(item_id), None) => {
            violations.push(format!("inventory item {item_id} was not found"));
            None
        }
        (Some(_), Some(item)) => Some(item),
    };

    if let Some(item) = item {
        if !item.is_consumable {
            violations.push(format!(
                "item '{}' belongs to category '{}', which is not consumable",
                item.item.name, item.category_name
            ));
        }
        if item.item.status == ItemStatus::Retired {
            violations.push(format!("item '{}' is retired", item.item.name));
        }
        if let (Some(request_project), Some(item_project)) = (data.project_id, item.item.project_id) {
            if request_project != item_project {
                violations.push(format!(
                    "item belongs to project {item_project}, not project {request_project}"
                ));
            }
        }
    }

    match item {
        Some(item) if violations.is_empty() => Ok(item),
        _ => Err(violations),
    }
}

/// Available stock as a percentage of total stock. Zero when the item has no
/// stock at all, so empty items never divide by zero.
pub fn stock_level_percentage(item: &InventoryItem) -> f64 {
    if item.quantity <= 0 {
        return 0.0;
    }
    f64::from(item.available_quantity) / f64::from(item.quantity) * 100.0
}

/// Urgency the request form suggests for restocking this item: critical at
/// 10% stock or below (or none at all), urgent at 20% or below.
pub fn suggested_urgency(item: &InventoryItem) -> Urgency {
    if item.available_quantity <= 0 {
        return Urgency::Critical;
    }
    let ratio = f64::from(item.available_quantity) / f64::from(item.quantity.max(1));
    if ratio <= 0.10 {
        Urgency::Critical
    } else if ratio <= 0.20 {
        Urgency::Urgent
    } else {
        Urgency::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn consumable(quantity: i32, available: i32) -> ItemWithCategory {
        let at = DateTime::UNIX_EPOCH.naive_utc();
        ItemWithCategory {
            item: InventoryItem {
                id: 1,
                name: "Safety gloves".to_string(),
                category_id: 1,
                project_id: Some(1),
                quantity,
                available_quantity: available,
                status: ItemStatus::Available,
                unit: Some("box".to_string()),
                created_at: at,
                updated_at: at,
            },
            category_name: "Consumables".to_string(),
            is_consumable: true,
        }
    }

    fn restock_payload() -> NewRequest {
        NewRequest {
            project_id: Some(1),
            inventory_item_id: Some(1),
            quantity: Some(5),
            ..NewRequest::default()
        }
    }

    #[test]
    fn accepts_consumable_item() {
        let item = consumable(100, 10);
        let result = validate(&restock_payload(), Some(&item));
        assert!(result.is_ok());
    }

    #[test]
    fn quantity_is_optional() {
        let item = consumable(100, 10);
        let payload = NewRequest {
            quantity: None,
            ..restock_payload()
        };
        assert!(validate(&payload, Some(&item)).is_ok());
    }

    #[test]
    fn collects_every_violation_at_once() {
        let mut item = consumable(100, 10);
        item.is_consumable = false;
        item.category_name = "Heavy Machinery".to_string();
        let payload = NewRequest {
            quantity: Some(0),
            ..restock_payload()
        };

        let violations = validate(&payload, Some(&item)).unwrap_err();
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.contains("not consumable")));
        assert!(violations.iter().any(|v| v.contains("quantity")));
    }

    #[test]
    fn requires_an_item_id() {
        let payload = NewRequest {
            inventory_item_id: None,
            ..restock_payload()
        };
        let violations = validate(&payload, None).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("required"));
    }

    #[test]
    fn reports_missing_item() {
        let violations = validate(&restock_payload(), None).unwrap_err();
        assert_eq!(violations, vec!["inventory item 1 was not found".to_string()]);
    }

    #[test]
    fn rejects_retired_item() {
        let mut item = consumable(100, 10);
        item.item.status = ItemStatus::Retired;
        let violations = validate(&restock_payload(), Some(&item)).unwrap_err();
        assert!(violations.iter().any(|v| v.contains("retired")));
    }

    #[test]
    fn rejects_item_from_another_project() {
        let mut item = consumable(100, 10);
        item.item.project_id = Some(2);
        let violations = validate(&restock_payload(), Some(&item)).unwrap_err();
        assert!(violations.iter().any(|v| v.contains("project 2")));
    }

    #[test]
    fn item_without_project_matches_any_request() {
        let mut item = consumable(100, 10);
        item.item.project_id = None;
        assert!(validate(&restock_payload(), Some(&item)).is_ok());
    }

    #[test]
    fn empty_stock_reports_zero_percent() {
        let item = consumable(0, 0);
        assert_eq!(stock_level_percentage(&item.item), 0.0);
        assert_eq!(suggested_urgency(&item.item), Urgency::Critical);
    }

    #[test]
    fn urgency_thresholds() {
        assert_eq!(suggested_urgency(&consumable(100, 0).item), Urgency::Critical);
        assert_eq!(suggested_urgency(&consumable(100, 10).item), Urgency::Critical);
        assert_eq!(suggested_urgency(&consumable(100, 15).item), Urgency::Urgent);
        assert_eq!(suggested_urgency(&consumable(100, 20).item), Urgency::Urgent);
        assert_eq!(suggested_urgency(&consumable(100, 21).item), Urgency::Normal);
        assert_eq!(suggested_urgency(&consumable(100, 90).item), Urgency::Normal);
    }

    #[test]
    fn stock_level_is_a_percentage() {
        assert_eq!(stock_level_percentage(&consumable(200, 50).item), 25.0);
        assert_eq!(stock_level_percentage(&consumable(100, 100).item), 100.0);
    }
}
