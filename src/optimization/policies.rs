//! Per-category item policies: recency dates, ordering and field reduction

use super::relevance::DataCategory;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Fallback date field when the category's own field is absent
const FALLBACK_DATE_FIELD: &str = "createdAt";

impl DataCategory {
    /// Field that dates an item for recency filtering
    pub fn date_field(&self) -> Option<&'static str> {
        match self {
            DataCategory::Orders | DataCategory::PurchaseOrders => Some("orderDate"),
            DataCategory::ProductionTasks => Some("scheduledDate"),
            DataCategory::QualityTests => Some("testDate"),
            DataCategory::MaterialBatches => Some("receivedDate"),
            DataCategory::Inventory | DataCategory::Recipes => Some("updatedAt"),
            _ => None,
        }
    }

    /// Identifying fields kept when details are dropped
    fn summary_fields(&self) -> &'static [&'static str] {
        match self {
            DataCategory::Recipes => &["id", "name", "productName", "status", "yield"],
            DataCategory::Inventory => &["id", "name", "category", "quantity", "unit", "minStock"],
            DataCategory::Orders => &["id", "orderNumber", "status", "orderDate", "totalValue"],
            DataCategory::ProductionTasks => &[
                "id",
                "moNumber",
                "productName",
                "status",
                "scheduledDate",
                "quantity",
            ],
            DataCategory::Suppliers => &["id", "name", "city"],
            DataCategory::PurchaseOrders => &["id", "number", "status", "orderDate", "items"],
            DataCategory::InventorySupplierPrices => {
                &["inventoryItemId", "supplierId", "price", "currency"]
            }
            DataCategory::MaterialBatches => {
                &["id", "batchNumber", "itemName", "quantity", "expiryDate"]
            }
            DataCategory::QualityTests => &["id", "name", "status", "result", "testDate"],
            _ => &["id", "name", "status"],
        }
    }
}

/// Parse the date formats found in snapshots: RFC 3339 strings, plain
/// `YYYY-MM-DD`, `{seconds, nanoseconds}` timestamp objects and epoch millis.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                return Some(dt.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).unwrap_or(0))
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Date of an item under the category's date field
pub fn item_date(category: DataCategory, item: &Value) -> Option<DateTime<Utc>> {
    let field = category.date_field()?;
    item.get(field)
        .or_else(|| item.get(FALLBACK_DATE_FIELD))
        .and_then(parse_date)
}

/// Keep items dated within the last `days` days. Undated items are kept.
pub fn filter_recent(
    category: DataCategory,
    items: Vec<Value>,
    now: DateTime<Utc>,
    days: i64,
) -> Vec<Value> {
    if category.date_field().is_none() {
        return items;
    }
    let cutoff = now - Duration::days(days);
    items
        .into_iter()
        .filter(|item| item_date(category, item).map_or(true, |date| date >= cutoff))
        .collect()
}

fn number(item: &Value, field: &str) -> Option<f64> {
    item.get(field).and_then(Value::as_f64)
}

fn is_low_stock(item: &Value) -> bool {
    let quantity = number(item, "quantity");
    let minimum = number(item, "minStock").or_else(|| number(item, "minStockLevel"));
    matches!((quantity, minimum), (Some(q), Some(m)) if q <= m)
}

/// Rank of a production status; lower runs first
fn status_priority(item: &Value) -> u8 {
    let status = item
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    match status.as_str() {
        "w trakcie" | "in progress" | "in_progress" => 0,
        "wstrzymane" | "on hold" | "paused" => 1,
        "zaplanowane" | "planned" | "scheduled" => 2,
        "zakończone" | "completed" | "done" => 4,
        _ => 3,
    }
}

/// Dated items first, newest first
fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Dated items first, soonest first
fn soonest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Order items so the most useful ones survive truncation
pub fn sort_items(category: DataCategory, items: &mut [Value]) {
    match category {
        DataCategory::Inventory => {
            items.sort_by_key(|item| !is_low_stock(item));
        }
        DataCategory::Orders | DataCategory::PurchaseOrders | DataCategory::QualityTests => {
            items.sort_by(|a, b| newest_first(item_date(category, a), item_date(category, b)));
        }
        DataCategory::ProductionTasks => {
            items.sort_by(|a, b| {
                soonest_first(item_date(category, a), item_date(category, b))
                    .then_with(|| status_priority(a).cmp(&status_priority(b)))
            });
        }
        DataCategory::MaterialBatches => {
            items.sort_by(|a, b| {
                soonest_first(
                    a.get("expiryDate").and_then(parse_date),
                    b.get("expiryDate").and_then(parse_date),
                )
            });
        }
        _ => {}
    }
}

/// Display name of a nested party (`customer`, `supplier`)
fn nested_name(item: &Value, object_field: &str, flat_field: &str) -> Option<Value> {
    item.get(object_field)
        .and_then(|party| party.get("name"))
        .or_else(|| item.get(flat_field))
        .cloned()
}

/// Reduce an item to its identifying fields
pub fn simplify_item(category: DataCategory, item: &Value) -> Value {
    let Value::Object(source) = item else {
        return item.clone();
    };
    if matches!(category, DataCategory::Summary | DataCategory::Analysis) {
        return item.clone();
    }

    let mut reduced: Map<String, Value> = category
        .summary_fields()
        .iter()
        .filter_map(|field| source.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect();

    match category {
        DataCategory::Recipes => {
            if let Some(ingredients) = source.get("ingredients").and_then(Value::as_array) {
                reduced.insert("ingredientsCount".into(), ingredients.len().into());
            }
        }
        DataCategory::Orders => {
            if let Some(name) = nested_name(item, "customer", "customerName") {
                reduced.insert("customerName".into(), name);
            }
        }
        DataCategory::PurchaseOrders => {
            if let Some(name) = nested_name(item, "supplier", "supplierName") {
                reduced.insert("supplierName".into(), name);
            }
        }
        DataCategory::Inventory => {
            if is_low_stock(item) {
                reduced.insert("lowStock".into(), Value::Bool(true));
            }
        }
        _ => {}
    }

    let reduced = Value::Object(reduced);
    if serialized_len(&reduced) <= serialized_len(item) {
        reduced
    } else {
        item.clone()
    }
}

/// Length of the compact JSON rendering
pub(crate) fn serialized_len(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

/// Keep only numeric and boolean counters of a summary block
pub fn reduce_summary(summary: &Value) -> Value {
    let Value::Object(source) = summary else {
        return summary.clone();
    };
    let counters: Map<String, Value> = source
        .iter()
        .filter(|(_, v)| v.is_number() || v.is_boolean())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if counters.is_empty() {
        summary.clone()
    } else {
        Value::Object(counters)
    }
}
