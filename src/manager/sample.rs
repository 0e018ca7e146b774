//! Synthetic business snapshot and queries for the performance test

use serde_json::{json, Value};

/// Representative questions covering every strategy
pub const SAMPLE_QUERIES: &[&str] = &[
    "Ile jest receptur w systemie?",
    "Pokaż zamówienia klienta Nowak",
    "Które surowce mają niski stan magazynowy?",
    "Pokaż dostawców dla receptur",
    "Przeanalizuj trendy sprzedaży w ostatnim miesiącu",
    "Porównaj koszty produkcji z cenami dostawców",
    "How many production tasks are scheduled this week?",
    "Dlaczego zamówienia są opóźnione?",
];

const STATUSES: &[&str] = &["Zaplanowane", "W trakcie", "Wstrzymane", "Zakończone"];
const ORDER_STATUSES: &[&str] = &["Nowe", "W realizacji", "Wysłane", "Dostarczone"];
const UNITS: &[&str] = &["kg", "szt", "l", "g"];

fn date(day_offset: usize) -> String {
    // 2024-01-01 plus the offset, wrapped inside one year
    let day = day_offset % 365;
    let month_lengths = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut remaining = day;
    for (month, len) in month_lengths.iter().enumerate() {
        if remaining < *len {
            return format!("2024-{:02}-{:02}", month + 1, remaining + 1);
        }
        remaining -= len;
    }
    "2024-12-31".to_string()
}

/// Snapshot shaped like the MRP export: 120 inventory items, 40 recipes and
/// smaller collections for every other area
pub fn sample_snapshot() -> Value {
    let inventory: Vec<Value> = (0..120)
        .map(|i| {
            json!({
                "id": format!("inv-{i:03}"),
                "name": format!("Surowiec {i}"),
                "category": if i % 3 == 0 { "Opakowania" } else { "Surowce" },
                "quantity": (i * 7) % 150,
                "unit": UNITS[i % UNITS.len()],
                "minStock": 25,
                "location": format!("Regał {}", i % 12),
                "description": "Materiał do produkcji suplementów diety",
                "updatedAt": date(i * 3),
            })
        })
        .collect();

    let recipes: Vec<Value> = (0..40)
        .map(|i| {
            let ingredients: Vec<Value> = (0..6)
                .map(|j| {
                    json!({
                        "inventoryItemId": format!("inv-{:03}", (i * 6 + j) % 120),
                        "quantity": (j + 1) as f64 * 0.5,
                        "unit": "kg",
                    })
                })
                .collect();
            json!({
                "id": format!("rec-{i:03}"),
                "name": format!("Receptura {i}"),
                "productName": format!("Produkt {i}"),
                "status": "Aktywna",
                "yield": 100,
                "instructions": "Wymieszać składniki, granulować, kapsułkować.",
                "ingredients": ingredients,
                "updatedAt": date(i * 5),
            })
        })
        .collect();

    let orders: Vec<Value> = (0..60)
        .map(|i| {
            json!({
                "id": format!("ord-{i:03}"),
                "orderNumber": format!("ZO-{:04}", 1000 + i),
                "status": ORDER_STATUSES[i % ORDER_STATUSES.len()],
                "orderDate": date(i * 6),
                "totalValue": 1500 + i * 37,
                "customer": {"name": format!("Klient {}", i % 9), "email": "biuro@example.com"},
                "items": [{"recipeId": format!("rec-{:03}", i % 40), "quantity": 10 + i}],
            })
        })
        .collect();

    let production_tasks: Vec<Value> = (0..30)
        .map(|i| {
            json!({
                "id": format!("mo-{i:03}"),
                "moNumber": format!("MO-{:04}", 500 + i),
                "productName": format!("Produkt {}", i % 40),
                "status": STATUSES[i % STATUSES.len()],
                "scheduledDate": date(i * 11),
                "quantity": 1000 + i * 10,
                "recipeId": format!("rec-{:03}", i % 40),
            })
        })
        .collect();

    let suppliers: Vec<Value> = (0..12)
        .map(|i| {
            json!({
                "id": format!("sup-{i:02}"),
                "name": format!("Dostawca {i}"),
                "city": if i % 2 == 0 { "Kraków" } else { "Warszawa" },
                "contact": {"email": "zakupy@example.com", "phone": "+48 600 000 000"},
            })
        })
        .collect();

    let purchase_orders: Vec<Value> = (0..25)
        .map(|i| {
            json!({
                "id": format!("po-{i:03}"),
                "number": format!("PO-{:04}", 200 + i),
                "status": if i % 4 == 0 { "Dostarczone" } else { "Zamówione" },
                "orderDate": date(i * 13),
                "supplier": {"id": format!("sup-{:02}", i % 12), "name": format!("Dostawca {}", i % 12)},
                "items": [
                    {"inventoryItemId": format!("inv-{:03}", i % 120), "quantity": 50, "unitPrice": 12.5},
                    {"inventoryItemId": format!("inv-{:03}", (i + 7) % 120), "quantity": 20, "unitPrice": 4.2},
                ],
                "notes": "Dostawa na rampę nr 2",
            })
        })
        .collect();

    let prices: Vec<Value> = (0..80)
        .map(|i| {
            json!({
                "inventoryItemId": format!("inv-{:03}", i % 120),
                "supplierId": format!("sup-{:02}", i % 12),
                "price": 2.0 + (i % 17) as f64 * 0.75,
                "currency": "PLN",
                "minimumOrder": 10,
            })
        })
        .collect();

    let batches: Vec<Value> = (0..50)
        .map(|i| {
            json!({
                "id": format!("batch-{i:03}"),
                "batchNumber": format!("LOT-{:05}", 10000 + i),
                "itemName": format!("Surowiec {}", i % 120),
                "quantity": 25 + i,
                "receivedDate": date(i * 7),
                "expiryDate": date(i * 7 + 300),
            })
        })
        .collect();

    let quality_tests: Vec<Value> = (0..20)
        .map(|i| {
            json!({
                "id": format!("qt-{i:03}"),
                "name": format!("Badanie mikrobiologiczne {i}"),
                "status": "Zakończone",
                "result": if i % 5 == 0 { "Negatywny" } else { "Pozytywny" },
                "testDate": date(i * 17),
            })
        })
        .collect();

    json!({
        "summary": {
            "totalInventoryItems": 120,
            "totalRecipes": 40,
            "totalOrders": 60,
            "totalProductionTasks": 30,
            "totalSuppliers": 12,
            "lowStockItems": 21,
            "currency": "PLN",
        },
        "inventory": inventory,
        "recipes": recipes,
        "orders": orders,
        "productionTasks": production_tasks,
        "suppliers": suppliers,
        "purchaseOrders": purchase_orders,
        "inventorySupplierPrices": prices,
        "materialBatches": batches,
        "qualityTests": quality_tests,
        "analysis": {
            "salesTrend": "rosnący",
            "monthlyRevenue": [42000, 45500, 47100, 51800],
            "topProducts": ["Produkt 3", "Produkt 7", "Produkt 12"],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_shape() {
        let data = sample_snapshot();
        assert_eq!(data["inventory"].as_array().map(Vec::len), Some(120));
        assert_eq!(data["recipes"].as_array().map(Vec::len), Some(40));
        assert!(data["summary"].is_object());
    }

    #[test]
    fn test_date_helper() {
        assert_eq!(date(0), "2024-01-01");
        assert_eq!(date(31), "2024-02-01");
        assert_eq!(date(59), "2024-02-29");
        assert_eq!(date(365), "2024-01-01");
    }
}
