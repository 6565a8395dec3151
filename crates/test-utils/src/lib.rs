//! Society kernel test utilities.
//!
//! Helpers for integration testing: request body fixtures for the exposed
//! tables, a token subject builder, and JSON assertion utilities.

use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

/// Create a flat mutation body with the required columns filled in.
pub fn test_flat(flat_number: &str) -> TestFlat {
    TestFlat {
        flat_number: flat_number.to_string(),
        floor_number: 1,
        block: None,
        occupancy_status: None,
        maintenance_amount: None,
    }
}

/// A flat body builder.
#[derive(Debug, Clone)]
pub struct TestFlat {
    pub flat_number: String,
    pub floor_number: i64,
    pub block: Option<String>,
    pub occupancy_status: Option<String>,
    pub maintenance_amount: Option<f64>,
}

impl TestFlat {
    pub fn on_floor(mut self, floor: i64) -> Self {
        self.floor_number = floor;
        self
    }

    pub fn in_block(mut self, block: &str) -> Self {
        self.block = Some(block.to_string());
        self
    }

    pub fn occupied(mut self) -> Self {
        self.occupancy_status = Some("occupied".to_string());
        self
    }

    pub fn with_maintenance(mut self, amount: f64) -> Self {
        self.maintenance_amount = Some(amount);
        self
    }

    /// Render the API request body.
    pub fn body(&self) -> JsonValue {
        let mut body = Map::new();
        body.insert("flatNumber".into(), json!(self.flat_number));
        body.insert("floorNumber".into(), json!(self.floor_number));
        if let Some(block) = &self.block {
            body.insert("block".into(), json!(block));
        }
        if let Some(status) = &self.occupancy_status {
            body.insert("occupancyStatus".into(), json!(status));
        }
        if let Some(amount) = self.maintenance_amount {
            body.insert("maintenanceAmount".into(), json!(amount));
        }
        JsonValue::Object(body)
    }
}

/// Create a resident mutation body for a flat.
pub fn test_resident(flat_id: Uuid, name: &str) -> JsonValue {
    json!({
        "flatId": flat_id,
        "name": name,
        "residentType": "owner",
    })
}

/// Create a ledger entry mutation body.
pub fn test_entry(entry_type: &str, amount: f64) -> TestEntry {
    TestEntry {
        entry_type: entry_type.to_string(),
        amount,
        transaction_date: "2026-01-15".to_string(),
        flat_id: None,
        category: None,
        paid_by: None,
    }
}

/// A ledger entry body builder.
#[derive(Debug, Clone)]
pub struct TestEntry {
    pub entry_type: String,
    pub amount: f64,
    pub transaction_date: String,
    pub flat_id: Option<Uuid>,
    pub category: Option<String>,
    pub paid_by: Option<String>,
}

impl TestEntry {
    /// A credit collected from a flat.
    pub fn credit(flat_id: Uuid, amount: f64) -> Self {
        test_entry("credit", amount).for_flat(flat_id)
    }

    /// A debit paid out for a category.
    pub fn debit(category: &str, amount: f64) -> Self {
        let mut entry = test_entry("debit", amount);
        entry.category = Some(category.to_string());
        entry.paid_by = Some("Treasurer".to_string());
        entry
    }

    pub fn for_flat(mut self, flat_id: Uuid) -> Self {
        self.flat_id = Some(flat_id);
        self
    }

    pub fn on_date(mut self, date: &str) -> Self {
        self.transaction_date = date.to_string();
        self
    }

    /// Render the API request body.
    pub fn body(&self) -> JsonValue {
        let mut body = Map::new();
        body.insert("entryType".into(), json!(self.entry_type));
        body.insert("amount".into(), json!(self.amount));
        body.insert("transactionDate".into(), json!(self.transaction_date));
        if let Some(flat_id) = self.flat_id {
            body.insert("flatId".into(), json!(flat_id));
        }
        if let Some(category) = &self.category {
            body.insert("category".into(), json!(category));
        }
        if let Some(paid_by) = &self.paid_by {
            body.insert("paidBy".into(), json!(paid_by));
        }
        JsonValue::Object(body)
    }
}

/// Create a token subject with the given permissions.
pub fn test_user(permissions: &[&str]) -> TestUser {
    let id = Uuid::now_v7();
    TestUser {
        id,
        email: format!("user-{}@example.test", id.simple()),
        name: "Test User".to_string(),
        permissions: permissions.iter().map(|s| s.to_string()).collect(),
    }
}

/// Create a subject holding every permission.
pub fn admin_user() -> TestUser {
    test_user(&["*"])
}

/// A token subject builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub permissions: Vec<String>,
}

impl TestUser {
    /// Add a permission.
    pub fn with_permission(mut self, perm: &str) -> Self {
        self.permissions.push(perm.to_string());
        self
    }
}

/// Assertion helpers for JSON responses.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{}', got: {}",
            key,
            value
        );
    }

    /// Assert that a list response carries exactly `expected` rows.
    pub fn data_len(value: &Value, expected: usize) {
        let len = value["data"].as_array().map(Vec::len);
        assert_eq!(
            len,
            Some(expected),
            "Expected {} rows in data, got: {}",
            expected,
            value
        );
    }

    /// Assert that an error response names `field` in its field list.
    pub fn field_error(value: &Value, field: &str) {
        let found = value["fields"]
            .as_array()
            .is_some_and(|fields| fields.iter().any(|f| f["field"] == field));
        assert!(found, "Expected a field error for '{}', got: {}", field, value);
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }
}
