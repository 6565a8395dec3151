//! Generic record service.
//!
//! Validates mutation bodies against a table's column registry and applies
//! them through a [`RecordStore`]. Managed columns (id, timestamps, derived
//! values) are filled here so every backend stores the same row.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::catalog::{Column, ColumnKind, Managed, Operand, TableSpec};
use crate::error::{AppError, AppResult, FieldError};
use crate::query::CompiledQuery;
use crate::store::RecordStore;

/// Typed column values for a write.
pub type Changes = Vec<(&'static Column, Operand)>;

/// Service for single-row reads and writes on any catalog table.
#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Load one row by id.
    pub async fn get(&self, table: &'static TableSpec, id: Uuid) -> AppResult<JsonValue> {
        self.find(table, id)
            .await?
            .ok_or_else(|| AppError::NotFound(table.label.to_string()))
    }

    /// Load one row by id, if present.
    pub async fn find(&self, table: &'static TableSpec, id: Uuid) -> AppResult<Option<JsonValue>> {
        let rows = self.store.fetch(&CompiledQuery::by_id(table, id), None).await?;
        Ok(rows.into_iter().next())
    }

    /// Validate a body and insert it as a new row.
    pub async fn create(&self, table: &'static TableSpec, body: &JsonValue) -> AppResult<JsonValue> {
        let changes = prepare_insert(table, body)?;
        self.insert(table, &changes).await
    }

    /// Insert already validated values.
    pub async fn insert(&self, table: &'static TableSpec, changes: &Changes) -> AppResult<JsonValue> {
        let row = self.store.insert(table, changes).await?;
        tracing::info!(table = table.name, id = %row["id"], "record created");
        Ok(row)
    }

    /// Validate a partial body and apply it to an existing row.
    pub async fn update(
        &self,
        table: &'static TableSpec,
        id: Uuid,
        body: &JsonValue,
    ) -> AppResult<JsonValue> {
        let changes = prepare_update(table, body)?;
        self.apply(table, id, &changes).await
    }

    /// Apply already validated values to an existing row.
    pub async fn apply(
        &self,
        table: &'static TableSpec,
        id: Uuid,
        changes: &Changes,
    ) -> AppResult<JsonValue> {
        let row = self
            .store
            .update(table, id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound(table.label.to_string()))?;
        tracing::info!(table = table.name, %id, "record updated");
        Ok(row)
    }

    /// Delete a row by id.
    pub async fn delete(&self, table: &'static TableSpec, id: Uuid) -> AppResult<()> {
        if !self.store.delete(table, id).await? {
            return Err(AppError::NotFound(table.label.to_string()));
        }
        tracing::info!(table = table.name, %id, "record deleted");
        Ok(())
    }
}

fn body_object(body: &JsonValue) -> AppResult<&Map<String, JsonValue>> {
    body.as_object()
        .ok_or_else(|| AppError::BadRequest("request body must be a JSON object".to_string()))
}

/// Check every body key names a column; managed columns are ignored.
fn writable_entries<'a>(
    table: &'static TableSpec,
    body: &'a Map<String, JsonValue>,
    errors: &mut Vec<FieldError>,
) -> Vec<(&'static Column, &'a JsonValue)> {
    let mut out = Vec::new();
    for (key, value) in body {
        match table.resolve(key) {
            Ok(col) if col.is_writable() => out.push((col, value)),
            Ok(_) => {}
            Err(_) => errors.push(FieldError::new(key.as_str(), "is not a known field")),
        }
    }
    out
}

fn is_blank(value: &JsonValue) -> bool {
    value.is_null() || value.as_str().is_some_and(|s| s.trim().is_empty())
}

/// Parse one caller-supplied value, recording a field error on failure.
fn parse_value(col: &'static Column, value: &JsonValue, errors: &mut Vec<FieldError>) -> Option<Operand> {
    if col.required && is_blank(value) {
        errors.push(FieldError::new(col.field, "is required"));
        return None;
    }
    // Blank optional values are stored as NULL, so they never collide on
    // unique columns.
    if is_blank(value) {
        return Some(Operand::Null);
    }
    match Operand::parse(col.kind, value) {
        Ok(op) => Some(op),
        Err(reason) => {
            errors.push(FieldError::new(col.field, reason));
            None
        }
    }
}

fn default_value(col: &'static Column) -> AppResult<Option<Operand>> {
    let Some(raw) = col.default else {
        return Ok(None);
    };
    let value = match col.kind {
        ColumnKind::Boolean | ColumnKind::Integer | ColumnKind::Decimal => {
            serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
        }
        _ => JsonValue::String(raw.to_string()),
    };
    Operand::parse(col.kind, &value)
        .map(Some)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bad default for {}: {e}", col.field)))
}

/// Build the full set of column values for a new row.
pub fn prepare_insert(table: &'static TableSpec, body: &JsonValue) -> AppResult<Changes> {
    let body = body_object(body)?;
    let mut errors = Vec::new();
    let supplied = writable_entries(table, body, &mut errors);
    let now = Utc::now();

    let mut changes = Changes::new();
    for col in table.columns {
        match col.managed {
            Managed::Id => changes.push((col, Operand::Uuid(Uuid::now_v7()))),
            Managed::CreatedAt | Managed::UpdatedAt => changes.push((col, Operand::Timestamp(now))),
            Managed::Derived => {
                if let Some(value) = default_value(col)? {
                    changes.push((col, value));
                }
            }
            Managed::Caller => match supplied.iter().find(|(c, _)| c.field == col.field) {
                Some((_, value)) => {
                    if let Some(op) = parse_value(col, value, &mut errors) {
                        changes.push((col, op));
                    }
                }
                None => match default_value(col)? {
                    Some(value) => changes.push((col, value)),
                    None if col.required => errors.push(FieldError::new(col.field, "is required")),
                    None => {}
                },
            },
        }
    }

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Build the column values for a partial update.
pub fn prepare_update(table: &'static TableSpec, body: &JsonValue) -> AppResult<Changes> {
    let body = body_object(body)?;
    let mut errors = Vec::new();
    let supplied = writable_entries(table, body, &mut errors);

    let mut changes = Changes::new();
    for (col, value) in supplied {
        if let Some(op) = parse_value(col, value, &mut errors) {
            changes.push((col, op));
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if let Some(col) = table.columns.iter().find(|c| c.managed == Managed::UpdatedAt) {
        changes.push((col, Operand::Timestamp(Utc::now())));
    }
    Ok(changes)
}

/// Overlay typed changes on a stored row, producing the prospective row.
pub fn merge(row: &JsonValue, changes: &Changes) -> Map<String, JsonValue> {
    let mut merged = row.as_object().cloned().unwrap_or_default();
    for (col, value) in changes {
        merged.insert(col.field.to_string(), value.to_json());
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{FLATS, LEDGER_ENTRIES};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service() -> RecordService {
        RecordService::new(Arc::new(MemoryStore::new()))
    }

    fn field_names(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(fields) => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn insert_fills_managed_and_default_columns() {
        let changes = prepare_insert(&FLATS, &json!({"flatNumber": "F101", "floorNumber": 1})).unwrap();
        let fields: Vec<_> = changes.iter().map(|(c, _)| c.field).collect();
        assert!(fields.contains(&"id"));
        assert!(fields.contains(&"createdAt"));
        assert!(fields.contains(&"updatedAt"));
        let occupancy = changes.iter().find(|(c, _)| c.field == "occupancyStatus").unwrap();
        assert_eq!(occupancy.1, Operand::Text("vacant".into()));
    }

    #[test]
    fn insert_reports_every_bad_field() {
        let err = prepare_insert(
            &FLATS,
            &json!({"floorNumber": "first", "flatNo": "X", "occupancyStatus": "rented"}),
        )
        .unwrap_err();
        let mut fields = field_names(err);
        fields.sort();
        assert_eq!(fields, vec!["flatNo", "flatNumber", "floorNumber", "occupancyStatus"]);
    }

    #[test]
    fn managed_fields_in_body_are_ignored() {
        let changes = prepare_insert(
            &LEDGER_ENTRIES,
            &json!({
                "id": "not-a-uuid",
                "runningBalance": 999,
                "transactionDate": "2024-01-01",
                "entryType": "credit",
                "amount": 100
            }),
        )
        .unwrap();
        let balance = changes.iter().find(|(c, _)| c.field == "runningBalance").unwrap();
        assert_eq!(balance.1, Operand::Decimal(rust_decimal::Decimal::ZERO));
        let id = changes.iter().find(|(c, _)| c.field == "id").unwrap();
        assert!(matches!(id.1, Operand::Uuid(_)));
    }

    #[test]
    fn update_rejects_clearing_required_field() {
        let err = prepare_update(&FLATS, &json!({"flatNumber": ""})).unwrap_err();
        assert_eq!(field_names(err), vec!["flatNumber"]);
    }

    #[test]
    fn update_touches_updated_at() {
        let changes = prepare_update(&FLATS, &json!({"block": "C"})).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].0.field, "updatedAt");
    }

    #[test]
    fn non_object_body_is_bad_request() {
        assert!(matches!(
            prepare_insert(&FLATS, &json!([1, 2])).unwrap_err(),
            AppError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let service = service();
        let row = service
            .create(&FLATS, &json!({"flatNumber": "F101", "floorNumber": 1}))
            .await
            .unwrap();
        let id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();

        let updated = service.update(&FLATS, id, &json!({"block": "A"})).await.unwrap();
        assert_eq!(updated["block"], "A");
        assert_eq!(service.get(&FLATS, id).await.unwrap()["block"], "A");

        service.delete(&FLATS, id).await.unwrap();
        assert!(matches!(
            service.get(&FLATS, id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service.delete(&FLATS, id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
