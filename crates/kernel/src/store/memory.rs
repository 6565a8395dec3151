//! In-process storage.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use super::{Assignments, LedgerStore, RecordStore};
use crate::catalog::{ALL_TABLES, LEDGER_ENTRIES, Operand, TableSpec};
use crate::error::{AppError, AppResult};
use crate::ledger::{LedgerEntry, LedgerPosition, balance};
use crate::query::{CompiledQuery, Window};

/// Rows held in memory, keyed by table name.
///
/// Enforces the unique and foreign key constraints declared in the catalog
/// so it fails the same way PostgreSQL does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<&'static str, Vec<JsonValue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed row without constraint checks.
    pub fn seed(&self, table: &'static TableSpec, row: JsonValue) {
        self.tables.write().entry(table.name).or_default().push(row);
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &'static TableSpec) -> Vec<JsonValue> {
        self.tables.read().get(table.name).cloned().unwrap_or_default()
    }
}

fn id_matches(row: &JsonValue, id: &str) -> bool {
    row.get("id").and_then(JsonValue::as_str) == Some(id)
}

/// Check unique and foreign key constraints for `row` about to be written.
fn check_constraints(
    tables: &HashMap<&'static str, Vec<JsonValue>>,
    table: &'static TableSpec,
    row: &Map<String, JsonValue>,
    id: &str,
) -> AppResult<()> {
    let existing = tables.get(table.name).map(Vec::as_slice).unwrap_or_default();

    for col in table.columns.iter().filter(|c| c.unique) {
        let Some(value) = row.get(col.field).filter(|v| !v.is_null()) else {
            continue;
        };
        if existing
            .iter()
            .any(|other| !id_matches(other, id) && &other[col.field] == value)
        {
            return Err(AppError::Conflict(format!("{}_{}_key", table.name, col.name)));
        }
    }

    for col in table.columns {
        let (Some(target), Some(value)) = (col.references, row.get(col.field).and_then(JsonValue::as_str))
        else {
            continue;
        };
        let found = tables
            .get(target)
            .is_some_and(|rows| rows.iter().any(|r| id_matches(r, value)));
        if !found {
            return Err(AppError::Reference(format!("{}_{}_fkey", table.name, col.name)));
        }
    }

    Ok(())
}

/// Reject deleting a row other rows still reference.
fn check_unreferenced(
    tables: &HashMap<&'static str, Vec<JsonValue>>,
    table: &'static TableSpec,
    id: &str,
) -> AppResult<()> {
    for other in ALL_TABLES {
        for col in other.columns.iter().filter(|c| c.references == Some(table.name)) {
            let referenced = tables.get(other.name).is_some_and(|rows| {
                rows.iter()
                    .any(|r| r.get(col.field).and_then(JsonValue::as_str) == Some(id))
            });
            if referenced {
                return Err(AppError::Reference(format!("{}_{}_fkey", other.name, col.name)));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch(&self, query: &CompiledQuery, window: Option<Window>) -> AppResult<Vec<JsonValue>> {
        let tables = self.tables.read();
        let rows = tables.get(query.table.name).map(Vec::as_slice).unwrap_or_default();
        Ok(query.evaluate(rows, window))
    }

    async fn count(&self, query: &CompiledQuery) -> AppResult<u64> {
        let tables = self.tables.read();
        let rows = tables.get(query.table.name).map(Vec::as_slice).unwrap_or_default();
        Ok(query.count_matching(rows))
    }

    async fn insert(&self, table: &'static TableSpec, values: &Assignments) -> AppResult<JsonValue> {
        let mut row: Map<String, JsonValue> = table
            .columns
            .iter()
            .map(|c| (c.field.to_string(), JsonValue::Null))
            .collect();
        for (col, value) in values {
            row.insert(col.field.to_string(), value.to_json());
        }
        let id = row
            .get("id")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("insert into {} without an id", table.name))?;

        let mut tables = self.tables.write();
        if tables
            .get(table.name)
            .is_some_and(|rows| rows.iter().any(|r| id_matches(r, &id)))
        {
            return Err(AppError::Conflict(format!("{}_pkey", table.name)));
        }
        check_constraints(&tables, table, &row, &id)?;

        let row = JsonValue::Object(row);
        tables.entry(table.name).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &'static TableSpec,
        id: Uuid,
        values: &Assignments,
    ) -> AppResult<Option<JsonValue>> {
        let id = id.to_string();
        let mut tables = self.tables.write();

        let Some(current) = tables
            .get(table.name)
            .and_then(|rows| rows.iter().find(|r| id_matches(r, &id)))
            .and_then(JsonValue::as_object)
            .cloned()
        else {
            return Ok(None);
        };

        let mut updated = current;
        for (col, value) in values {
            updated.insert(col.field.to_string(), value.to_json());
        }
        check_constraints(&tables, table, &updated, &id)?;

        let updated = JsonValue::Object(updated);
        if let Some(slot) = tables
            .get_mut(table.name)
            .and_then(|rows| rows.iter_mut().find(|r| id_matches(r, &id)))
        {
            *slot = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn delete(&self, table: &'static TableSpec, id: Uuid) -> AppResult<bool> {
        let id = id.to_string();
        let mut tables = self.tables.write();

        let exists = tables
            .get(table.name)
            .is_some_and(|rows| rows.iter().any(|r| id_matches(r, &id)));
        if !exists {
            return Ok(false);
        }
        check_unreferenced(&tables, table, &id)?;

        if let Some(rows) = tables.get_mut(table.name) {
            rows.retain(|r| !id_matches(r, &id));
        }
        Ok(true)
    }

    async fn healthy(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn rebalance(&self, from: Option<LedgerPosition>) -> AppResult<u64> {
        let mut tables = self.tables.write();
        let rows = tables.entry(LEDGER_ENTRIES.name).or_default();

        let entries = rows
            .iter()
            .map(LedgerEntry::from_row)
            .collect::<AppResult<Vec<_>>>()?;
        let (opening, tail): (Decimal, Vec<LedgerEntry>) = match from {
            Some(anchor) => (
                balance::opening_balance(&entries, anchor),
                entries.into_iter().filter(|e| e.position() >= anchor).collect(),
            ),
            None => (Decimal::ZERO, entries),
        };

        let stale = balance::stale_balances(opening, &tail);
        for (id, running) in &stale {
            let id = id.to_string();
            if let Some(obj) = rows
                .iter_mut()
                .find(|r| id_matches(r, &id))
                .and_then(JsonValue::as_object_mut)
            {
                obj.insert(
                    "runningBalance".to_string(),
                    Operand::Decimal(*running).to_json(),
                );
            }
        }
        Ok(stale.len() as u64)
    }

    async fn balance(&self) -> AppResult<Decimal> {
        let tables = self.tables.read();
        let entries = tables
            .get(LEDGER_ENTRIES.name)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(LedgerEntry::from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(balance::total(&entries))
    }
}
