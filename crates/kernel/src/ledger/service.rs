//! Ledger service.
//!
//! Wraps the generic record operations with the ledger's entry rules and
//! keeps running balances current after every mutation.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::model::{LedgerEntry, validate_entry};
use crate::catalog::LEDGER_ENTRIES;
use crate::error::{AppError, AppResult};
use crate::records::{self, Changes, RecordService};
use crate::store::LedgerStore;

/// Service for ledger mutations and balance queries.
#[derive(Clone)]
pub struct LedgerService {
    records: RecordService,
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    pub fn new(records: RecordService, store: Arc<dyn LedgerStore>) -> Self {
        Self { records, store }
    }

    /// Create an entry and rebalance from its position.
    pub async fn create(&self, body: &JsonValue) -> AppResult<JsonValue> {
        let changes = with_entry_rules(
            records::prepare_insert(&LEDGER_ENTRIES, body),
            &JsonValue::Null,
            body,
        )?;

        let row = self.records.insert(&LEDGER_ENTRIES, &changes).await?;
        let entry = LedgerEntry::from_row(&row)?;
        self.rebalance_from(&entry).await?;
        self.records.get(&LEDGER_ENTRIES, entry.id).await
    }

    /// Update an entry and rebalance from its position.
    pub async fn update(&self, id: Uuid, body: &JsonValue) -> AppResult<JsonValue> {
        let current = self.records.get(&LEDGER_ENTRIES, id).await?;
        let changes = with_entry_rules(
            records::prepare_update(&LEDGER_ENTRIES, body),
            &current,
            body,
        )?;

        let row = self.records.apply(&LEDGER_ENTRIES, id, &changes).await?;
        let entry = LedgerEntry::from_row(&row)?;
        self.rebalance_from(&entry).await?;
        self.records.get(&LEDGER_ENTRIES, id).await
    }

    /// Delete an entry and rebalance everything after it.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let current = self.records.get(&LEDGER_ENTRIES, id).await?;
        let entry = LedgerEntry::from_row(&current)?;
        self.records.delete(&LEDGER_ENTRIES, id).await?;
        self.rebalance_from(&entry).await
    }

    /// Net balance over every entry.
    pub async fn balance(&self) -> AppResult<Decimal> {
        self.store.balance().await
    }

    /// Recompute every running balance from scratch.
    pub async fn recalculate_all(&self) -> AppResult<u64> {
        let updated = self.store.rebalance(None).await?;
        tracing::info!(updated, "ledger running balances recalculated");
        Ok(updated)
    }

    async fn rebalance_from(&self, entry: &LedgerEntry) -> AppResult<()> {
        let updated = self.store.rebalance(Some(entry.position())).await.inspect_err(|e| {
            tracing::error!(error = %e, entry = %entry.id, "rebalance after ledger mutation failed");
        })?;
        tracing::debug!(updated, entry = %entry.id, "ledger rebalanced");
        Ok(())
    }
}

/// Apply the entry rules on top of the column checks, reporting both.
///
/// When the column checks fail the rules run against the raw body overlaid
/// on `current`, and only fields not already reported are added.
fn with_entry_rules(
    prepared: AppResult<Changes>,
    current: &JsonValue,
    body: &JsonValue,
) -> AppResult<Changes> {
    match prepared {
        Ok(changes) => {
            validate_entry(&records::merge(current, &changes)).map_err(AppError::Validation)?;
            Ok(changes)
        }
        Err(AppError::Validation(mut errors)) => {
            let mut row = current.as_object().cloned().unwrap_or_default();
            if let Some(body) = body.as_object() {
                row.extend(body.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            if let Err(rule_errors) = validate_entry(&row) {
                for error in rule_errors {
                    if !errors.iter().any(|e| e.field == error.field) {
                        errors.push(error);
                    }
                }
            }
            Err(AppError::Validation(errors))
        }
        Err(other) => Err(other),
    }
}
