//! Storage backends.
//!
//! Services talk to storage only through [`RecordStore`] and [`LedgerStore`].
//! [`PgStore`] is the production backend; [`MemoryStore`] keeps rows in
//! process and backs tests and `STORAGE_BACKEND=memory`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::catalog::{Column, Operand, TableSpec};
use crate::error::AppResult;
use crate::ledger::LedgerPosition;
use crate::query::{CompiledQuery, Window};

/// Column values to write, already typed.
pub type Assignments = [(&'static Column, Operand)];

/// Row storage for every catalog table.
///
/// Rows are JSON objects keyed by API field name.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows matching `query` in its order, optionally windowed.
    async fn fetch(&self, query: &CompiledQuery, window: Option<Window>) -> AppResult<Vec<JsonValue>>;

    /// Number of rows matching `query`.
    async fn count(&self, query: &CompiledQuery) -> AppResult<u64>;

    /// Insert a row and return it as stored.
    async fn insert(&self, table: &'static TableSpec, values: &Assignments) -> AppResult<JsonValue>;

    /// Update a row; `None` when no row has this id.
    async fn update(
        &self,
        table: &'static TableSpec,
        id: Uuid,
        values: &Assignments,
    ) -> AppResult<Option<JsonValue>>;

    /// Delete a row; `false` when no row has this id.
    async fn delete(&self, table: &'static TableSpec, id: Uuid) -> AppResult<bool>;

    /// Whether the backend can serve requests.
    async fn healthy(&self) -> bool;

    /// Backend name for health reporting.
    fn backend(&self) -> &'static str;
}

/// Ledger balance maintenance.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Recompute running balances for every entry at or after `from`
    /// (the whole ledger when `None`), persisting the ones that changed.
    ///
    /// Returns the number of entries rewritten.
    async fn rebalance(&self, from: Option<LedgerPosition>) -> AppResult<u64>;

    /// Net balance over all entries: credits minus debits.
    async fn balance(&self) -> AppResult<Decimal>;
}
