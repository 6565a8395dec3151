//! PostgreSQL storage.

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_query::{Alias, Expr, PostgresQueryBuilder, Query, SimpleExpr};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Assignments, LedgerStore, RecordStore};
use crate::catalog::{LEDGER_ENTRIES, TableSpec};
use crate::db;
use crate::error::AppResult;
use crate::ledger::{LedgerEntry, LedgerPosition, balance};
use crate::query::{CompiledQuery, CriteriaQueryBuilder, Window, returning_projection};

/// Signed contribution of a ledger row to the balance.
const SIGNED_AMOUNT: &str = "CASE WHEN entry_type = 'credit' THEN amount ELSE -amount END";

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Wrap a data-modifying statement so it answers with an API-shaped row.
fn returning_row(table: &TableSpec, statement: String) -> String {
    format!(
        "WITH changed AS ({statement}) SELECT row_to_json(t) FROM (SELECT {} FROM changed) t",
        returning_projection(table, "changed")
    )
}

fn value_expr(operand: &crate::catalog::Operand) -> SimpleExpr {
    SimpleExpr::Value(operand.clone().into())
}

#[async_trait]
impl RecordStore for PgStore {
    async fn fetch(&self, query: &CompiledQuery, window: Option<Window>) -> AppResult<Vec<JsonValue>> {
        let sql = CriteriaQueryBuilder::new(query).build(window);
        tracing::debug!(sql = %sql, "fetch");
        let rows = sqlx::query_scalar::<_, JsonValue>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count(&self, query: &CompiledQuery) -> AppResult<u64> {
        let sql = CriteriaQueryBuilder::new(query).build_count();
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn insert(&self, table: &'static TableSpec, values: &Assignments) -> AppResult<JsonValue> {
        // SeaQuery statements are not Send; render before the first await.
        let sql = {
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(table.name))
                .columns(values.iter().map(|(col, _)| Alias::new(col.name)))
                .values(values.iter().map(|(_, v)| value_expr(v)))
                .context("failed to build insert")?;
            insert.returning_all();
            returning_row(table, insert.to_string(PostgresQueryBuilder))
        };
        let row = sqlx::query_scalar::<_, JsonValue>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update(
        &self,
        table: &'static TableSpec,
        id: Uuid,
        values: &Assignments,
    ) -> AppResult<Option<JsonValue>> {
        if values.is_empty() {
            let rows = self.fetch(&CompiledQuery::by_id(table, id), None).await?;
            return Ok(rows.into_iter().next());
        }

        let sql = {
            let mut update = Query::update();
            update
                .table(Alias::new(table.name))
                .values(values.iter().map(|(col, v)| (Alias::new(col.name), value_expr(v))))
                .and_where(Expr::col(Alias::new(table.primary_key().name)).eq(id))
                .returning_all();
            returning_row(table, update.to_string(PostgresQueryBuilder))
        };
        let row = sqlx::query_scalar::<_, JsonValue>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete(&self, table: &'static TableSpec, id: Uuid) -> AppResult<bool> {
        let sql = Query::delete()
            .from_table(Alias::new(table.name))
            .and_where(Expr::col(Alias::new(table.primary_key().name)).eq(id))
            .to_string(PostgresQueryBuilder);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn healthy(&self) -> bool {
        db::check_health(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn rebalance(&self, from: Option<LedgerPosition>) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        // Concurrent writers queue here so each rebalance sees a stable ledger.
        sqlx::query(&format!(
            "LOCK TABLE {} IN SHARE ROW EXCLUSIVE MODE",
            LEDGER_ENTRIES.name
        ))
        .execute(&mut *tx)
        .await?;

        let (opening, entries): (Decimal, Vec<LedgerEntry>) = match from {
            Some(anchor) => {
                let opening: Decimal = sqlx::query_scalar(&format!(
                    "SELECT COALESCE(SUM({SIGNED_AMOUNT}), 0) FROM ledger_entries \
                     WHERE (created_at, id) < ($1, $2)"
                ))
                .bind(anchor.created_at)
                .bind(anchor.id)
                .fetch_one(&mut *tx)
                .await?;
                let entries = sqlx::query_as::<_, LedgerEntry>(
                    "SELECT * FROM ledger_entries WHERE (created_at, id) >= ($1, $2) \
                     ORDER BY created_at, id",
                )
                .bind(anchor.created_at)
                .bind(anchor.id)
                .fetch_all(&mut *tx)
                .await?;
                (opening, entries)
            }
            None => {
                let entries = sqlx::query_as::<_, LedgerEntry>(
                    "SELECT * FROM ledger_entries ORDER BY created_at, id",
                )
                .fetch_all(&mut *tx)
                .await?;
                (Decimal::ZERO, entries)
            }
        };

        let stale = balance::stale_balances(opening, &entries);
        for (id, running) in &stale {
            sqlx::query("UPDATE ledger_entries SET running_balance = $1 WHERE id = $2")
                .bind(running)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(rewritten = stale.len(), scanned = entries.len(), "ledger rebalanced");
        Ok(stale.len() as u64)
    }

    async fn balance(&self) -> AppResult<Decimal> {
        let total: Decimal = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM({SIGNED_AMOUNT}), 0) FROM ledger_entries"
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
