//! Criteria service for executing list requests.
//!
//! Compiles the request, runs the page and count queries concurrently, then
//! eager-loads requested relations in batches.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::compile::{CompiledQuery, RelationLoad, compile};
use super::query_builder::Window;
use super::types::{PaginatedResult, PaginationRequest};
use crate::catalog::{Cardinality, Operand, TableSpec, json_text};
use crate::error::AppResult;
use crate::store::RecordStore;

/// Maximum related rows loaded per relation per page.
const RELATION_ROW_LIMIT: u64 = 1000;

/// Service for paginated, filtered listing of any catalog table.
#[derive(Clone)]
pub struct CriteriaService {
    store: Arc<dyn RecordStore>,
}

impl CriteriaService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Execute a list request against `table`.
    pub async fn paginate(
        &self,
        table: &'static TableSpec,
        request: &PaginationRequest,
    ) -> AppResult<PaginatedResult> {
        let compiled = compile(table, request)?;
        let window = Window {
            offset: compiled.window.offset(),
            limit: compiled.window.limit,
        };

        let (mut rows, total) = tokio::try_join!(
            self.store.fetch(&compiled.query, Some(window)),
            self.store.count(&compiled.query),
        )?;

        if !compiled.relations.is_empty() {
            self.load_relations(&mut rows, &compiled.relations).await?;
        }

        tracing::debug!(
            table = table.name,
            total,
            returned = rows.len(),
            page = compiled.window.page,
            "list executed"
        );
        Ok(PaginatedResult::new(rows, total, compiled.window))
    }

    /// Attach related rows to each parent, one batched query per relation.
    fn load_relations<'a>(
        &'a self,
        parents: &'a mut [JsonValue],
        loads: &'a [RelationLoad],
    ) -> Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'a>> {
        Box::pin(async move {
            for load in loads {
                let name = load.relation.name;

                // 1. Collect distinct parent binding values
                let mut seen = HashSet::new();
                let keys: Vec<Operand> = parents
                    .iter()
                    .map(|p| &p[load.local.field])
                    .filter(|v| !v.is_null() && seen.insert(json_text(v)))
                    .filter_map(|v| Operand::parse(load.foreign.kind, v).ok())
                    .collect();

                // 2. Fetch all children in one query
                let mut children = if keys.is_empty() {
                    Vec::new()
                } else {
                    let query = CompiledQuery::any_of(load.target, load.foreign, keys);
                    let children = self
                        .store
                        .fetch(
                            &query,
                            Some(Window {
                                offset: 0,
                                limit: RELATION_ROW_LIMIT,
                            }),
                        )
                        .await?;
                    if children.len() as u64 == RELATION_ROW_LIMIT {
                        tracing::warn!(
                            relation = name,
                            limit = RELATION_ROW_LIMIT,
                            "relation results may be truncated"
                        );
                    }
                    children
                };

                // 3. Nested relations load on the children before distribution
                if !load.nested.is_empty() && !children.is_empty() {
                    self.load_relations(&mut children, &load.nested).await?;
                }

                // 4. Distribute
                for parent in parents.iter_mut() {
                    let key = &parent[load.local.field];
                    let key = (!key.is_null()).then(|| json_text(key));
                    let matching = children
                        .iter()
                        .filter(|child| key.is_some() && Some(json_text(&child[load.foreign.field])) == key);

                    let attached = match load.relation.cardinality {
                        Cardinality::One => matching.cloned().next().unwrap_or(JsonValue::Null),
                        Cardinality::Many => JsonValue::Array(matching.cloned().collect()),
                    };
                    if let Some(obj) = parent.as_object_mut() {
                        obj.insert(name.to_string(), attached);
                    }
                }
            }
            Ok(())
        })
    }
}
