//! In-process evaluation of compiled queries over JSON rows.
//!
//! Mirrors the PostgreSQL semantics of [`super::query_builder`]: NULL never
//! matches a comparison, pattern operators are case-insensitive on the text
//! rendering, and ascending sorts put NULLs last.

use std::cmp::Ordering;

use serde_json::Value as JsonValue;

use super::compile::{CompareOp, CompiledQuery, Condition, PatternKind, Predicate, SortKey};
use super::query_builder::Window;
use super::types::SortOrder;
use crate::catalog::{ColumnKind, Operand, json_text};

impl Condition {
    /// Whether `row` satisfies this condition.
    pub fn matches(&self, row: &JsonValue) -> bool {
        match self {
            Condition::All(children) => children.iter().all(|c| c.matches(row)),
            Condition::Any(children) => children.iter().any(|c| c.matches(row)),
            Condition::Leaf(predicate) => predicate.matches(row),
        }
    }
}

impl Predicate {
    pub fn matches(&self, row: &JsonValue) -> bool {
        match self {
            Predicate::Compare {
                column,
                op,
                operand,
            } => {
                let stored = &row[column.field];
                if operand.is_null() {
                    return stored.is_null();
                }
                match operand.compare_json(stored) {
                    Some(ordering) => match op {
                        CompareOp::Eq => ordering == Ordering::Equal,
                        CompareOp::Gte => ordering != Ordering::Less,
                        CompareOp::Lte => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            Predicate::Pattern { column, kind, text } => {
                let stored = &row[column.field];
                if stored.is_null() {
                    return false;
                }
                let haystack = json_text(stored).to_lowercase();
                let needle = text.to_lowercase();
                match kind {
                    PatternKind::Contains => haystack.contains(&needle),
                    PatternKind::StartsWith => haystack.starts_with(&needle),
                    PatternKind::EndsWith => haystack.ends_with(&needle),
                }
            }
            Predicate::AnyOf { column, operands } => {
                let stored = &row[column.field];
                operands
                    .iter()
                    .any(|o| o.compare_json(stored) == Some(Ordering::Equal))
            }
        }
    }
}

impl CompiledQuery {
    /// Filter, order, window, and project `rows`.
    pub fn evaluate<'a, I>(&self, rows: I, window: Option<Window>) -> Vec<JsonValue>
    where
        I: IntoIterator<Item = &'a JsonValue>,
    {
        let mut matched = self.filter(rows);
        let ordering = self.ordering();
        matched.sort_by(|a, b| compare_rows(&ordering, a, b));

        let (offset, limit) = match window {
            Some(w) => (w.offset as usize, w.limit as usize),
            None => (0, usize::MAX),
        };

        let columns = self.columns();
        matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                let projected: serde_json::Map<String, JsonValue> = columns
                    .iter()
                    .map(|c| (c.field.to_string(), row[c.field].clone()))
                    .collect();
                JsonValue::Object(projected)
            })
            .collect()
    }

    /// Count rows matching the condition.
    pub fn count_matching<'a, I>(&self, rows: I) -> u64
    where
        I: IntoIterator<Item = &'a JsonValue>,
    {
        self.filter(rows).len() as u64
    }

    fn filter<'a, I>(&self, rows: I) -> Vec<&'a JsonValue>
    where
        I: IntoIterator<Item = &'a JsonValue>,
    {
        rows.into_iter()
            .filter(|row| self.condition.as_ref().is_none_or(|c| c.matches(row)))
            .collect()
    }
}

fn compare_rows(keys: &[SortKey], a: &JsonValue, b: &JsonValue) -> Ordering {
    for key in keys {
        let ordering = compare_values(key.column.kind, &a[key.column.field], &b[key.column.field]);
        let ordering = match key.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Typed ordering of two stored values; NULL sorts after every value.
fn compare_values(kind: ColumnKind, a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    Operand::parse(kind, a)
        .ok()
        .and_then(|op| op.compare_json(b))
        .map(Ordering::reverse)
        .unwrap_or_else(|| json_text(a).cmp(&json_text(b)))
}
