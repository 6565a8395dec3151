//! Criteria compilation.
//!
//! Resolves a [`PaginationRequest`] against a table's column registry into a
//! [`CompiledQuery`]. Every name and value is checked here, so a bad request
//! fails before any storage access.

use std::collections::BTreeMap;

use crate::catalog::{self, Column, ColumnKind, Operand, Relation, TableSpec};
use crate::error::{AppError, AppResult};

use super::types::{
    CriterionValue, FilterExpr, Operator, PageWindow, PaginationRequest, SearchCriterion,
    SortOrder, WithOption,
};

/// Maximum depth of nested relation loading.
pub const MAX_RELATION_DEPTH: usize = 3;

/// Typed comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gte,
    Lte,
}

/// Where a pattern must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// A single resolved predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: &'static Column,
        op: CompareOp,
        operand: Operand,
    },
    /// Case-insensitive match on the column's text rendering.
    Pattern {
        column: &'static Column,
        kind: PatternKind,
        text: String,
    },
    /// Column equals any of the operands (relation batch loading).
    AnyOf {
        column: &'static Column,
        operands: Vec<Operand>,
    },
}

/// Boolean combination of predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Leaf(Predicate),
}

/// A resolved sort key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
    pub column: &'static Column,
    pub order: SortOrder,
}

/// A fully resolved query against one table.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub table: &'static TableSpec,
    pub condition: Option<Condition>,
    /// Caller sort keys; the primary key tiebreaker is added by executors.
    pub sorts: Vec<SortKey>,
    /// Columns to return; `None` returns every column.
    pub projection: Option<Vec<&'static Column>>,
}

impl CompiledQuery {
    /// An unfiltered query over every column.
    pub fn all(table: &'static TableSpec) -> Self {
        Self {
            table,
            condition: None,
            sorts: Vec::new(),
            projection: None,
        }
    }

    /// Query for a single row by primary key.
    pub fn by_id(table: &'static TableSpec, id: uuid::Uuid) -> Self {
        Self {
            condition: Some(Condition::Leaf(Predicate::Compare {
                column: table.primary_key(),
                op: CompareOp::Eq,
                operand: Operand::Uuid(id),
            })),
            ..Self::all(table)
        }
    }

    /// Query for rows whose `column` equals any of `operands`.
    pub fn any_of(table: &'static TableSpec, column: &'static Column, operands: Vec<Operand>) -> Self {
        Self {
            condition: Some(Condition::Leaf(Predicate::AnyOf { column, operands })),
            ..Self::all(table)
        }
    }

    /// Columns this query returns.
    pub fn columns(&self) -> Vec<&'static Column> {
        match &self.projection {
            Some(cols) => cols.clone(),
            None => self.table.columns.iter().collect(),
        }
    }

    /// Sort keys with the primary key appended as the final tiebreaker.
    pub fn ordering(&self) -> Vec<SortKey> {
        let pk = self.table.primary_key();
        let mut keys = self.sorts.clone();
        if !keys.iter().any(|k| k.column.field == pk.field) {
            keys.push(SortKey {
                column: pk,
                order: SortOrder::Asc,
            });
        }
        keys
    }
}

/// A relation to eager-load, with its own nested loads.
#[derive(Debug, Clone)]
pub struct RelationLoad {
    pub relation: &'static Relation,
    pub local: &'static Column,
    pub target: &'static TableSpec,
    pub foreign: &'static Column,
    pub nested: Vec<RelationLoad>,
}

/// Result of compiling a list request.
#[derive(Debug, Clone)]
pub struct CompiledRequest {
    pub query: CompiledQuery,
    pub window: PageWindow,
    pub relations: Vec<RelationLoad>,
}

/// Compile a list request for `table`.
pub fn compile(table: &'static TableSpec, request: &PaginationRequest) -> AppResult<CompiledRequest> {
    let window = PageWindow::coerce(request.page, request.limit);

    let flat = FilterExpr::from_flat(&request.search_criterias)
        .map(|expr| compile_expr(table, &expr))
        .transpose()?
        .flatten();
    let tree = request
        .filter
        .as_ref()
        .map(|expr| compile_expr(table, expr))
        .transpose()?
        .flatten();
    let condition = match (flat, tree) {
        (Some(a), Some(b)) => Some(Condition::All(vec![a, b])),
        (a, b) => a.or(b),
    };

    let sorts = request
        .sort_criterias
        .iter()
        .map(|s| {
            Ok(SortKey {
                column: table.resolve(&s.column_name)?,
                order: s.column_order,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let projection = match &request.select {
        Some(_) if !request.with.is_empty() => {
            return Err(AppError::BadRequest(
                "'select' cannot be combined with 'with'".to_string(),
            ));
        }
        Some(names) if !names.is_empty() => {
            let mut cols = Vec::with_capacity(names.len());
            for name in names {
                let col = table.resolve(name)?;
                if !cols.iter().any(|c: &&Column| c.field == col.field) {
                    cols.push(col);
                }
            }
            Some(cols)
        }
        _ => None,
    };

    let relations = compile_relations(table, &request.with, 1)?;

    Ok(CompiledRequest {
        query: CompiledQuery {
            table,
            condition,
            sorts,
            projection,
        },
        window,
        relations,
    })
}

/// Compile an expression; empty groups impose no constraint.
fn compile_expr(table: &'static TableSpec, expr: &FilterExpr) -> AppResult<Option<Condition>> {
    match expr {
        FilterExpr::Criterion(criterion) => compile_criterion(table, criterion).map(Some),
        FilterExpr::And { and } => compile_group(table, and).map(|c| c.map(Condition::All)),
        FilterExpr::Or { or } => compile_group(table, or).map(|c| c.map(Condition::Any)),
    }
}

fn compile_group(
    table: &'static TableSpec,
    children: &[FilterExpr],
) -> AppResult<Option<Vec<Condition>>> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        if let Some(cond) = compile_expr(table, child)? {
            out.push(cond);
        }
    }
    Ok((!out.is_empty()).then_some(out))
}

fn compile_criterion(table: &'static TableSpec, criterion: &SearchCriterion) -> AppResult<Condition> {
    let column = table.resolve(&criterion.column_name)?;
    let op = criterion.column_operator;

    let predicate = if op.is_pattern() {
        if column.kind == ColumnKind::Boolean {
            return Err(unsupported(op, column));
        }
        let text = match &criterion.column_value {
            CriterionValue::Text(s) => s.clone(),
            other => other.to_json().to_string(),
        };
        let kind = match op {
            Operator::StartsWith => PatternKind::StartsWith,
            Operator::EndsWith => PatternKind::EndsWith,
            _ => PatternKind::Contains,
        };
        Predicate::Pattern { column, kind, text }
    } else {
        let op = match op {
            Operator::GreaterThanOrEqual => CompareOp::Gte,
            Operator::LessThanOrEqual => CompareOp::Lte,
            _ => CompareOp::Eq,
        };
        if op != CompareOp::Eq
            && matches!(column.kind, ColumnKind::Boolean | ColumnKind::Uuid | ColumnKind::Enum(_))
        {
            return Err(unsupported(criterion.column_operator, column));
        }
        let operand = parse_operand(column, &criterion.column_value)?;
        Predicate::Compare {
            column,
            op,
            operand,
        }
    };

    Ok(Condition::Leaf(predicate))
}

/// Parse a criterion value as the column's type.
fn parse_operand(column: &'static Column, value: &CriterionValue) -> AppResult<Operand> {
    let kind = match column.kind {
        // Filtering by a value outside the set simply matches nothing.
        ColumnKind::Enum(_) => ColumnKind::Text,
        kind => kind,
    };
    Operand::parse(kind, &value.to_json())
        .map_err(|reason| AppError::BadRequest(format!("invalid value for '{}': {reason}", column.field)))
}

fn unsupported(op: Operator, column: &Column) -> AppError {
    let op = serde_json::to_value(op)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    AppError::UnsupportedOperator(format!("{op} on column '{}'", column.field))
}

fn compile_relations(
    table: &'static TableSpec,
    with: &BTreeMap<String, WithOption>,
    depth: usize,
) -> AppResult<Vec<RelationLoad>> {
    let mut loads = Vec::new();
    for (name, option) in with {
        if !option.enabled() {
            continue;
        }
        let relation = table.relation(name)?;
        let target = catalog::lookup(relation.target)
            .ok_or_else(|| anyhow::anyhow!("relation {name} targets unregistered table {}", relation.target))?;
        let local = table.resolve(relation.local)?;
        let foreign = target.resolve(relation.foreign)?;

        let nested = match option.nested() {
            Some(nested) if depth < MAX_RELATION_DEPTH => compile_relations(target, nested, depth + 1)?,
            Some(nested) if !nested.is_empty() => {
                tracing::warn!(
                    relation = name.as_str(),
                    max_depth = MAX_RELATION_DEPTH,
                    "relation nesting exceeds maximum depth, ignoring deeper levels"
                );
                Vec::new()
            }
            _ => Vec::new(),
        };

        loads.push(RelationLoad {
            relation,
            local,
            target,
            foreign,
            nested,
        });
    }
    Ok(loads)
}
