//! Criteria query builder using SeaQuery.
//!
//! Generates PostgreSQL from a [`CompiledQuery`]. Identifiers come only from
//! the static column registry and every value is rendered by SeaQuery, so no
//! caller text reaches the SQL unescaped. Rows come back as single JSON
//! objects keyed by API field names.

use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr,
};

use super::compile::{CompareOp, CompiledQuery, Condition, PatternKind, Predicate};
use super::types::SortOrder;
use crate::catalog::{Column, Operand, TableSpec};

/// Row window for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

/// Query builder for criteria queries.
pub struct CriteriaQueryBuilder<'a> {
    query: &'a CompiledQuery,
}

impl<'a> CriteriaQueryBuilder<'a> {
    pub fn new(query: &'a CompiledQuery) -> Self {
        Self { query }
    }

    /// Build the data query, one JSON object per row.
    pub fn build(&self, window: Option<Window>) -> String {
        format!(
            "SELECT row_to_json(t) FROM ({}) t",
            self.build_select(window)
        )
    }

    /// Build the inner SELECT with ordering and optional LIMIT/OFFSET.
    pub fn build_select(&self, window: Option<Window>) -> String {
        let table = self.query.table;
        let mut query = Query::select();

        // SELECT fields, aliased to API names
        for col in self.query.columns() {
            query.expr_as(column_expr(table, col), Alias::new(col.field));
        }

        // FROM base table
        query.from(Alias::new(table.name));

        // WHERE conditions
        self.add_conditions(&mut query);

        // ORDER BY, primary key last
        for key in self.query.ordering() {
            let order = match key.order {
                SortOrder::Asc => Order::Asc,
                SortOrder::Desc => Order::Desc,
            };
            query.order_by((Alias::new(table.name), Alias::new(key.column.name)), order);
        }

        if let Some(window) = window {
            query.limit(window.limit);
            query.offset(window.offset);
        }

        query.to_string(PostgresQueryBuilder)
    }

    /// Build a COUNT query for total results.
    pub fn build_count(&self) -> String {
        let mut query = Query::select();

        // SELECT COUNT(*)
        query.expr(Expr::col(Asterisk).count());

        // FROM base table
        query.from(Alias::new(self.query.table.name));

        // WHERE conditions
        self.add_conditions(&mut query);

        query.to_string(PostgresQueryBuilder)
    }

    fn add_conditions(&self, query: &mut SelectStatement) {
        if let Some(condition) = &self.query.condition {
            query.cond_where(build_condition(self.query.table, condition));
        }
    }
}

/// Lower a condition tree to a SeaQuery condition.
fn build_condition(table: &TableSpec, condition: &Condition) -> Cond {
    match condition {
        Condition::All(children) => children
            .iter()
            .fold(Cond::all(), |cond, child| cond.add(build_condition(table, child))),
        Condition::Any(children) => children
            .iter()
            .fold(Cond::any(), |cond, child| cond.add(build_condition(table, child))),
        Condition::Leaf(predicate) => Cond::all().add(build_predicate(table, predicate)),
    }
}

/// Build a single predicate expression.
fn build_predicate(table: &TableSpec, predicate: &Predicate) -> SimpleExpr {
    match predicate {
        Predicate::Compare {
            column,
            op,
            operand,
        } => {
            let col = column_expr(table, column);
            if operand.is_null() {
                return col.is_null();
            }
            let value = sea_query::Value::from(operand.clone());
            match op {
                CompareOp::Eq => col.eq(value),
                CompareOp::Gte => col.gte(value),
                CompareOp::Lte => col.lte(value),
            }
        }
        Predicate::Pattern { column, kind, text } => {
            let escaped = escape_like_wildcards(text);
            let pattern = match kind {
                PatternKind::Contains => format!("%{escaped}%"),
                PatternKind::StartsWith => format!("{escaped}%"),
                PatternKind::EndsWith => format!("%{escaped}"),
            };
            Expr::cust_with_values(format!("{} ILIKE $1", text_expr(table, column)), [pattern])
        }
        Predicate::AnyOf { column, operands } => {
            let values: Vec<sea_query::Value> = operands
                .iter()
                .filter(|o| !o.is_null())
                .cloned()
                .map(Operand::into)
                .collect();
            if values.is_empty() {
                return Expr::cust("FALSE");
            }
            column_expr(table, column).is_in(values)
        }
    }
}

fn column_expr(table: &TableSpec, column: &Column) -> SimpleExpr {
    Expr::col((Alias::new(table.name), Alias::new(column.name))).into()
}

/// Column rendered as text for pattern matching; non-text columns are cast.
fn text_expr(table: &TableSpec, column: &Column) -> String {
    let ident = format!("\"{}\".\"{}\"", table.name, column.name);
    if column.kind.is_textual() {
        ident
    } else {
        format!("CAST({ident} AS TEXT)")
    }
}

/// Escape LIKE wildcard characters so user input matches literally.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Projection list over a CTE named `source`, aliased to API names.
///
/// Used to wrap INSERT/UPDATE ... RETURNING so mutations answer with the
/// same row shape as queries.
pub fn returning_projection(table: &TableSpec, source: &str) -> String {
    table
        .columns
        .iter()
        .map(|c| format!("\"{source}\".\"{}\" AS \"{}\"", c.name, c.field))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{FLATS, LEDGER_ENTRIES};
    use crate::query::compile::compile;
    use crate::query::types::PaginationRequest;
    use serde_json::json;

    fn compiled(table: &'static TableSpec, value: serde_json::Value) -> CompiledQuery {
        let request: PaginationRequest = serde_json::from_value(value).unwrap();
        compile(table, &request).unwrap().query
    }

    #[test]
    fn simple_query_build() {
        let query = compiled(&FLATS, json!({}));
        let sql = CriteriaQueryBuilder::new(&query).build(Some(Window { offset: 20, limit: 10 }));

        assert!(sql.starts_with("SELECT row_to_json(t) FROM (SELECT"));
        assert!(sql.contains("\"flats\".\"flat_number\" AS \"flatNumber\""));
        assert!(sql.contains("FROM \"flats\""));
        assert!(sql.contains("ORDER BY \"flats\".\"id\" ASC"));
        assert!(sql.contains("LIMIT 10"));
        assert!(sql.contains("OFFSET 20"));
    }

    #[test]
    fn count_query_build() {
        let query = compiled(
            &FLATS,
            json!({"searchCriterias": [{"columnName": "block", "columnOperator": "equals", "columnValue": "A"}]}),
        );
        let sql = CriteriaQueryBuilder::new(&query).build_count();

        assert!(sql.contains("COUNT(*)"));
        assert!(sql.contains("\"flats\".\"block\" = 'A'"));
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn or_group_renders_or() {
        let query = compiled(
            &FLATS,
            json!({"searchCriterias": [
                {"columnName": "floorNumber", "columnOperator": "greaterThanOrEqual", "columnValue": 3},
                {"columnName": "floorNumber", "columnOperator": "lessThanOrEqual", "columnValue": 1, "isOrCondition": true}
            ]}),
        );
        let sql = CriteriaQueryBuilder::new(&query).build(None);
        assert!(sql.contains("\"flats\".\"floor_number\" >= 3"));
        assert!(sql.contains(" OR "));
        assert!(sql.contains("\"flats\".\"floor_number\" <= 1"));
    }

    #[test]
    fn pattern_on_text_column_uses_ilike() {
        let query = compiled(
            &FLATS,
            json!({"searchCriterias": [{"columnName": "flatNumber", "columnOperator": "startsWith", "columnValue": "G"}]}),
        );
        let sql = CriteriaQueryBuilder::new(&query).build(None);
        assert!(sql.contains("\"flats\".\"flat_number\" ILIKE 'G%'"));
        assert!(!sql.contains("CAST("));
    }

    #[test]
    fn pattern_on_numeric_column_casts_to_text() {
        let query = compiled(
            &LEDGER_ENTRIES,
            json!({"searchCriterias": [{"columnName": "amount", "columnOperator": "endsWith", "columnValue": "50"}]}),
        );
        let sql = CriteriaQueryBuilder::new(&query).build(None);
        assert!(sql.contains("CAST(\"ledger_entries\".\"amount\" AS TEXT) ILIKE '%50'"));
    }

    #[test]
    fn like_wildcards_escaped() {
        let query = compiled(
            &FLATS,
            json!({"searchCriterias": [{"columnName": "block", "columnOperator": "contains", "columnValue": "50%_off"}]}),
        );
        let sql = CriteriaQueryBuilder::new(&query).build(None);
        assert!(sql.contains("50\\\\%\\\\_off") || sql.contains("50\\%\\_off"));
    }

    #[test]
    fn quotes_in_values_are_escaped() {
        let query = compiled(
            &FLATS,
            json!({"searchCriterias": [{"columnName": "block", "columnOperator": "equals", "columnValue": "A'; DROP TABLE flats; --"}]}),
        );
        let sql = CriteriaQueryBuilder::new(&query).build(None);
        assert!(!sql.contains("'A'; DROP"));
    }

    #[test]
    fn projection_limits_columns() {
        let query = compiled(&FLATS, json!({"select": ["flatNumber"]}));
        let sql = CriteriaQueryBuilder::new(&query).build_select(None);
        assert!(sql.contains("AS \"flatNumber\""));
        assert!(!sql.contains("\"floor_number\""));
    }

    #[test]
    fn any_of_renders_in_list() {
        let id = uuid::Uuid::nil();
        let query = CompiledQuery::any_of(
            &FLATS,
            FLATS.primary_key(),
            vec![Operand::Uuid(id)],
        );
        let sql = CriteriaQueryBuilder::new(&query).build(None);
        assert!(sql.contains("\"flats\".\"id\" IN ("));
    }

    #[test]
    fn empty_any_of_matches_nothing() {
        let query = CompiledQuery::any_of(&FLATS, FLATS.primary_key(), vec![]);
        let sql = CriteriaQueryBuilder::new(&query).build_count();
        assert!(sql.contains("FALSE"));
    }

    #[test]
    fn escape_like_wildcards_function() {
        assert_eq!(super::escape_like_wildcards("hello"), "hello");
        assert_eq!(super::escape_like_wildcards("100%"), "100\\%");
        assert_eq!(super::escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(super::escape_like_wildcards("a\\b"), "a\\\\b");
    }

    #[test]
    fn returning_projection_aliases_fields() {
        let projection = returning_projection(&FLATS, "changed");
        assert!(projection.starts_with("\"changed\".\"id\" AS \"id\""));
        assert!(projection.contains("\"changed\".\"flat_number\" AS \"flatNumber\""));
    }
}
