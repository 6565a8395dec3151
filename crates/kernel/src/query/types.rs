//! Criteria query types.
//!
//! Provides the JSON shapes accepted by every list endpoint:
//! - PaginationRequest: page/limit plus search and sort criteria
//! - FilterExpr: nestable AND/OR expression tree
//! - PaginatedResult: a page of rows with pagination metadata

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Default page size when the request omits `limit`.
pub const DEFAULT_LIMIT: u64 = 10;

/// Upper bound on `limit`; larger requests are capped.
pub const MAX_LIMIT: u64 = 500;

/// Search operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Case-insensitive substring match.
    Contains,
    /// Typed equality.
    Equals,
    /// Case-insensitive prefix match.
    StartsWith,
    /// Case-insensitive suffix match.
    EndsWith,
    /// Typed `>=`.
    GreaterThanOrEqual,
    /// Typed `<=`.
    LessThanOrEqual,
}

impl Operator {
    /// Whether this operator matches text patterns rather than typed values.
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }
}

/// Scalar value of a search criterion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CriterionValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CriterionValue {
    pub fn to_json(&self) -> JsonValue {
        match self {
            CriterionValue::Boolean(b) => JsonValue::Bool(*b),
            CriterionValue::Integer(i) => JsonValue::from(*i),
            CriterionValue::Float(f) => JsonValue::from(*f),
            CriterionValue::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

impl From<&str> for CriterionValue {
    fn from(s: &str) -> Self {
        CriterionValue::Text(s.to_string())
    }
}

impl From<i64> for CriterionValue {
    fn from(i: i64) -> Self {
        CriterionValue::Integer(i)
    }
}

/// One search instruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriterion {
    pub column_name: String,
    pub column_operator: Operator,
    pub column_value: CriterionValue,
    /// When any flat criterion sets this, all flat criteria combine with OR.
    #[serde(default)]
    pub is_or_condition: bool,
}

impl SearchCriterion {
    pub fn new(
        column_name: &str,
        column_operator: Operator,
        column_value: impl Into<CriterionValue>,
    ) -> Self {
        Self {
            column_name: column_name.to_string(),
            column_operator,
            column_value: column_value.into(),
            is_or_condition: false,
        }
    }

    pub fn or(mut self) -> Self {
        self.is_or_condition = true;
        self
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One sort instruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SortCriterion {
    pub column_name: String,
    #[serde(default)]
    pub column_order: SortOrder,
}

/// Filter expression tree.
///
/// `{"and": [...]}` and `{"or": [...]}` nest arbitrarily; leaves are plain
/// search criteria (their `isOrCondition` flag is ignored inside a tree).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterExpr {
    And { and: Vec<FilterExpr> },
    Or { or: Vec<FilterExpr> },
    Criterion(SearchCriterion),
}

impl FilterExpr {
    /// Lower a flat criteria list: all OR if any criterion asks for OR,
    /// otherwise all AND. Mixed grouping is not expressible in the flat shape.
    pub fn from_flat(criteria: &[SearchCriterion]) -> Option<Self> {
        if criteria.is_empty() {
            return None;
        }
        let leaves = criteria.iter().cloned().map(FilterExpr::Criterion).collect();
        if criteria.iter().any(|c| c.is_or_condition) {
            Some(FilterExpr::Or { or: leaves })
        } else {
            Some(FilterExpr::And { and: leaves })
        }
    }
}

/// Options for one eager-loaded relation: `true`, `false`, or nested options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WithOption {
    Flag(bool),
    Nested {
        #[serde(default)]
        with: BTreeMap<String, WithOption>,
    },
}

impl WithOption {
    /// Whether the relation should be loaded at all.
    pub fn enabled(&self) -> bool {
        !matches!(self, WithOption::Flag(false))
    }

    /// Nested relations requested under this one.
    pub fn nested(&self) -> Option<&BTreeMap<String, WithOption>> {
        match self {
            WithOption::Nested { with } => Some(with),
            WithOption::Flag(_) => None,
        }
    }
}

/// Body accepted by every list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationRequest {
    #[serde(default, deserialize_with = "lenient_number")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub limit: Option<i64>,
    #[serde(default)]
    pub search_criterias: Vec<SearchCriterion>,
    #[serde(default)]
    pub sort_criterias: Vec<SortCriterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, WithOption>,
}

/// Accept numbers or numeric strings; anything else reads as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(JsonValue::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(JsonValue::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Coerce raw page/limit values to positive integers.
    pub fn coerce(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.map_or(1, |p| p.max(1) as u64);
        let requested = limit.map_or(DEFAULT_LIMIT, |l| l.max(1) as u64);
        if requested > MAX_LIMIT {
            tracing::warn!(
                requested,
                capped = MAX_LIMIT,
                "limit exceeds maximum, capping"
            );
        }
        Self {
            page,
            limit: requested.min(MAX_LIMIT),
        }
    }

    /// Rows to skip, capped at the largest OFFSET PostgreSQL accepts.
    pub fn offset(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// A page of rows plus pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginatedResult {
    pub data: Vec<JsonValue>,
    pub pagination: Pagination,
}

impl PaginatedResult {
    /// Create a new result with paging calculations.
    pub fn new(data: Vec<JsonValue>, total: u64, window: PageWindow) -> Self {
        Self {
            data,
            pagination: Pagination {
                total,
                page: window.page,
                limit: window.limit,
                total_pages: total.div_ceil(window.limit),
            },
        }
    }
}
