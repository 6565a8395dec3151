//! Typed column values.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::ColumnKind;

/// A value parsed according to a column's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Null,
    Uuid(Uuid),
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Boolean(bool),
}

impl Operand {
    /// Parse a JSON value for a column of the given kind.
    ///
    /// Strings are accepted for every kind so query-string style inputs
    /// (`"12"`, `"true"`, `"2024-01-31"`) work. The error is a human-readable
    /// reason suitable for a field-level validation message.
    pub fn parse(kind: ColumnKind, value: &JsonValue) -> Result<Self, String> {
        if value.is_null() {
            return Ok(Operand::Null);
        }

        match kind {
            ColumnKind::Uuid => {
                let s = value.as_str().ok_or("expected a UUID string")?;
                Uuid::parse_str(s)
                    .map(Operand::Uuid)
                    .map_err(|_| format!("'{s}' is not a valid UUID"))
            }
            ColumnKind::Text => Ok(Operand::Text(json_text(value))),
            ColumnKind::Integer => match value {
                JsonValue::Number(n) => n
                    .as_i64()
                    .map(Operand::Integer)
                    .ok_or_else(|| format!("{n} is not an integer")),
                JsonValue::String(s) => s
                    .trim()
                    .parse()
                    .map(Operand::Integer)
                    .map_err(|_| format!("'{s}' is not an integer")),
                _ => Err("expected an integer".to_string()),
            },
            ColumnKind::Decimal => match value {
                JsonValue::Number(n) => parse_decimal(&n.to_string()),
                JsonValue::String(s) => parse_decimal(s.trim()),
                _ => Err("expected a number".to_string()),
            },
            ColumnKind::Date => {
                let s = value.as_str().ok_or("expected a date string (YYYY-MM-DD)")?;
                parse_date(s)
                    .map(Operand::Date)
                    .ok_or_else(|| format!("'{s}' is not a valid date"))
            }
            ColumnKind::Timestamp => {
                let s = value.as_str().ok_or("expected an RFC 3339 timestamp")?;
                parse_timestamp(s)
                    .map(Operand::Timestamp)
                    .ok_or_else(|| format!("'{s}' is not a valid timestamp"))
            }
            ColumnKind::Boolean => match value {
                JsonValue::Bool(b) => Ok(Operand::Boolean(*b)),
                JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Operand::Boolean(true)),
                    "false" => Ok(Operand::Boolean(false)),
                    _ => Err(format!("'{s}' is not a boolean")),
                },
                _ => Err("expected a boolean".to_string()),
            },
            ColumnKind::Enum(allowed) => {
                let s = json_text(value);
                if allowed.contains(&s.as_str()) {
                    Ok(Operand::Text(s))
                } else {
                    Err(format!("must be one of: {}", allowed.join(", ")))
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Null)
    }

    /// JSON rendering, matching what PostgreSQL's `row_to_json` produces.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Operand::Null => JsonValue::Null,
            Operand::Uuid(u) => JsonValue::String(u.to_string()),
            Operand::Text(s) => JsonValue::String(s.clone()),
            Operand::Integer(i) => JsonValue::from(*i),
            Operand::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Operand::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Operand::Timestamp(t) => JsonValue::String(t.to_rfc3339()),
            Operand::Boolean(b) => JsonValue::Bool(*b),
        }
    }

    /// Compare a stored JSON value against this operand.
    ///
    /// Returns `None` when the stored value is null or cannot be read as this
    /// operand's type, mirroring SQL's NULL comparison semantics.
    pub fn compare_json(&self, stored: &JsonValue) -> Option<Ordering> {
        if stored.is_null() {
            return None;
        }
        match self {
            Operand::Null => None,
            Operand::Uuid(u) => Uuid::parse_str(stored.as_str()?).ok().map(|s| s.cmp(u)),
            Operand::Text(t) => Some(json_text(stored).as_str().cmp(t.as_str())),
            Operand::Integer(i) => stored.as_i64().map(|s| s.cmp(i)),
            Operand::Decimal(d) => {
                let s = Decimal::from_str(&json_text(stored)).ok()?;
                Some(s.cmp(d))
            }
            Operand::Date(d) => parse_date(stored.as_str()?).map(|s| s.cmp(d)),
            Operand::Timestamp(t) => parse_timestamp(stored.as_str()?).map(|s| s.cmp(t)),
            Operand::Boolean(b) => stored.as_bool().map(|s| s.cmp(b)),
        }
    }
}

impl From<Operand> for sea_query::Value {
    fn from(operand: Operand) -> Self {
        match operand {
            Operand::Null => sea_query::Value::String(None),
            Operand::Uuid(u) => u.into(),
            Operand::Text(s) => s.into(),
            Operand::Integer(i) => i.into(),
            Operand::Decimal(d) => d.into(),
            Operand::Date(d) => d.into(),
            Operand::Timestamp(t) => t.into(),
            Operand::Boolean(b) => b.into(),
        }
    }
}

/// Text rendering of a JSON scalar, used for pattern matching and text columns.
pub(crate) fn json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_decimal(s: &str) -> Result<Operand, String> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map(Operand::Decimal)
        .map_err(|_| format!("'{s}' is not a valid number"))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|t| t.date_naive()))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
