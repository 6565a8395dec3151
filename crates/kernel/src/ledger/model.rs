//! Ledger entry model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::Operand;
use crate::error::{AppError, AppResult, FieldError};

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money in (maintenance payments).
    Credit,
    /// Money out (society expenses).
    Debit,
}

impl EntryType {
    /// Amount with the sign this entry contributes to the balance.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            EntryType::Credit => amount,
            EntryType::Debit => -amount,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown entry type '{0}'")]
pub struct UnknownEntryType(String);

impl TryFrom<String> for EntryType {
    type Error = UnknownEntryType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "credit" => Ok(EntryType::Credit),
            "debit" => Ok(EntryType::Debit),
            _ => Err(UnknownEntryType(value)),
        }
    }
}

/// Position of an entry in ledger order: creation time, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LedgerPosition {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// A ledger entry as stored.
#[derive(Debug, Clone, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub entry_type: EntryType,
    pub category: Option<String>,
    pub flat_id: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub paid_by: Option<String>,
    pub description: Option<String>,
    pub payment_mode: Option<String>,
    pub amount: Decimal,
    pub running_balance: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn position(&self) -> LedgerPosition {
        LedgerPosition {
            created_at: self.created_at,
            id: self.id,
        }
    }

    /// Contribution of this entry to the balance.
    pub fn signed_amount(&self) -> Decimal {
        self.entry_type.signed(self.amount)
    }

    /// Decode an entry from an API-shaped JSON row.
    pub fn from_row(row: &JsonValue) -> AppResult<Self> {
        serde_json::from_value(row.clone())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("malformed ledger row: {e}")))
    }
}

/// Check the cross-field rules of a prospective ledger row.
///
/// `row` holds the values the entry will have after the mutation, keyed by
/// API field name.
pub fn validate_entry(row: &serde_json::Map<String, JsonValue>) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    let present = |field: &str| {
        row.get(field)
            .is_some_and(|v| !v.is_null() && v.as_str().is_none_or(|s| !s.trim().is_empty()))
    };

    let amount = row
        .get("amount")
        .and_then(|v| match Operand::parse(crate::catalog::ColumnKind::Decimal, v) {
            Ok(Operand::Decimal(d)) => Some(d),
            _ => None,
        });
    if let Some(amount) = amount
        && amount <= Decimal::ZERO
    {
        errors.push(FieldError::new("amount", "must be greater than zero"));
    }

    match row.get("entryType").and_then(JsonValue::as_str) {
        Some("credit") => {
            if !present("flatId") {
                errors.push(FieldError::new("flatId", "is required for credit entries"));
            }
        }
        Some("debit") => {
            if !present("category") {
                errors.push(FieldError::new("category", "is required for debit entries"));
            }
            if !present("paidBy") {
                errors.push(FieldError::new("paidBy", "is required for debit entries"));
            }
        }
        _ => {}
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
