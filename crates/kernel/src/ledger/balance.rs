//! Running balance computation.
//!
//! Pure functions shared by every storage backend: given an opening balance
//! and the entries that follow it, produce each entry's running balance in
//! ledger order.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::model::{LedgerEntry, LedgerPosition};

/// Running balance of each entry, in ledger order, starting from `opening`.
pub fn running_balances(opening: Decimal, entries: &[LedgerEntry]) -> Vec<(Uuid, Decimal)> {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.position());

    let mut balance = opening;
    ordered
        .into_iter()
        .map(|entry| {
            balance += entry.signed_amount();
            (entry.id, balance)
        })
        .collect()
}

/// Entries whose stored running balance differs from the recomputed one.
pub fn stale_balances(opening: Decimal, entries: &[LedgerEntry]) -> Vec<(Uuid, Decimal)> {
    running_balances(opening, entries)
        .into_iter()
        .filter(|(id, balance)| {
            entries
                .iter()
                .find(|e| e.id == *id)
                .is_some_and(|e| e.running_balance != *balance)
        })
        .collect()
}

/// Sum of every entry strictly before `anchor`.
pub fn opening_balance(entries: &[LedgerEntry], anchor: LedgerPosition) -> Decimal {
    entries
        .iter()
        .filter(|e| e.position() < anchor)
        .map(LedgerEntry::signed_amount)
        .sum()
}

/// Net balance of a set of entries.
pub fn total(entries: &[LedgerEntry]) -> Decimal {
    entries.iter().map(LedgerEntry::signed_amount).sum()
}
