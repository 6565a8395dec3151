//! Society ledger: credits, debits, and running balances.
//!
//! Entries are ordered by creation time, then id. Each entry's running
//! balance is the net of every entry up to and including it; the
//! authoritative total is always computed from amounts, never from a stored
//! running balance.

pub mod balance;
pub mod model;
pub mod service;

pub use model::{EntryType, LedgerEntry, LedgerPosition};
pub use service::LedgerService;
