//! Society Management Kernel Library
//!
//! Exposes the kernel for the `society` binary and for integration testing.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod query;
pub mod records;
pub mod routes;
pub mod state;
pub mod store;
