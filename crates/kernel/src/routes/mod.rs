//! HTTP route handlers.

pub mod health;
pub mod ledger;
pub mod records;

use axum::Router;

use crate::catalog::{COMPLAINTS, EXPENSES, FLATS, RESIDENTS};
use crate::middleware::require_bearer_token;
use crate::state::AppState;

/// Build the application router.
///
/// Everything under `/api` requires a bearer token; `/health` is open.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(records::router("flats", &FLATS))
        .merge(records::router("residents", &RESIDENTS))
        .merge(records::router("expenses", &EXPENSES))
        .merge(records::router("complaints", &COMPLAINTS))
        .merge(ledger::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_bearer_token,
        ));

    Router::new()
        .merge(health::router())
        .merge(api)
        .with_state(state)
}
