//! Ledger routes.
//!
//! Listing and reads go through the generic record handlers; mutations go
//! through the ledger service so running balances stay current.

use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::records::{self, SuccessResponse};
use crate::auth::Identity;
use crate::catalog::LEDGER_ENTRIES;
use crate::error::AppResult;
use crate::query::{PaginatedResult, PaginationRequest};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct BalanceResponse {
    success: bool,
    balance: f64,
}

#[derive(Debug, Serialize)]
struct RecalculateResponse {
    success: bool,
    updated: u64,
}

/// Create the ledger router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ledger", post(list))
        .route("/api/ledger/mutate", post(create))
        .route("/api/ledger/balance", get(balance))
        .route("/api/ledger/recalculate", post(recalculate))
        .route(
            "/api/ledger/{id}",
            get(get_entry).put(update).delete(delete),
        )
}

async fn list(
    State(state): State<AppState>,
    body: Result<Json<PaginationRequest>, JsonRejection>,
) -> AppResult<Json<PaginatedResult>> {
    records::list(&state, &LEDGER_ENTRIES, body).await
}

async fn get_entry(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<JsonValue>> {
    records::get_one(&state, &LEDGER_ENTRIES, id).await
}

async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> AppResult<(StatusCode, Json<JsonValue>)> {
    identity.require(&LEDGER_ENTRIES.write_permission())?;
    let Json(body) = body?;
    let entry = state.ledger().create(&body).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> AppResult<Json<JsonValue>> {
    identity.require(&LEDGER_ENTRIES.write_permission())?;
    let Path(id) = id?;
    let Json(body) = body?;
    Ok(Json(state.ledger().update(id, &body).await?))
}

async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<SuccessResponse>> {
    identity.require(&LEDGER_ENTRIES.write_permission())?;
    let Path(id) = id?;
    state.ledger().delete(id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn balance(State(state): State<AppState>) -> AppResult<Json<BalanceResponse>> {
    let balance = state.ledger().balance().await?;
    Ok(Json(BalanceResponse {
        success: true,
        balance: balance.to_f64().unwrap_or_default(),
    }))
}

async fn recalculate(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Json<RecalculateResponse>> {
    identity.require(&LEDGER_ENTRIES.write_permission())?;
    let updated = state.ledger().recalculate_all().await?;
    Ok(Json(RecalculateResponse {
        success: true,
        updated,
    }))
}
