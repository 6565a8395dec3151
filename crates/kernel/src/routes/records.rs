//! Generic record routes.
//!
//! Every catalog table gets the same five endpoints: paginated list,
//! create, read, partial update, and delete.

use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::auth::Identity;
use crate::catalog::TableSpec;
use crate::error::AppResult;
use crate::query::{PaginatedResult, PaginationRequest};
use crate::state::AppState;

/// Body of a successful delete.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the router for one table, mounted under `/api/{path}`.
pub fn router(path: &str, table: &'static TableSpec) -> Router<AppState> {
    Router::new()
        .route(
            &format!("/api/{path}"),
            post(
                move |State(state): State<AppState>,
                      body: Result<Json<PaginationRequest>, JsonRejection>| async move {
                    list(&state, table, body).await
                },
            ),
        )
        .route(
            &format!("/api/{path}/mutate"),
            post(
                move |State(state): State<AppState>,
                      Extension(identity): Extension<Identity>,
                      body: Result<Json<JsonValue>, JsonRejection>| async move {
                    create(&state, &identity, table, body).await
                },
            ),
        )
        .route(
            &format!("/api/{path}/{{id}}"),
            get(
                move |State(state): State<AppState>,
                      id: Result<Path<Uuid>, PathRejection>| async move {
                    get_one(&state, table, id).await
                },
            )
            .put(
                move |State(state): State<AppState>,
                      Extension(identity): Extension<Identity>,
                      id: Result<Path<Uuid>, PathRejection>,
                      body: Result<Json<JsonValue>, JsonRejection>| async move {
                    update(&state, &identity, table, id, body).await
                },
            )
            .delete(
                move |State(state): State<AppState>,
                      Extension(identity): Extension<Identity>,
                      id: Result<Path<Uuid>, PathRejection>| async move {
                    delete(&state, &identity, table, id).await
                },
            ),
        )
}

/// Paginated, filtered list.
pub(super) async fn list(
    state: &AppState,
    table: &'static TableSpec,
    body: Result<Json<PaginationRequest>, JsonRejection>,
) -> AppResult<Json<PaginatedResult>> {
    let Json(request) = body?;
    let result = state.criteria().paginate(table, &request).await?;
    Ok(Json(result))
}

pub(super) async fn get_one(
    state: &AppState,
    table: &'static TableSpec,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<JsonValue>> {
    let Path(id) = id?;
    Ok(Json(state.records().get(table, id).await?))
}

async fn create(
    state: &AppState,
    identity: &Identity,
    table: &'static TableSpec,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> AppResult<(StatusCode, Json<JsonValue>)> {
    identity.require(&table.write_permission())?;
    let Json(body) = body?;
    let row = state.records().create(table, &body).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update(
    state: &AppState,
    identity: &Identity,
    table: &'static TableSpec,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> AppResult<Json<JsonValue>> {
    identity.require(&table.write_permission())?;
    let Path(id) = id?;
    let Json(body) = body?;
    Ok(Json(state.records().update(table, id, &body).await?))
}

async fn delete(
    state: &AppState,
    identity: &Identity,
    table: &'static TableSpec,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<SuccessResponse>> {
    identity.require(&table.write_permission())?;
    let Path(id) = id?;
    state.records().delete(table, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}
