#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests against a real PostgreSQL database.
//!
//! These run only when `DATABASE_URL` is set; each test migrates and then
//! drops its own schema.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{Value as JsonValue, json};
use society_kernel::catalog::LEDGER_ENTRIES;
use society_kernel::error::AppError;
use society_test_utils::{TestEntry, assert, test_flat, test_resident};
use uuid::Uuid;

use common::{TestApp, read_json, row_id};

async fn running_balances(app: &TestApp) -> Vec<f64> {
    let (status, body) = app
        .list(
            "ledger",
            json!({"limit": 100, "sortCriterias": [{"columnName": "createdAt", "columnOrder": "asc"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["runningBalance"].as_f64().unwrap())
        .collect()
}

async fn balance(app: &TestApp) -> f64 {
    let (status, body) = app.send("GET", "/api/ledger/balance", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["balance"].as_f64().unwrap()
}

#[tokio::test]
async fn flat_crud_round_trip() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };

    let created = app
        .create("flats", test_flat("F101").on_floor(1).with_maintenance(1500.5).body())
        .await;
    let id = row_id(&created);
    assert_eq!(created["flatNumber"], "F101");
    assert_eq!(created["occupancyStatus"], "vacant");
    assert_eq!(created["maintenanceAmount"].as_f64(), Some(1500.5));
    assert::has_key(&created, "createdAt");

    let (status, fetched) = app.send("GET", &format!("/api/flats/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["maintenanceAmount"].as_f64(), Some(1500.5));

    let (status, updated) = app
        .send(
            "PUT",
            &format!("/api/flats/{id}"),
            Some(json!({"occupancyStatus": "occupied", "block": "A"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["occupancyStatus"], "occupied");
    assert_eq!(updated["block"], "A");
    assert_eq!(updated["flatNumber"], "F101");

    let (status, body) = app.send("DELETE", &format!("/api/flats/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, _) = app.send("GET", &format!("/api/flats/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send("PUT", &format!("/api/flats/{id}"), Some(json!({"block": "B"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.teardown().await;
}

#[tokio::test]
async fn constraint_violations_map_to_client_errors() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let flat_id = app.create_flat("F101").await;

    let (status, body) = app
        .send("POST", "/api/flats/mutate", Some(test_flat("F101").body()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert::contains(body["message"].as_str().unwrap(), "flats_flat_number_key");

    let (status, body) = app
        .send(
            "POST",
            "/api/residents/mutate",
            Some(test_resident(Uuid::now_v7(), "Nobody")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "reference");
    assert::contains(body["message"].as_str().unwrap(), "residents_flat_id_fkey");

    app.create("residents", test_resident(flat_id, "Asha")).await;
    let (status, body) = app
        .send("DELETE", &format!("/api/flats/{flat_id}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "reference");

    // The generic record path has no entry rules, so the table CHECK answers.
    let err = app
        .state
        .records()
        .create(
            &LEDGER_ENTRIES,
            &json!({"transactionDate": "2026-01-01", "entryType": "debit", "amount": -5}),
        )
        .await
        .unwrap_err();
    let AppError::Validation(fields) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(fields[0].field, "ledger_entries_amount_check");

    app.teardown().await;
}

#[tokio::test]
async fn blank_optional_unique_values_do_not_conflict() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let flat_id = app.create_flat("F101").await;

    for name in ["Asha", "Ravi"] {
        let mut body = test_resident(flat_id, name);
        body["email"] = json!("");
        let resident = app.create("residents", body).await;
        assert_eq!(resident["email"], JsonValue::Null);
    }

    app.teardown().await;
}

#[tokio::test]
async fn criteria_search_and_paging() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    for (i, number) in ["F101", "F102", "G001"].into_iter().enumerate() {
        app.create("flats", test_flat(number).on_floor(i as i64 + 1).body())
            .await;
    }

    let (status, body) = app
        .list(
            "flats",
            json!({
                "page": 1,
                "limit": 5,
                "searchCriterias": [
                    {"columnName": "flatNumber", "columnOperator": "contains", "columnValue": "f1"}
                ],
                "sortCriterias": [{"columnName": "flatNumber", "columnOrder": "desc"}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert::data_len(&body, 2);
    assert_eq!(body["data"][0]["flatNumber"], "F102");
    assert_eq!(body["data"][1]["flatNumber"], "F101");
    assert_eq!(
        body["pagination"],
        json!({"total": 2, "page": 1, "limit": 5, "totalPages": 1})
    );

    let (status, body) = app
        .list("flats", json!({"page": 1_000_000_000_000_000_000i64, "limit": 100}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert::data_len(&body, 0);
    assert_eq!(body["pagination"]["total"], 3);

    let (status, body) = app
        .list("flats", json!({"with": {"residents": true}}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"][0]["residents"], json!([]));

    app.teardown().await;
}

#[tokio::test]
async fn running_balances_follow_creation_order() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let flat = app.create_flat("F101").await;

    let first = app
        .create("ledger", TestEntry::credit(flat, 100.0).on_date("2026-01-01").body())
        .await;
    let second = app
        .create("ledger", TestEntry::debit("Repairs", 30.0).on_date("2026-01-02").body())
        .await;
    app.create("ledger", TestEntry::credit(flat, 50.0).on_date("2026-01-03").body())
        .await;

    assert_eq!(first["runningBalance"].as_f64(), Some(100.0));
    assert_eq!(second["runningBalance"].as_f64(), Some(70.0));
    assert_eq!(running_balances(&app).await, vec![100.0, 70.0, 120.0]);
    assert_eq!(balance(&app).await, 120.0);

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/ledger/{}", row_id(&first)),
            Some(json!({"amount": 200})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(running_balances(&app).await, vec![200.0, 170.0, 220.0]);

    let (status, _) = app
        .send("DELETE", &format!("/api/ledger/{}", row_id(&second)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(running_balances(&app).await, vec![200.0, 250.0]);
    assert_eq!(balance(&app).await, 250.0);

    app.teardown().await;
}

#[tokio::test]
async fn recalculate_repairs_stale_running_balances() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let start = Utc::now() - Duration::days(3);

    for (i, (kind, amount)) in [("credit", 100), ("debit", 30), ("credit", 50)]
        .into_iter()
        .enumerate()
    {
        sqlx::query(
            "INSERT INTO ledger_entries \
             (id, transaction_date, entry_type, amount, running_balance, created_at) \
             VALUES ($1, DATE '2026-01-01', $2, $3, 9999, $4)",
        )
        .bind(Uuid::now_v7())
        .bind(kind)
        .bind(Decimal::from(amount))
        .bind(start + Duration::hours(i as i64))
        .execute(app.pool())
        .await
        .unwrap();
    }

    assert_eq!(balance(&app).await, 120.0);
    assert_eq!(running_balances(&app).await, vec![9999.0, 9999.0, 9999.0]);

    let (status, body) = app.send("POST", "/api/ledger/recalculate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "updated": 3}));
    assert_eq!(running_balances(&app).await, vec![100.0, 70.0, 120.0]);

    let (_, body) = app.send("POST", "/api/ledger/recalculate", None).await;
    assert_eq!(body["updated"], 0);

    app.teardown().await;
}

#[tokio::test]
async fn health_reports_postgres_backend() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };

    let response = app
        .request(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({"status": "healthy", "storage": true, "backend": "postgres"})
    );

    app.teardown().await;
}
