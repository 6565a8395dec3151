#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for record create/read/update/delete endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::{Value as JsonValue, json};
use society_test_utils::{assert, test_flat, test_resident};
use uuid::Uuid;

use common::{TestApp, row_id};

#[tokio::test]
async fn create_read_update_delete_flat() {
    let app = TestApp::new();

    let created = app
        .create("flats", test_flat("F101").on_floor(1).with_maintenance(1500.0).body())
        .await;
    let id = row_id(&created);
    assert_eq!(created["flatNumber"], "F101");
    assert_eq!(created["occupancyStatus"], "vacant");
    assert::has_key(&created, "createdAt");
    assert::has_key(&created, "updatedAt");

    let (status, fetched) = app.send("GET", &format!("/api/flats/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, updated) = app
        .send(
            "PUT",
            &format!("/api/flats/{id}"),
            Some(json!({"occupancyStatus": "occupied"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["occupancyStatus"], "occupied");
    assert_eq!(updated["flatNumber"], "F101");

    let (status, body) = app.send("DELETE", &format!("/api/flats/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, _) = app.send("GET", &format!("/api/flats/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn managed_columns_in_body_are_ignored() {
    let app = TestApp::new();
    let forged = Uuid::now_v7();

    let created = app
        .create(
            "flats",
            json!({
                "id": forged,
                "flatNumber": "F1",
                "floorNumber": 1,
                "createdAt": "2000-01-01T00:00:00Z"
            }),
        )
        .await;

    assert_ne!(row_id(&created), forged);
    assert_ne!(created["createdAt"], "2000-01-01T00:00:00Z");
}

#[tokio::test]
async fn validation_errors_list_each_field() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            "POST",
            "/api/flats/mutate",
            Some(json!({"floorNumber": "ground", "occupancyStatus": "demolished", "colour": "red"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
    assert::field_error(&body, "flatNumber");
    assert::field_error(&body, "floorNumber");
    assert::field_error(&body, "occupancyStatus");
    assert::field_error(&body, "colour");
}

#[tokio::test]
async fn duplicate_unique_value_is_a_conflict() {
    let app = TestApp::new();
    app.create_flat("F101").await;

    let (status, body) = app
        .send("POST", "/api/flats/mutate", Some(test_flat("F101").body()))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert::contains(body["message"].as_str().unwrap(), "flats_flat_number_key");
}

#[tokio::test]
async fn blank_optional_values_are_stored_as_null() {
    let app = TestApp::new();
    let flat = app
        .create("flats", test_flat("F101").occupied().body())
        .await;
    let flat_id = row_id(&flat);

    for name in ["Asha", "Ravi"] {
        let mut body = test_resident(flat_id, name);
        body["email"] = json!("");
        body["phone"] = json!("  ");
        let resident = app.create("residents", body).await;
        assert_eq!(resident["email"], JsonValue::Null);
        assert_eq!(resident["phone"], JsonValue::Null);
    }

    let (_, body) = app.list("residents", json!({})).await;
    assert::data_len(&body, 2);

    let (status, flat) = app.send("GET", &format!("/api/flats/{flat_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flat["occupancyStatus"], "occupied");
}

#[tokio::test]
async fn missing_reference_is_a_bad_request() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            "POST",
            "/api/residents/mutate",
            Some(test_resident(Uuid::now_v7(), "Nobody")),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "reference");
}

#[tokio::test]
async fn referenced_row_cannot_be_deleted() {
    let app = TestApp::new();
    let flat_id = app.create_flat("F101").await;
    app.create("residents", test_resident(flat_id, "Asha")).await;

    let (status, body) = app
        .send("DELETE", &format!("/api/flats/{flat_id}"), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "reference");
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = TestApp::new();
    let missing = Uuid::now_v7();

    for method in ["GET", "DELETE"] {
        let (status, body) = app
            .send(method, &format!("/api/complaints/{missing}"), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method}");
        assert_eq!(body["error"], "not_found");
    }

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/expenses/{missing}"),
            Some(json!({"vendor": "Acme"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_a_bad_request() {
    let app = TestApp::new();
    let (status, _) = app.send("GET", "/api/flats/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn complaint_defaults_and_relations() {
    let app = TestApp::new();
    let flat_id = app.create_flat("F101").await;
    let resident = app.create("residents", test_resident(flat_id, "Asha")).await;

    let complaint = app
        .create(
            "complaints",
            json!({
                "flatId": flat_id,
                "residentId": resident["id"],
                "title": "Leaking tap"
            }),
        )
        .await;
    assert_eq!(complaint["priority"], "medium");
    assert_eq!(complaint["status"], "open");

    let (status, body) = app
        .list(
            "complaints",
            json!({"with": {"flat": true, "resident": true}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["flat"]["flatNumber"], "F101");
    assert_eq!(body["data"][0]["resident"]["name"], "Asha");
}

#[tokio::test]
async fn expenses_accept_decimal_strings() {
    let app = TestApp::new();

    let expense = app
        .create(
            "expenses",
            json!({
                "category": "Security",
                "amount": "1250.50",
                "expenseDate": "2026-02-01"
            }),
        )
        .await;

    assert_eq!(expense["amount"].as_f64(), Some(1250.5));
    assert_eq!(expense["status"], "pending");

    let (_, body) = app
        .list(
            "expenses",
            json!({
                "searchCriterias": [
                    {"columnName": "amount", "columnOperator": "greaterThanOrEqual", "columnValue": 1000}
                ]
            }),
        )
        .await;
    assert_eq!(body["pagination"]["total"], 1);
}
