#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every test builds its own [`TestApp`] using the REAL kernel router,
//! middleware, and services. [`TestApp::new`] runs over a fresh in-memory
//! store; [`TestApp::postgres`] runs over a private schema in the database
//! named by `DATABASE_URL` and yields nothing when that is unset.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value as JsonValue, json};
use tower::ServiceExt;
use uuid::Uuid;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use society_kernel::auth::{AuthService, Identity};
use society_kernel::db;
use society_kernel::routes;
use society_kernel::state::AppState;
use society_kernel::store::{MemoryStore, PgStore};
use society_test_utils::{TestUser, admin_user};

pub const SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";
pub const ISSUER: &str = "society";

/// Storage behind a [`TestApp`].
enum Backend {
    Memory(Arc<MemoryStore>),
    Postgres {
        store: PgStore,
        admin: PgPool,
        schema: String,
    },
}

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    backend: Backend,
    pub state: AppState,
    admin_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(store.clone(), AuthService::new(SECRET, ISSUER));
        Self::build(state, Backend::Memory(store))
    }

    /// Build an app over a freshly migrated schema, or `None` when
    /// `DATABASE_URL` is not set.
    pub async fn postgres() -> Option<Self> {
        dotenvy::dotenv().ok();
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping PostgreSQL test");
            return None;
        };

        let admin = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .expect("Failed to connect to DATABASE_URL");
        let schema = format!("test_{}", Uuid::now_v7().simple());
        sqlx::query(&format!("CREATE SCHEMA {schema}"))
            .execute(&admin)
            .await
            .expect("Failed to create test schema");

        let search_path = format!("SET search_path TO {schema}");
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .after_connect(move |conn, _meta| {
                let sql = search_path.clone();
                Box::pin(async move {
                    sqlx::query(&sql).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .expect("Failed to create test pool");
        db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let store = PgStore::new(pool);
        let state = AppState::with_store(Arc::new(store.clone()), AuthService::new(SECRET, ISSUER));
        Some(Self::build(
            state,
            Backend::Postgres {
                store,
                admin,
                schema,
            },
        ))
    }

    fn build(state: AppState, backend: Backend) -> Self {
        let router = routes::router(state.clone());
        let admin_token = token_for(&admin_user());

        Self {
            router,
            backend,
            state,
            admin_token,
        }
    }

    /// The in-memory store, for seeding rows directly.
    pub fn memory(&self) -> &MemoryStore {
        match &self.backend {
            Backend::Memory(store) => store,
            Backend::Postgres { .. } => panic!("not a memory-backed app"),
        }
    }

    /// The pool of a PostgreSQL-backed app, for raw SQL.
    pub fn pool(&self) -> &PgPool {
        match &self.backend {
            Backend::Postgres { store, .. } => store.pool(),
            Backend::Memory(_) => panic!("not a PostgreSQL-backed app"),
        }
    }

    /// Drop the private schema of a PostgreSQL-backed app.
    pub async fn teardown(self) {
        if let Backend::Postgres {
            store,
            admin,
            schema,
        } = self.backend
        {
            store.pool().close().await;
            sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
                .execute(&admin)
                .await
                .expect("Failed to drop test schema");
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request as an administrator and decode the JSON response.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let token = self.admin_token.clone();
        self.send_as(&token, method, uri, body).await
    }

    /// Send a request with a specific bearer token.
    pub async fn send_as(
        &self,
        token: &str,
        method: &str,
        uri: &str,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.request(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    /// POST a list request.
    pub async fn list(&self, path: &str, body: JsonValue) -> (StatusCode, JsonValue) {
        self.send("POST", &format!("/api/{path}"), Some(body)).await
    }

    /// Create a row and return it, asserting 201.
    pub async fn create(&self, path: &str, body: JsonValue) -> JsonValue {
        let (status, row) = self
            .send("POST", &format!("/api/{path}/mutate"), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {row}");
        row
    }

    /// Create a flat and return its id.
    pub async fn create_flat(&self, flat_number: &str) -> Uuid {
        let row = self
            .create("flats", society_test_utils::test_flat(flat_number).body())
            .await;
        row_id(&row)
    }
}

/// Mint a token for a test user.
pub fn token_for(user: &TestUser) -> String {
    let identity = Identity {
        id: user.id.to_string(),
        email: user.email.clone(),
        name: user.name.clone(),
        permissions: user.permissions.clone(),
    };
    AuthService::new(SECRET, ISSUER)
        .issue(&identity, 3600)
        .expect("Failed to issue token")
}

/// Read a response body as JSON (`null` when empty).
pub async fn read_json(response: Response) -> JsonValue {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    if bytes.is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
}

pub fn row_id(row: &JsonValue) -> Uuid {
    row["id"].as_str().and_then(|s| s.parse().ok()).expect("row has no id")
}
