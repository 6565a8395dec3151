//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::auth::AuthService;
use crate::config::{Config, StorageBackend};
use crate::db;
use crate::ledger::LedgerService;
use crate::query::CriteriaService;
use crate::records::RecordService;
use crate::store::{LedgerStore, MemoryStore, PgStore, RecordStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Row storage for every table.
    store: Arc<dyn RecordStore>,

    /// Paginated listing.
    criteria: CriteriaService,

    /// Single-row reads and writes.
    records: RecordService,

    /// Ledger mutations and balances.
    ledger: LedgerService,

    /// Bearer token verification.
    auth: AuthService,
}

impl AppState {
    /// Create application state for the configured storage backend.
    pub async fn new(config: &Config) -> Result<Self> {
        let auth = AuthService::new(config.jwt_secret.as_bytes(), &config.jwt_issuer);

        match config.storage_backend {
            StorageBackend::Postgres => {
                let pool = db::create_pool(config)
                    .await
                    .context("failed to create database pool")?;

                db::run_migrations(&pool)
                    .await
                    .context("failed to run migrations")?;

                info!("PostgreSQL connected and migrated");
                Ok(Self::with_store(Arc::new(PgStore::new(pool)), auth))
            }
            StorageBackend::Memory => {
                info!("using in-memory storage; data is lost on restart");
                Ok(Self::with_store(Arc::new(MemoryStore::new()), auth))
            }
        }
    }

    /// Build state over an existing store.
    pub fn with_store<S>(store: Arc<S>, auth: AuthService) -> Self
    where
        S: RecordStore + LedgerStore + 'static,
    {
        let records_store: Arc<dyn RecordStore> = store.clone();
        let ledger_store: Arc<dyn LedgerStore> = store;
        let records = RecordService::new(records_store.clone());

        Self {
            inner: Arc::new(AppStateInner {
                criteria: CriteriaService::new(records_store.clone()),
                ledger: LedgerService::new(records.clone(), ledger_store),
                records,
                store: records_store,
                auth,
            }),
        }
    }

    /// Get the record store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.inner.store
    }

    /// Get the criteria service.
    pub fn criteria(&self) -> &CriteriaService {
        &self.inner.criteria
    }

    /// Get the record service.
    pub fn records(&self) -> &RecordService {
        &self.inner.records
    }

    /// Get the ledger service.
    pub fn ledger(&self) -> &LedgerService {
        &self.inner.ledger
    }

    /// Get the auth service.
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }
}
