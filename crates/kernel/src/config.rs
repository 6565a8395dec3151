//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result, bail};

/// Minimum accepted length of the JWT signing secret, in bytes.
const MIN_JWT_SECRET_LEN: usize = 32;

/// Which storage implementation backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL via sqlx (production).
    Postgres,
    /// Process-local tables; contents are lost on restart.
    Memory,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Storage backend (default: postgres).
    pub storage_backend: StorageBackend,

    /// PostgreSQL connection URL. Required for the postgres backend.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Statement timeout applied to every pooled connection (default: 10).
    pub database_statement_timeout_secs: u64,

    /// HS256 secret used to verify bearer tokens.
    pub jwt_secret: String,

    /// Expected `iss` claim (default: "society").
    pub jwt_issuer: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL environment variable is required for the postgres backend");
        }

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let database_statement_timeout_secs = env::var("DATABASE_STATEMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_STATEMENT_TIMEOUT_SECS must be a valid u64")?;

        let (jwt_secret, jwt_issuer) = Self::jwt_from_env()?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            storage_backend,
            database_url,
            database_max_connections,
            database_statement_timeout_secs,
            jwt_secret,
            jwt_issuer,
            cors_allowed_origins,
        })
    }

    /// Read only the token signing settings (`JWT_SECRET`, `JWT_ISSUER`).
    pub fn jwt_from_env() -> Result<(String, String)> {
        let jwt_secret =
            env::var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "society".to_string());
        Ok((jwt_secret, jwt_issuer))
    }

    /// Configuration for an in-memory instance, used by tests and demos.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            port: 0,
            storage_backend: StorageBackend::Memory,
            database_url: None,
            database_max_connections: 1,
            database_statement_timeout_secs: 10,
            jwt_secret: jwt_secret.to_string(),
            jwt_issuer: "society".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}
