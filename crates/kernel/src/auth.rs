//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs issued by the society's identity provider (or the
//! `token` CLI subcommand). A verified token yields an [`Identity`] that
//! handlers use for permission checks.

use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Permission granting every action.
pub const ALL_PERMISSIONS: &str = "*";

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,
    /// Subject (user ID).
    pub sub: String,
    pub email: String,
    pub name: String,
    /// Granted permissions, e.g. `ledger_entries.write` or `*`.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub permissions: Vec<String>,
}

impl Identity {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == permission || p == ALL_PERMISSIONS)
    }

    /// Fail with 403 unless the caller holds `permission`.
    pub fn require(&self, permission: &str) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::debug!(user = %self.id, permission, "permission denied");
            Err(AppError::Forbidden(format!("missing permission '{permission}'")))
        }
    }
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            permissions: claims.permissions,
        }
    }
}

/// Token signing and verification.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl AuthService {
    /// Create an auth service with HMAC-SHA256 signing.
    ///
    /// The secret must be at least 32 bytes; configuration enforces this.
    pub fn new(jwt_secret: &[u8], issuer: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret),
            decoding_key: DecodingKey::from_secret(jwt_secret),
            issuer: issuer.to_string(),
        }
    }

    /// Issue a token for `identity`, valid for `ttl_secs`.
    pub fn issue(&self, identity: &Identity, ttl_secs: i64) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            permissions: identity.permissions.clone(),
            iat: now,
            exp: now + ttl_secs,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to encode token")
    }

    /// Verify a token and return the caller's identity.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .context("invalid token")?;
        Ok(data.claims.into())
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.issuer)
            .finish()
    }
}
