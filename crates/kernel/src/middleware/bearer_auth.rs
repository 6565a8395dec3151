//! Bearer token authentication middleware.
//!
//! Checks `Authorization: Bearer <token>` headers, verifies the JWT, and
//! stores the caller's [`Identity`] in request extensions.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::IntoResponse, response::Response};
use tracing::debug;

use crate::auth::Identity;
use crate::error::AppError;
use crate::state::AppState;

/// Middleware requiring a valid Bearer JWT.
///
/// A missing or malformed header is 401; a token that fails verification
/// (bad signature, wrong issuer, expired) is 403.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let Some(auth_header) = auth_header else {
        return AppError::Unauthorized("missing bearer token".to_string()).into_response();
    };

    let Some(token) = auth_header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty()) else {
        return AppError::Unauthorized("malformed authorization header".to_string()).into_response();
    };

    let identity: Identity = match state.auth().verify(token) {
        Ok(identity) => identity,
        Err(e) => {
            debug!(error = %e, "invalid bearer token");
            return AppError::Forbidden("invalid or expired token".to_string()).into_response();
        }
    };

    debug!(user = %identity.id, "bearer token accepted");
    request.extensions_mut().insert(identity);

    next.run(request).await
}
