//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// Token issuance belongs to the external identity provider; this layer only
/// resolves the opaque token to a verified user id. If valid, the user_id is
/// inserted into request extensions for handlers to use. If invalid or
/// missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract cookie header
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse session token from cookie
    let token = cookie_header
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("session=")
        })
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Resolve the token to a user_id
    let user_id = state.db.validate_auth_token(token).await.map_err(|e| {
        error!("Failed to validate auth token: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;

    // 4. Insert user_id into request extensions
    req.extensions_mut().insert(user_id);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
