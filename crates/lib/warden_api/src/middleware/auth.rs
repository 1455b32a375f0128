//! Authentication middleware: resolves the acting identity of each request.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use warden_core::auth::{Anonymous, Permission, UserAccess};
use warden_core::models::TokenKind;

use crate::AppState;
use crate::error::AppError;

/// Acting identity, stored in request extensions.
#[derive(Clone)]
pub struct Access(pub Arc<dyn Permission>);

/// Extract the token of an `Authorization: Bearer <token>` header.
///
/// `Ok(None)` when the header is absent.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".into()))?;
    header
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))
}

/// Axum middleware: verifies a bearer access token when one is present and
/// injects the resulting [`Access`]. Requests without a token run as
/// [`Anonymous`]; an invalid token is rejected outright.
pub async fn resolve_access(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let access: Arc<dyn Permission> = match bearer_token(request.headers())? {
        None => Arc::new(Anonymous),
        Some(token) => {
            let claims = state
                .issuer
                .verify(token, TokenKind::Access)
                .map_err(|e| AppError::Unauthorized(e.to_string()))?;
            Arc::new(UserAccess::new(claims, state.services.store().clone()))
        }
    };

    request.extensions_mut().insert(Access(access));
    Ok(next.run(request).await)
}
