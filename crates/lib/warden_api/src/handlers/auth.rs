//! Authentication request handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use warden_core::transfer::{CredentialDto, ValidationDto};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{Access, bearer_token};
use crate::models::{PasswordRequest, TokenResponse};

/// `POST /user/auth`: authenticate with email + password.
pub async fn authenticate_handler(
    State(state): State<AppState>,
    Json(body): Json<CredentialDto>,
) -> AppResult<Json<TokenResponse>> {
    let who = state.services.anonymous().authenticate(&body).await?;
    let pair = state.issuer.issue_pair(&who.credential_id, who.kind)?;
    Ok(Json(pair.into()))
}

/// `GET /user/auth/renew`: exchange the refresh token carried in
/// `Authorization` for a new pair.
pub async fn renew_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<TokenResponse>> {
    let token = bearer_token(&headers)?;
    let pair = state.issuer.renew(token)?;
    Ok(Json(pair.into()))
}

/// `PUT /user/password`: change a password as its owner, or reset it with a
/// password validation code.
pub async fn password_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Json(body): Json<PasswordRequest>,
) -> AppResult<StatusCode> {
    let credential = CredentialDto {
        email: body.email,
        password: body.password,
    };
    let engine = state.services.user(access);
    match body.token {
        Some(token) => {
            engine
                .reset_password(&ValidationDto::new(token), &credential)
                .await?
        }
        None => engine.update_password(&credential).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}
