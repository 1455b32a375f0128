//! Validation code handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use warden_core::EngineError;
use warden_core::transfer::CredentialDto;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{ConsumeValidationRequest, IssueValidationRequest, ValidationResponse};

/// `POST /user/validation/renew`: issue a fresh code of the requested type.
///
/// The code only ever leaves through the notification channel.
pub async fn issue_validation_handler(
    State(state): State<AppState>,
    Json(body): Json<IssueValidationRequest>,
) -> AppResult<StatusCode> {
    let kind = body
        .kind
        .ok_or_else(|| EngineError::bad_request("value type is required"))?;
    let credential = CredentialDto {
        email: body.email,
        password: None,
    };
    state
        .services
        .anonymous()
        .issue_validation(kind, &credential)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /user/register/validation`: confirm the mailbox with its code.
pub async fn mail_validation_handler(
    State(state): State<AppState>,
    Json(body): Json<ConsumeValidationRequest>,
) -> AppResult<Json<ValidationResponse>> {
    let (validation, credential) = body.split();
    let token = state
        .services
        .anonymous()
        .mail_validation(&validation, &credential)
        .await?;
    Ok(Json(token.into()))
}
