//! Client handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use warden_core::transfer::ClientDto;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::Access;
use crate::models::{ClientResponse, RegisterClientRequest};

/// `POST /client/register`
pub async fn register_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Json(body): Json<RegisterClientRequest>,
) -> AppResult<(StatusCode, Json<ClientResponse>)> {
    let (credential, client) = body.split();
    let client = state
        .services
        .user(access)
        .register_client(&credential, &client)
        .await?;
    Ok((StatusCode::CREATED, Json(client.into())))
}

/// `PUT /client`
pub async fn update_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Json(body): Json<ClientDto>,
) -> AppResult<Json<ClientResponse>> {
    let client = state.services.user(access).update_client(&body).await?;
    Ok(Json(client.into()))
}

/// `GET /client/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Path(id): Path<String>,
) -> AppResult<Json<ClientResponse>> {
    let client = state
        .services
        .user(access)
        .get_client(&ClientDto::with_id(id))
        .await?;
    Ok(Json(client.into()))
}

/// `DELETE /client/{id}`
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .services
        .user(access)
        .delete_client(&ClientDto::with_id(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
