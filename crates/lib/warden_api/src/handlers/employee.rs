//! Employee handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use warden_core::transfer::EmployeeDto;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::Access;
use crate::models::{EmployeeResponse, RegisterEmployeeRequest};

/// `POST /employee/register`
pub async fn register_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Json(body): Json<RegisterEmployeeRequest>,
) -> AppResult<(StatusCode, Json<EmployeeResponse>)> {
    let (credential, employee) = body.split();
    let employee = state
        .services
        .user(access)
        .register_employee(&credential, &employee)
        .await?;
    Ok((StatusCode::CREATED, Json(employee.into())))
}

/// `PUT /employee`
pub async fn update_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Json(body): Json<EmployeeDto>,
) -> AppResult<Json<EmployeeResponse>> {
    let employee = state.services.user(access).update_employee(&body).await?;
    Ok(Json(employee.into()))
}

/// `GET /employee/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Path(id): Path<String>,
) -> AppResult<Json<EmployeeResponse>> {
    let employee = state
        .services
        .user(access)
        .get_employee(&EmployeeDto::with_id(id))
        .await?;
    Ok(Json(employee.into()))
}

/// `DELETE /employee/{id}`
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(Access(access)): Extension<Access>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .services
        .user(access)
        .delete_employee(&EmployeeDto::with_id(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
