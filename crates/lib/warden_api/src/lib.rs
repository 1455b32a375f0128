//! # warden_api
//!
//! HTTP API library for Warden. Handlers are thin: each one delegates to a
//! single engine operation in `warden_core`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

use axum::Router;
use axum::routing::{get, post, put};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use warden_core::Services;
use warden_core::auth::SessionIssuer;

use crate::config::ApiConfig;
use crate::handlers::{auth, client, employee, validation};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Identity engine dependencies.
    pub services: Services,
    /// Session token issuer.
    pub issuer: SessionIssuer,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(services: Services, config: ApiConfig) -> Self {
        Self {
            services,
            issuer: config.session_issuer(),
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `warden_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    warden_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Carries a refresh token in `Authorization`, so it bypasses access
    // token resolution.
    let session = Router::new().route("/user/auth/renew", get(auth::renew_handler));

    let api = Router::new()
        .route("/user/auth", post(auth::authenticate_handler))
        .route("/user/password", put(auth::password_handler))
        .route(
            "/user/validation/renew",
            post(validation::issue_validation_handler),
        )
        .route(
            "/user/register/validation",
            put(validation::mail_validation_handler),
        )
        .route("/client/register", post(client::register_handler))
        .route("/client", put(client::update_handler))
        .route(
            "/client/{id}",
            get(client::get_handler).delete(client::delete_handler),
        )
        .route("/employee/register", post(employee::register_handler))
        .route("/employee", put(employee::update_handler))
        .route(
            "/employee/{id}",
            get(employee::get_handler).delete(employee::delete_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::resolve_access,
        ));

    Router::new()
        .merge(session)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
