//! API server configuration.

use std::str::FromStr;

use chrono::{Duration, Utc};
use tracing::warn;
use warden_core::auth::SessionIssuer;
use warden_core::auth::jwt::{
    ACCESS_TOKEN_EXPIRY_SECS, REFRESH_TOKEN_EXPIRY_SECS, resolve_jwt_secret,
};
use warden_core::config::{DEFAULT_VALIDATION_TTL_SECS, EngineConfig};
use warden_core::notify::SmtpConfig;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Application name shown in notifications.
    pub app_name: String,
    pub validation_ttl_secs: i64,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// SMTP relay. `None` logs mails instead of sending them.
    pub smtp: Option<SmtpConfig>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                             |
    /// |------------------------------|-------------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:3100`                    |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/warden`  |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file       |
    /// | `APP_NAME`                   | `Warden`                            |
    /// | `VALIDATION_TTL_SECS`        | `900`                               |
    /// | `ACCESS_TOKEN_TTL_SECS`      | `900`                               |
    /// | `REFRESH_TOKEN_TTL_SECS`     | `2592000`                           |
    /// | `SMTP_HOST`                  | unset (mails are logged)            |
    /// | `SMTP_PORT`                  | `587`                               |
    /// | `SMTP_USERNAME`              | unset                               |
    /// | `SMTP_PASSWORD`              | unset                               |
    /// | `SMTP_STARTTLS`              | `true`                              |
    /// | `MAIL_FROM`                  | `<APP_NAME> <no-reply@localhost>`   |
    pub fn from_env() -> Self {
        let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| "Warden".into());
        let smtp = std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()).map(|host| {
            SmtpConfig {
                host,
                port: env_or("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME").ok(),
                password: std::env::var("SMTP_PASSWORD").ok(),
                from: std::env::var("MAIL_FROM")
                    .unwrap_or_else(|_| format!("{app_name} <no-reply@localhost>")),
                starttls: env_or("SMTP_STARTTLS", true),
            }
        });
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/warden".into()),
            jwt_secret: resolve_jwt_secret(),
            app_name,
            validation_ttl_secs: env_or("VALIDATION_TTL_SECS", DEFAULT_VALIDATION_TTL_SECS),
            access_token_ttl_secs: env_or("ACCESS_TOKEN_TTL_SECS", ACCESS_TOKEN_EXPIRY_SECS),
            refresh_token_ttl_secs: env_or("REFRESH_TOKEN_TTL_SECS", REFRESH_TOKEN_EXPIRY_SECS),
            smtp,
        }
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            app_name: self.app_name.clone(),
            mail_subject: self.app_name.clone(),
            validation_ttl: ttl(
                "VALIDATION_TTL_SECS",
                self.validation_ttl_secs,
                DEFAULT_VALIDATION_TTL_SECS,
            ),
            ..EngineConfig::default()
        }
    }

    pub fn session_issuer(&self) -> SessionIssuer {
        SessionIssuer::new(self.jwt_secret.as_bytes()).with_ttls(
            ttl(
                "ACCESS_TOKEN_TTL_SECS",
                self.access_token_ttl_secs,
                ACCESS_TOKEN_EXPIRY_SECS,
            ),
            ttl(
                "REFRESH_TOKEN_TTL_SECS",
                self.refresh_token_ttl_secs,
                REFRESH_TOKEN_EXPIRY_SECS,
            ),
        )
    }
}

/// A positive TTL whose expiry, counted from now, is still a valid date.
fn ttl(key: &str, secs: i64, default_secs: i64) -> Duration {
    let usable = Duration::try_seconds(secs)
        .filter(|d| *d > Duration::zero() && Utc::now().checked_add_signed(*d).is_some());
    match usable {
        Some(d) => d,
        None => {
            warn!(key, secs, default_secs, "TTL out of range, using default");
            Duration::seconds(default_secs)
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = raw, "unparsable setting, using default");
            default
        }
    }
}
