//! Notification delivery.
//!
//! Validation codes reach users by mail. Rendering happens through a
//! [`TemplateSet`] built once at startup; delivery goes through a [`Mailer`]
//! driven by the background [`NotificationQueue`].

pub mod dispatch;
pub mod smtp;
pub mod templates;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::error::EngineError;

pub use dispatch::{DeliveryReport, MailJob, NotificationQueue, send_with_retry};
pub use smtp::{SmtpConfig, SmtpMailer};
pub use templates::{Rendered, TemplateError, TemplateSet};

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Delivery failures. All of them are treated as transient by the retry loop.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("message build failed: {0}")]
    Build(String),

    #[error("transport failed: {0}")]
    Transport(String),
}

impl From<NotifyError> for EngineError {
    fn from(e: NotifyError) -> Self {
        EngineError::delivery_failed("notification delivery failed").with_cause(e)
    }
}

/// Sends rendered messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), NotifyError>;
}

/// Mailer that only logs. Used when no SMTP relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> Result<(), NotifyError> {
        info!(
            to = ?mail.to,
            subject = %mail.subject,
            "mail not sent, no SMTP relay configured"
        );
        Ok(())
    }
}
