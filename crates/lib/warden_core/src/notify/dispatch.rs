//! Background notification queue.
//!
//! Jobs are submitted over an unbounded `mpsc` channel to a worker task. Each
//! job runs its own render + retry loop in a detached task, so a slow relay
//! never holds up the next job and the submitting request never waits.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Mail, Mailer, TemplateSet};
use crate::config::RetryPolicy;
use crate::error::EngineError;

/// A notification waiting to be rendered and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailJob {
    pub to: String,
    pub subject: String,
    pub template: String,
    pub data: Vec<(String, String)>,
}

/// Final outcome of a job.
#[derive(Debug)]
pub struct DeliveryReport {
    pub to: String,
    pub template: String,
    /// Attempts made, the successful one included.
    pub attempts: u32,
    pub error: Option<EngineError>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// Send `mail`, retrying on failure with a fixed pause.
///
/// Returns the number of attempts it took. Once the policy is exhausted the
/// last transport error is kept as the private cause of a `DeliveryFailed`.
pub async fn send_with_retry(
    mailer: &dyn Mailer,
    mail: &Mail,
    policy: RetryPolicy,
) -> Result<u32, EngineError> {
    let attempts = policy.attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match mailer.send(mail).await {
            Ok(()) => return Ok(attempt),
            Err(e) => {
                warn!(attempt, max = attempts, error = %e, "mail delivery attempt failed");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
    let err = EngineError::delivery_failed(format!(
        "notification not delivered after {attempts} attempts"
    ));
    Err(match last_error {
        Some(cause) => err.with_cause(cause),
        None => err,
    })
}

struct Worker {
    mailer: Arc<dyn Mailer>,
    templates: Arc<TemplateSet>,
    policy: RetryPolicy,
    reports: Option<mpsc::UnboundedSender<DeliveryReport>>,
}

impl Worker {
    async fn deliver(self: Arc<Self>, job: MailJob) {
        let data: Vec<(&str, &str)> = job
            .data
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let (attempts, error) = match self.templates.render(&job.template, &data) {
            Ok(rendered) => {
                let mail = Mail {
                    to: vec![job.to.clone()],
                    subject: job.subject.clone(),
                    text: rendered.text,
                    html: rendered.html,
                };
                match send_with_retry(self.mailer.as_ref(), &mail, self.policy).await {
                    Ok(attempts) => {
                        info!(to = %job.to, template = %job.template, attempts, "mail delivered");
                        (attempts, None)
                    }
                    Err(e) => (self.policy.attempts.max(1), Some(e.log())),
                }
            }
            Err(e) => {
                let err = EngineError::delivery_failed("notification could not be rendered")
                    .with_cause(e)
                    .log();
                (0, Some(err))
            }
        };

        if let Some(reports) = &self.reports {
            let report = DeliveryReport {
                to: job.to,
                template: job.template,
                attempts,
                error,
            };
            if reports.send(report).is_err() {
                debug!("delivery report receiver dropped");
            }
        }
    }
}

/// Handle for submitting notification jobs. Cheap to clone.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<MailJob>,
}

impl NotificationQueue {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn start(mailer: Arc<dyn Mailer>, templates: Arc<TemplateSet>, policy: RetryPolicy) -> Self {
        Self::spawn(Worker {
            mailer,
            templates,
            policy,
            reports: None,
        })
    }

    /// Like [`start`](Self::start), also publishing one [`DeliveryReport`] per job.
    pub fn start_with_reports(
        mailer: Arc<dyn Mailer>,
        templates: Arc<TemplateSet>,
        policy: RetryPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<DeliveryReport>) {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let queue = Self::spawn(Worker {
            mailer,
            templates,
            policy,
            reports: Some(report_tx),
        });
        (queue, report_rx)
    }

    fn spawn(worker: Worker) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<MailJob>();
        let worker = Arc::new(worker);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                debug!(to = %job.to, template = %job.template, "mail job received");
                tokio::spawn(worker.clone().deliver(job));
            }
            debug!("notification queue closed");
        });
        Self { tx }
    }

    /// Submit a job without waiting for it.
    pub fn enqueue(&self, job: MailJob) -> Result<(), EngineError> {
        self.tx
            .send(job)
            .map_err(|_| EngineError::internal("notification worker is not running"))
    }
}
