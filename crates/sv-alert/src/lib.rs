//! sv-alert
//!
//! Alert Dispatcher: renders a run summary and delivers it through an ordered
//! chain of channels (email first, then topic). A failed channel falls through
//! to the next one. When every channel fails the failure is logged and
//! recorded; it never propagates to the caller, so alerting can not mask the
//! validation result.

pub mod relay;
mod render;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sv_config::secrets::resolve_env;
use sv_config::settings::AlertSettings;
use sv_reconcile::RunResult;
use thiserror::Error;

pub use relay::HttpRelay;
pub use render::{render_subject, render_summary};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("DELIVERY_HTTP: status {status}, body: {body}")]
    Http { status: u16, body: String },

    #[error("DELIVERY_TRANSPORT: {0}")]
    Transport(String),

    #[error("DELIVERY_TIMEOUT: no response within {secs}s")]
    Timeout { secs: u64 },
}

// ---------------------------------------------------------------------------
// Transports
// ---------------------------------------------------------------------------

/// Email-style transport.
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), DeliveryError>;
}

/// Topic-publish transport.
#[async_trait::async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish_topic(&self, topic_arn: &str, subject: &str, message: &str) -> Result<(), DeliveryError>;
}

/// One configured channel: a transport plus its addressing.
#[derive(Clone)]
pub enum AlertChannel {
    Email {
        sender: Arc<dyn EmailSender>,
        recipients: Vec<String>,
    },
    Topic {
        publisher: Arc<dyn TopicPublisher>,
        topic_arn: String,
    },
}

impl std::fmt::Debug for AlertChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertChannel::Email { recipients, .. } => f
                .debug_struct("Email")
                .field("recipients", recipients)
                .finish_non_exhaustive(),
            AlertChannel::Topic { topic_arn, .. } => f
                .debug_struct("Topic")
                .field("topic_arn", topic_arn)
                .finish_non_exhaustive(),
        }
    }
}

impl AlertChannel {
    pub fn name(&self) -> &'static str {
        match self {
            AlertChannel::Email { .. } => "email",
            AlertChannel::Topic { .. } => "topic",
        }
    }

    async fn deliver(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        match self {
            AlertChannel::Email { sender, recipients } => sender.send_email(subject, body, recipients).await,
            AlertChannel::Topic { publisher, topic_arn } => {
                publisher.publish_topic(topic_arn, subject, body).await
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub channel: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// Which channels were tried, in order, and which one (if any) succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub attempts: Vec<DeliveryAttempt>,
    pub delivered_via: Option<String>,
}

impl DeliveryRecord {
    pub fn is_delivered(&self) -> bool {
        self.delivered_via.is_some()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    chain: Vec<AlertChannel>,
    timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            chain: Vec::new(),
            timeout,
        }
    }

    /// Append a channel. Channels are tried in the order added.
    pub fn with_channel(mut self, channel: AlertChannel) -> Self {
        self.chain.push(channel);
        self
    }

    /// Email then topic, each over an [`HttpRelay`] whose URL comes from the
    /// configured env var. A channel whose URL env var is unset is skipped.
    pub fn from_settings(settings: &AlertSettings, timeout: Duration) -> Self {
        let mut d = Self::new(timeout);

        if let Some(email) = &settings.email {
            match relay_from_env(email.relay_url_env.as_deref()) {
                Some(relay) => {
                    let relay = match &email.sender {
                        Some(from) => relay.with_sender(from.clone()),
                        None => relay,
                    };
                    d = d.with_channel(AlertChannel::Email {
                        sender: Arc::new(relay),
                        recipients: email.recipients.clone(),
                    });
                }
                None => tracing::warn!(channel = "email", "alert relay url not available; channel skipped"),
            }
        }

        if let Some(topic) = &settings.topic {
            match (relay_from_env(topic.relay_url_env.as_deref()), &topic.topic_arn) {
                (Some(relay), Some(arn)) => {
                    d = d.with_channel(AlertChannel::Topic {
                        publisher: Arc::new(relay),
                        topic_arn: arn.clone(),
                    });
                }
                _ => tracing::warn!(channel = "topic", "alert relay url not available; channel skipped"),
            }
        }

        d
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn channels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.chain.iter().map(AlertChannel::name)
    }

    /// Render and deliver. Stops at the first channel that succeeds.
    pub async fn dispatch(&self, result: &RunResult) -> DeliveryRecord {
        let subject = render_subject(result);
        let body = render_summary(result);
        self.deliver(&subject, &body).await
    }

    pub async fn deliver(&self, subject: &str, body: &str) -> DeliveryRecord {
        let mut record = DeliveryRecord::default();

        for channel in &self.chain {
            let outcome = match tokio::time::timeout(self.timeout, channel.deliver(subject, body)).await {
                Ok(r) => r,
                Err(_) => Err(DeliveryError::Timeout {
                    secs: self.timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(()) => {
                    tracing::info!(channel = channel.name(), "alert delivered");
                    record.attempts.push(DeliveryAttempt {
                        channel: channel.name().to_string(),
                        ok: true,
                        error: None,
                    });
                    record.delivered_via = Some(channel.name().to_string());
                    return record;
                }
                Err(e) => {
                    tracing::warn!(channel = channel.name(), error = %e, "alert delivery failed");
                    record.attempts.push(DeliveryAttempt {
                        channel: channel.name().to_string(),
                        ok: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if !record.attempts.is_empty() {
            tracing::error!(attempts = record.attempts.len(), "all alert channels failed");
        }
        record
    }
}

fn relay_from_env(url_env: Option<&str>) -> Option<HttpRelay> {
    let url = resolve_env(url_env)?;
    match HttpRelay::new(&url) {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::warn!(error = %e, "alert relay url rejected");
            None
        }
    }
}
