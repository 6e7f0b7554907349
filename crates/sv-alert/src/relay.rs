//! HTTP relay transport.
//!
//! POSTs a JSON envelope to a mail relay or topic bridge webhook. Any
//! non-2xx response is a delivery failure.

use std::time::Duration;

use reqwest::Url;
use serde::Serialize;

use crate::{DeliveryError, EmailSender, TopicPublisher};

/// Upper bound for one relay call. The dispatcher applies its own timeout on top.
const RELAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpRelay {
    http: reqwest::Client,
    url: Url,
    sender: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Envelope<'a> {
    Email {
        #[serde(skip_serializing_if = "Option::is_none")]
        sender: Option<&'a str>,
        recipients: &'a [String],
        subject: &'a str,
        body: &'a str,
    },
    Topic {
        topic_arn: &'a str,
        subject: &'a str,
        message: &'a str,
    },
}

impl HttpRelay {
    pub fn new(url: &str) -> Result<Self, DeliveryError> {
        let url = Url::parse(url).map_err(|e| DeliveryError::Transport(format!("invalid relay url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url,
            sender: None,
        })
    }

    /// `From` address forwarded to the mail relay.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    async fn post(&self, envelope: &Envelope<'_>) -> Result<(), DeliveryError> {
        let resp = self
            .http
            .post(self.url.clone())
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout {
                        secs: RELAY_TIMEOUT.as_secs(),
                    }
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl EmailSender for HttpRelay {
    async fn send_email(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), DeliveryError> {
        self.post(&Envelope::Email {
            sender: self.sender.as_deref(),
            recipients,
            subject,
            body,
        })
        .await
    }
}

#[async_trait::async_trait]
impl TopicPublisher for HttpRelay {
    async fn publish_topic(&self, topic_arn: &str, subject: &str, message: &str) -> Result<(), DeliveryError> {
        self.post(&Envelope::Topic {
            topic_arn,
            subject,
            message,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_url() {
        assert!(matches!(
            HttpRelay::new("not a url"),
            Err(DeliveryError::Transport(_))
        ));
    }

    #[test]
    fn envelope_is_tagged_by_kind() {
        let v = serde_json::to_value(Envelope::Topic {
            topic_arn: "arn:t",
            subject: "s",
            message: "m",
        })
        .unwrap();
        assert_eq!(
            v,
            serde_json::json!({"kind": "topic", "topic_arn": "arn:t", "subject": "s", "message": "m"})
        );
    }
}
