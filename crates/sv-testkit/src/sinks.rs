use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use sv_alert::{DeliveryError, EmailSender, TopicPublisher};
use sv_artifacts::{ReportError, ReportSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAlert {
    /// Recipients joined with `,` for email; the topic ARN for topic.
    pub address: String,
    pub subject: String,
    pub body: String,
}

/// Records what it is asked to send, or fails every call.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    fail: Mutex<bool>,
    sent: Mutex<Vec<SentAlert>>,
}

impl RecordingTransport {
    pub fn set_failing(&self, fail: bool) {
        if let Ok(mut f) = self.fail.lock() {
            *f = fail;
        }
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, address: String, subject: &str, body: &str) -> Result<(), DeliveryError> {
        if self.fail.lock().map(|f| *f).unwrap_or(true) {
            return Err(DeliveryError::Http {
                status: 502,
                body: "transport unavailable".to_string(),
            });
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentAlert {
                address,
                subject: subject.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EmailSender for RecordingTransport {
    async fn send_email(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), DeliveryError> {
        self.record(recipients.join(","), subject, body)
    }
}

#[async_trait::async_trait]
impl TopicPublisher for RecordingTransport {
    async fn publish_topic(&self, topic_arn: &str, subject: &str, message: &str) -> Result<(), DeliveryError> {
        self.record(topic_arn.to_string(), subject, message)
    }
}

/// Keeps report files in memory, keyed by file name.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryReportSink {
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn text(&self, file_name: &str) -> Option<String> {
        self.files()
            .get(file_name)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl ReportSink for MemoryReportSink {
    fn write_report(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
        if let Ok(mut files) = self.files.lock() {
            files.insert(file_name.to_string(), bytes.to_vec());
        }
        Ok(PathBuf::from("memory").join(file_name))
    }
}
