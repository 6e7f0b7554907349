//! sv-artifacts
//!
//! Persisted run report:
//! - `<mode>-monitor-<YYYYMMDDHHMMSS>.txt`: line-oriented text report
//! - `<mode>-monitor-<YYYYMMDDHHMMSS>.json`: the full run result
//!
//! Both are written to a local directory, then the text report is uploaded to
//! the target bucket under the configured prefix. Every step is best effort:
//! failures are logged and reflected in [`WrittenReport`], never raised.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sv_reconcile::RunResult;
use sv_store::ObjectSink;
use thiserror::Error;

pub const REPORT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("REPORT_WRITE: {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("REPORT_SERIALIZE: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("REPORT_UPLOAD: {0}")]
    Upload(#[from] sv_store::StoreError),
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Text report body.
///
/// ```text
/// Mode: daily
/// Bucket: <bucket>
/// Container: <container>
/// Checked objects: <n>
/// Time(UTC): <YYYYMMDDHHMMSS>
///
/// RESULT: DISCREPANCIES_FOUND
///
/// <one discrepancy per line>
/// ```
pub fn render_report(result: &RunResult) -> String {
    let mut lines = vec![
        format!("Mode: {}", result.mode),
        format!("Bucket: {}", result.target),
        format!("Container: {}", result.source),
        format!("Checked objects: {}", result.checked),
        format!("Time(UTC): {}", result.compact_timestamp()),
        String::new(),
        format!("RESULT: {}", result.result_label()),
    ];
    if !result.discrepancies.is_empty() {
        lines.push(String::new());
        lines.extend(result.discrepancies.iter().map(|d| d.render_line()));
    }
    lines.join("\n")
}

/// `<mode>-monitor-<YYYYMMDDHHMMSS>` without extension.
pub fn report_stem(result: &RunResult) -> String {
    format!("{}-monitor-{}", result.mode, result.compact_timestamp())
}

/// Upload key: `<prefix>/<file name>`; an empty prefix yields the bare name.
pub fn report_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Local persistence of report bytes.
pub trait ReportSink: Send + Sync {
    fn write_report(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ReportError>;
}

/// Writes into a directory, creating it when missing.
#[derive(Debug, Clone)]
pub struct LocalReportSink {
    dir: PathBuf,
}

impl LocalReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportSink for LocalReportSink {
    fn write_report(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ReportError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes).map_err(|source| ReportError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Where a run's report ended up. `None` means that step failed or was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenReport {
    pub local_path: Option<PathBuf>,
    pub sidecar_path: Option<PathBuf>,
    pub report_key: Option<String>,
}

#[derive(Clone)]
pub struct ReportWriter {
    sink: Arc<dyn ReportSink>,
    uploader: Option<Arc<dyn ObjectSink>>,
    prefix: String,
}

impl ReportWriter {
    pub fn new(sink: Arc<dyn ReportSink>, prefix: impl Into<String>) -> Self {
        Self {
            sink,
            uploader: None,
            prefix: prefix.into(),
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn ObjectSink>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub async fn write(&self, result: &RunResult) -> WrittenReport {
        let stem = report_stem(result);
        let txt_name = format!("{stem}.txt");
        let body = render_report(result);
        let mut out = WrittenReport::default();

        match self.sink.write_report(&txt_name, body.as_bytes()) {
            Ok(p) => out.local_path = Some(p),
            Err(e) => tracing::warn!(error = %e, "report write failed"),
        }

        match serde_json::to_vec_pretty(result)
            .map_err(ReportError::from)
            .and_then(|json| self.sink.write_report(&format!("{stem}.json"), &json))
        {
            Ok(p) => out.sidecar_path = Some(p),
            Err(e) => tracing::warn!(error = %e, "result sidecar write failed"),
        }

        if let Some(uploader) = &self.uploader {
            let key = report_key(&self.prefix, &txt_name);
            match uploader
                .put_object(&key, body.into_bytes(), REPORT_CONTENT_TYPE)
                .await
                .map_err(ReportError::from)
            {
                Ok(()) => {
                    tracing::info!(bucket = uploader.location(), key = %key, "report uploaded");
                    out.report_key = Some(key);
                }
                Err(e) => tracing::warn!(bucket = uploader.location(), error = %e, "report upload failed"),
            }
        }

        out
    }
}
