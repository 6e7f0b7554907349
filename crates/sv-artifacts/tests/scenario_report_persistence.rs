//! Report persistence.
//!
//! GREEN when:
//! - Text report and JSON sidecar land in the local directory.
//! - The text report is uploaded under `<prefix>/<mode>-monitor-<ts>.txt`.
//! - A failed upload leaves `report_key = None` and nothing is raised.
//! - An unwritable local directory does not block the upload.

use std::fs;
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use sv_artifacts::{LocalReportSink, ReportWriter};
use sv_reconcile::{Discrepancy, DiscrepancyKind, Reconciliation, RunResult};
use sv_schemas::RunMode;
use sv_store::{ObjectSink, StoreError};

#[derive(Default)]
struct RecordingBucket {
    fail: bool,
    puts: Mutex<Vec<(String, Vec<u8>, String)>>,
}

#[async_trait::async_trait]
impl ObjectSink for RecordingBucket {
    fn location(&self) -> &str {
        "landing-uat"
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Auth("put object: 403 Forbidden".into()));
        }
        self.puts
            .lock()
            .unwrap()
            .push((key.to_string(), body, content_type.to_string()));
        Ok(())
    }
}

fn fatal_result() -> RunResult {
    let mut r = Reconciliation::empty();
    r.checked = 1;
    r.discrepancies
        .push(Discrepancy::new(DiscrepancyKind::MissingInTarget, "report_20250101.txt"));
    RunResult::assemble(
        uuid::Uuid::nil(),
        RunMode::Daily,
        "uat",
        "landing-uat",
        r,
        Utc.with_ymd_and_hms(2025, 1, 1, 6, 30, 0).unwrap(),
    )
}

#[tokio::test]
async fn scenario_report_is_written_locally_and_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = Arc::new(RecordingBucket::default());
    let writer = ReportWriter::new(Arc::new(LocalReportSink::new(dir.path())), "monitor-reports")
        .with_uploader(bucket.clone());

    let out = writer.write(&fatal_result()).await;

    let local = out.local_path.clone().unwrap();
    assert_eq!(local, dir.path().join("daily-monitor-20250101063000.txt"));
    let text = fs::read_to_string(&local).unwrap();
    assert!(text.starts_with("Mode: daily\nBucket: landing-uat\nContainer: uat\n"));
    assert!(text.ends_with("RESULT: DISCREPANCIES_FOUND\n\nMISSING_IN_TARGET: report_20250101.txt"));

    let sidecar: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.sidecar_path.unwrap()).unwrap()).unwrap();
    assert_eq!(sidecar["fatal"], true);
    assert_eq!(sidecar["discrepancies"][0]["kind"], "MISSING_IN_TARGET");

    assert_eq!(
        out.report_key.as_deref(),
        Some("monitor-reports/daily-monitor-20250101063000.txt")
    );
    let puts = bucket.puts.lock().unwrap();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].1, text.into_bytes());
    assert!(puts[0].2.starts_with("text/plain"));
}

#[tokio::test]
async fn scenario_failed_upload_is_absorbed() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = Arc::new(RecordingBucket {
        fail: true,
        ..Default::default()
    });
    let writer = ReportWriter::new(Arc::new(LocalReportSink::new(dir.path())), "monitor-reports")
        .with_uploader(bucket);

    let out = writer.write(&fatal_result()).await;
    assert!(out.local_path.is_some());
    assert_eq!(out.report_key, None);
}

#[tokio::test]
async fn scenario_unwritable_directory_still_uploads() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the report directory should be.
    let blocked = dir.path().join("not-a-dir");
    fs::write(&blocked, b"x").unwrap();

    let bucket = Arc::new(RecordingBucket::default());
    let writer = ReportWriter::new(Arc::new(LocalReportSink::new(&blocked)), "monitor-reports")
        .with_uploader(bucket.clone());

    let out = writer.write(&fatal_result()).await;
    assert_eq!(out.local_path, None);
    assert_eq!(out.sidecar_path, None);
    assert!(out.report_key.is_some());
}

#[tokio::test]
async fn scenario_without_uploader_only_writes_locally() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ReportWriter::new(Arc::new(LocalReportSink::new(dir.path().join("nested"))), "monitor-reports");
    let out = writer.write(&fatal_result()).await;
    assert!(out.local_path.unwrap().starts_with(dir.path().join("nested")));
    assert_eq!(out.report_key, None);
}
