//! Scenario: weekly inventory
//!
//! # Invariants under test
//!
//! 1. Weekly runs never classify: discrepancies are empty and the run is not
//!    fatal whatever the listings contain.
//! 2. The inventory covers both sides within the lookback window only.
//! 3. With `notify_weekly` the summary is sent; without it nothing is sent.

use chrono::Duration;
use sv_runtime::{RunOptions, ValidationRequest};
use sv_schemas::RunMode;
use sv_testkit::{reference_now, Harness};

fn seed(h: &Harness) {
    let recent = Some(reference_now() - Duration::days(2));
    h.source.put("a.zip", 10, recent);
    h.source.put("b.zip", 0, recent);
    h.target.put("b.zip", 99, recent);
    h.target.put("c.zip", 5, recent);
    h.source.put("old.zip", 1, Some(reference_now() - Duration::days(30)));
}

#[tokio::test]
async fn weekly_reports_inventory_without_discrepancies() -> anyhow::Result<()> {
    let h = Harness::new();
    seed(&h);

    let outcome = h
        .controller(&[])?
        .run(&ValidationRequest::for_mode(RunMode::Weekly), RunOptions::default())
        .await?;

    let r = &outcome.result;
    assert!(r.discrepancies.is_empty());
    assert!(!r.fatal);
    assert_eq!(r.status, "ok");

    let inv = r.inventory.as_ref().expect("weekly result carries inventory");
    assert_eq!(inv.lookback_days, 7);
    assert_eq!(inv.union_count, 3);
    assert_eq!(inv.source_only, 1);
    assert_eq!(inv.target_only, 1);
    assert_eq!(inv.source.object_count, 2);
    assert_eq!(inv.target.total_bytes, 104);
    assert_eq!(r.checked, 3);

    let sent = h.email.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("[WEEKLY]"));
    Ok(())
}

#[tokio::test]
async fn weekly_summary_is_optional() -> anyhow::Result<()> {
    let h = Harness::new();
    seed(&h);

    let outcome = h
        .controller(&["alerts: { notify_weekly: false }"])?
        .run(&ValidationRequest::for_mode(RunMode::Weekly), RunOptions::default())
        .await?;

    assert!(!outcome.is_fatal());
    assert!(outcome.delivery.is_none());
    assert!(h.email.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn weekly_listing_failure_is_still_not_fatal() -> anyhow::Result<()> {
    let h = Harness::new();
    seed(&h);
    h.target.fail_listing(sv_store::StoreError::Timeout { secs: 5 });

    let outcome = h
        .controller(&[])?
        .run(&ValidationRequest::for_mode(RunMode::Weekly), RunOptions::default())
        .await?;

    assert!(!outcome.is_fatal());
    let inv = outcome.result.inventory.expect("inventory");
    assert!(inv.target.listing_failure.is_some());
    Ok(())
}
