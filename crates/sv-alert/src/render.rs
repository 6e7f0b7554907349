//! Deterministic, line-oriented alert text.

use sv_reconcile::{RunResult, SideInventory};

/// `[<MODE>] sync validation <RESULT> (<n> discrepancies)`
pub fn render_subject(result: &RunResult) -> String {
    format!(
        "[{}] sync validation {} ({} discrepancies)",
        result.mode.as_str().to_ascii_uppercase(),
        result.result_label(),
        result.discrepancies.len()
    )
}

/// Header, counts, then one line per discrepancy (or one all-clear line).
///
/// Weekly results append the inventory summary.
pub fn render_summary(result: &RunResult) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(
        "Sync validation | mode={} | source={} | target={} | at={}",
        result.mode,
        result.source,
        result.target,
        result.generated_at.format("%Y-%m-%dT%H:%M:%SZ")
    ));
    lines.push(format!(
        "Checked: {} | Discrepancies: {} | Status: {}",
        result.checked,
        result.discrepancies.len(),
        result.status
    ));
    lines.push(String::new());

    if result.discrepancies.is_empty() {
        lines.push("All clear: no discrepancies found.".to_string());
    } else {
        lines.extend(result.discrepancies.iter().map(|d| d.render_line()));
    }

    if let Some(inv) = &result.inventory {
        lines.push(String::new());
        lines.push(format!(
            "Inventory window: {} days (modified since {})",
            inv.lookback_days,
            inv.modified_after.format("%Y-%m-%dT%H:%M:%SZ")
        ));
        lines.push(side_line("source", &inv.source));
        lines.push(side_line("target", &inv.target));
        lines.push(format!(
            "union={} | source_only={} | target_only={}",
            inv.union_count, inv.source_only, inv.target_only
        ));
    }

    lines.join("\n")
}

fn side_line(side: &str, inv: &SideInventory) -> String {
    match &inv.listing_failure {
        Some(err) => format!("{side}: listing unavailable ({err})"),
        None => format!(
            "{side}: objects={} bytes={}",
            inv.object_count, inv.total_bytes
        ),
    }
}
