use crate::runner::executor::RunOutcome;
use crate::runner::report::SlowTests;
use crate::runner::result::{CaseResult, CaseStatus};

/// Format a status label for terminal output.
fn status_label(status: &CaseStatus) -> &'static str {
    match status {
        CaseStatus::Passed => "PASSED",
        CaseStatus::Failed => "FAILED",
        CaseStatus::Error => "ERROR",
        CaseStatus::Skipped => "SKIPPED",
    }
}

/// Format a case result as it completes.
pub fn format_case_result(result: &CaseResult) -> String {
    let status = status_label(&result.status);
    let mut line = match result.status {
        CaseStatus::Skipped => format!("  [{status}] {}", result.name),
        _ => format!(
            "  [{status}] {} ({:.2}s)",
            result.name,
            result.duration.as_secs_f64()
        ),
    };

    if let Some(error) = &result.error {
        line.push_str(&format!("\n          → {error}"));
    }
    if let Some(reason) = &result.skip_reason {
        line.push_str(&format!("\n          → {reason}"));
    }

    line
}

/// Format the final summary after all steps complete.
pub fn format_summary(outcome: &RunOutcome) -> String {
    let summary = &outcome.summary;
    let mut parts = Vec::new();

    if summary.passed > 0 {
        parts.push(format!("{} passed", summary.passed));
    }
    if summary.failed > 0 {
        parts.push(format!("{} failed", summary.failed));
    }
    if summary.errors > 0 {
        parts.push(format!("{} errors", summary.errors));
    }
    if summary.skipped_upstream > 0 {
        parts.push(format!("{} skipped on upstream failures", summary.skipped_upstream));
    }
    if summary.skipped_known_bug > 0 {
        parts.push(format!("{} skipped as known bugs", summary.skipped_known_bug));
    }
    if summary.skipped_disabled > 0 {
        parts.push(format!("{} disabled", summary.skipped_disabled));
    }
    if summary.skipped_aborted > 0 {
        parts.push(format!("{} not reached", summary.skipped_aborted));
    }
    if parts.is_empty() {
        parts.push("0 tests".into());
    }

    let mut text = format!(
        "\nResults: {} ({:.1}s)",
        parts.join(", "),
        outcome.total_duration.as_secs_f64()
    );
    if let Some(cause) = &outcome.aborted {
        text.push_str(&format!("\nRun aborted: {cause}"));
    }
    text
}

/// Format the slowest-test lines appended to a verbose summary.
pub fn format_slowest(outcome: &RunOutcome) -> String {
    let mut slow = SlowTests::default();
    for result in &outcome.results {
        if result.status != CaseStatus::Skipped {
            slow.record(&result.name, result.duration);
        }
    }
    let lines: Vec<String> = slow
        .into_sorted()
        .into_iter()
        .map(|(name, duration)| format!("  {:.2}s  {name}", duration.as_secs_f64()))
        .collect();
    if lines.is_empty() {
        String::new()
    } else {
        format!("\nSlowest tests:\n{}", lines.join("\n"))
    }
}
