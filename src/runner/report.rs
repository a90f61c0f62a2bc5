use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use serde::Serialize;

use crate::runner::executor::RunOutcome;
use crate::runner::result::CaseStatus;

/// Bounded top-N-by-duration tracker.
///
/// A fixed-size min-heap: the root is the fastest of the retained tests,
/// so each new candidate either displaces it or is dropped. Only executed
/// cases are recorded; skips carry no timing.
pub struct SlowTests {
    heap: BinaryHeap<Reverse<(Duration, String)>>,
    capacity: usize,
}

impl SlowTests {
    pub const DEFAULT_CAPACITY: usize = 5;

    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn record(&mut self, name: &str, duration: Duration) {
        if self.capacity == 0 {
            return;
        }
        self.heap.push(Reverse((duration, name.to_owned())));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Retained tests, slowest first.
    pub fn into_sorted(self) -> Vec<(String, Duration)> {
        let mut items: Vec<(Duration, String)> =
            self.heap.into_iter().map(|Reverse(item)| item).collect();
        items.sort_by(|a, b| b.0.cmp(&a.0));
        items.into_iter().map(|(d, n)| (n, d)).collect()
    }
}

impl Default for SlowTests {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Serializable run report for emitter output.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run: RunMetadata,
    pub results: Vec<CaseReport>,
    pub summary: SummaryReport,
    pub slowest: Vec<SlowTestReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requested_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub order: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub status: String,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped_upstream: usize,
    pub skipped_known_bug: usize,
    pub skipped_disabled: usize,
    pub skipped_aborted: usize,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlowTestReport {
    pub name: String,
    pub duration_ms: u64,
}

/// Convert a [`RunOutcome`] into a serializable [`RunReport`], computing
/// the slowest-N summary along the way.
pub fn to_report(outcome: &RunOutcome, requested_groups: &[String]) -> RunReport {
    let mut slow = SlowTests::default();
    for result in &outcome.results {
        if result.status != CaseStatus::Skipped {
            slow.record(&result.name, result.duration);
        }
    }

    let results = outcome
        .results
        .iter()
        .enumerate()
        .map(|(i, result)| CaseReport {
            order: i + 1,
            name: result.name.clone(),
            class: result.class.clone(),
            status: result.status.to_string(),
            duration_ms: result.duration.as_millis() as u64,
            error: result.error.as_ref().map(|e| ErrorReport {
                kind: e.kind.to_string(),
                message: e.message.clone(),
                detail: e.detail.clone(),
            }),
            skip_reason: result.skip_reason.as_ref().map(ToString::to_string),
        })
        .collect();

    RunReport {
        run: RunMetadata {
            duration_ms: outcome.total_duration.as_millis() as u64,
            requested_groups: requested_groups.to_vec(),
            aborted: outcome.aborted.clone(),
        },
        results,
        summary: SummaryReport {
            total: outcome.summary.total,
            passed: outcome.summary.passed,
            failed: outcome.summary.failed,
            errors: outcome.summary.errors,
            skipped_upstream: outcome.summary.skipped_upstream,
            skipped_known_bug: outcome.summary.skipped_known_bug,
            skipped_disabled: outcome.summary.skipped_disabled,
            skipped_aborted: outcome.summary.skipped_aborted,
            success: outcome.summary.success(),
        },
        slowest: slow
            .into_sorted()
            .into_iter()
            .map(|(name, duration)| SlowTestReport {
                name,
                duration_ms: duration.as_millis() as u64,
            })
            .collect(),
    }
}

/// Emit a run report as YAML.
pub fn emit_yaml(report: &RunReport) -> String {
    serde_yaml::to_string(report).unwrap_or_else(|e| format!("# error serializing report: {e}"))
}

/// Emit a run report as pretty JSON.
pub fn emit_json(report: &RunReport) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!("{{ \"error\": \"{e}\" }}"))
}
