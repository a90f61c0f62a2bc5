use std::fmt;
use std::time::Duration;

use crate::poll::PollTimeout;
use crate::users::UnsatisfiableRequirements;

/// The final recorded state of a single test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a case was skipped rather than run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A declared dependency failed (or was itself skipped for one).
    UpstreamFailure { dependency: String },
    /// The failure matched a registered known bug.
    KnownBug { tracker_id: String },
    /// The entry was registered with enabled=false.
    Disabled,
    /// The run was aborted before this case was reached.
    Aborted { cause: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamFailure { dependency } => {
                write!(f, "upstream failure in {dependency}")
            }
            Self::KnownBug { tracker_id } => write!(f, "known bug {tracker_id}"),
            Self::Disabled => write!(f, "disabled"),
            Self::Aborted { cause } => write!(f, "aborted: {cause}"),
        }
    }
}

/// Result of one plan step: a case or a class hook.
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// Qualified name, e.g. `CreateInstance.wait_for_active`.
    pub name: String,
    pub class: Option<String>,
    pub status: CaseStatus,
    pub duration: Duration,
    pub error: Option<CaseError>,
    pub skip_reason: Option<SkipReason>,
}

impl CaseResult {
    pub fn passed(name: &str, class: Option<&str>, duration: Duration) -> Self {
        Self {
            name: name.to_owned(),
            class: class.map(str::to_owned),
            status: CaseStatus::Passed,
            duration,
            error: None,
            skip_reason: None,
        }
    }

    /// Record a case that ran and did not pass. Assertion failures count
    /// as failed, everything else as error.
    pub fn failed(name: &str, class: Option<&str>, duration: Duration, error: CaseError) -> Self {
        let status = match error.kind {
            CaseErrorKind::AssertionFailed => CaseStatus::Failed,
            _ => CaseStatus::Error,
        };
        Self {
            name: name.to_owned(),
            class: class.map(str::to_owned),
            status,
            duration,
            error: Some(error),
            skip_reason: None,
        }
    }

    pub fn skipped(name: &str, class: Option<&str>, reason: SkipReason) -> Self {
        Self {
            name: name.to_owned(),
            class: class.map(str::to_owned),
            status: CaseStatus::Skipped,
            duration: Duration::ZERO,
            error: None,
            skip_reason: Some(reason),
        }
    }

    /// True for states that make the overall run unsuccessful.
    pub fn is_failure(&self) -> bool {
        matches!(self.status, CaseStatus::Failed | CaseStatus::Error)
    }
}

/// Error detail for a failed or errored case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseError {
    pub kind: CaseErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl CaseError {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            kind: CaseErrorKind::AssertionFailed,
            message: message.into(),
            detail: None,
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: CaseErrorKind::RuntimeError,
            message: message.into(),
            detail: None,
        }
    }
}

impl fmt::Display for CaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CaseError {}

/// Classification of case errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseErrorKind {
    /// A check did not hold.
    AssertionFailed,
    /// A bounded wait's condition never became true.
    PollTimedOut,
    /// The class's scoped setup failed before this case could run.
    SetupFailed,
    /// Unexpected panic or infrastructure failure during execution.
    RuntimeError,
    /// No test identity satisfied the requested requirements.
    UnsatisfiableRequirements,
    /// A required context value was never recorded by an upstream case.
    MissingContextValue,
    /// A registered known bug's expected error text did not appear.
    KnownBugMismatch,
    /// A registered known bug no longer reproduces.
    StaleKnownBug,
}

impl fmt::Display for CaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssertionFailed => write!(f, "assertion failed"),
            Self::PollTimedOut => write!(f, "poll timed out"),
            Self::SetupFailed => write!(f, "setup failed"),
            Self::RuntimeError => write!(f, "runtime error"),
            Self::UnsatisfiableRequirements => write!(f, "unsatisfiable requirements"),
            Self::MissingContextValue => write!(f, "missing context value"),
            Self::KnownBugMismatch => write!(f, "known bug mismatch"),
            Self::StaleKnownBug => write!(f, "stale known bug"),
        }
    }
}

impl From<PollTimeout> for CaseError {
    fn from(timeout: PollTimeout) -> Self {
        Self {
            kind: CaseErrorKind::PollTimedOut,
            message: timeout.to_string(),
            detail: None,
        }
    }
}

impl From<UnsatisfiableRequirements> for CaseError {
    fn from(err: UnsatisfiableRequirements) -> Self {
        Self {
            kind: CaseErrorKind::UnsatisfiableRequirements,
            message: err.message,
            detail: None,
        }
    }
}

/// Summary statistics for a run, separating the skip causes operators
/// read release-readiness from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped_upstream: usize,
    pub skipped_known_bug: usize,
    pub skipped_disabled: usize,
    pub skipped_aborted: usize,
}

impl RunSummary {
    /// Whether the run was fully successful. Skips of any flavor do not
    /// count against it.
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    pub fn skipped(&self) -> usize {
        self.skipped_upstream
            + self.skipped_known_bug
            + self.skipped_disabled
            + self.skipped_aborted
    }

    pub fn from_results(results: &[CaseResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for r in results {
            match r.status {
                CaseStatus::Passed => summary.passed += 1,
                CaseStatus::Failed => summary.failed += 1,
                CaseStatus::Error => summary.errors += 1,
                CaseStatus::Skipped => match r.skip_reason {
                    Some(SkipReason::UpstreamFailure { .. }) => summary.skipped_upstream += 1,
                    Some(SkipReason::KnownBug { .. }) => summary.skipped_known_bug += 1,
                    Some(SkipReason::Disabled) => summary.skipped_disabled += 1,
                    Some(SkipReason::Aborted { .. }) | None => summary.skipped_aborted += 1,
                },
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_constructor() {
        let result = CaseResult::passed(
            "wait_for_active",
            Some("CreateInstance"),
            Duration::from_millis(120),
        );
        assert_eq!(result.name, "wait_for_active");
        assert_eq!(result.class.as_deref(), Some("CreateInstance"));
        assert_eq!(result.status, CaseStatus::Passed);
        assert!(result.error.is_none());
        assert!(!result.is_failure());
    }

    #[test]
    fn assertion_failures_record_as_failed() {
        let result = CaseResult::failed(
            "status_is_build",
            None,
            Duration::from_millis(10),
            CaseError::assertion("expected BUILD, got ACTIVE"),
        );
        assert_eq!(result.status, CaseStatus::Failed);
        assert!(result.is_failure());
    }

    #[test]
    fn non_assertion_errors_record_as_error() {
        let result = CaseResult::failed(
            "wait_for_active",
            None,
            Duration::from_millis(10),
            CaseError::runtime("connection reset"),
        );
        assert_eq!(result.status, CaseStatus::Error);
    }

    #[test]
    fn poll_timeout_records_as_error() {
        let timeout = PollTimeout {
            elapsed: Duration::from_secs(61),
            timeout: Duration::from_secs(60),
            attempts: 61,
        };
        let error: CaseError = timeout.into();
        assert_eq!(error.kind, CaseErrorKind::PollTimedOut);
        let result = CaseResult::failed("wait", None, Duration::from_secs(61), error);
        assert_eq!(result.status, CaseStatus::Error);
    }

    #[test]
    fn skipped_has_zero_duration() {
        let result = CaseResult::skipped(
            "delete_instance",
            Some("DeleteInstance"),
            SkipReason::UpstreamFailure {
                dependency: "CreateInstance.wait_for_active".into(),
            },
        );
        assert_eq!(result.duration, Duration::ZERO);
        assert_eq!(result.status, CaseStatus::Skipped);
        assert!(!result.is_failure());
    }

    #[test]
    fn skip_reason_display() {
        let upstream = SkipReason::UpstreamFailure {
            dependency: "t1".into(),
        };
        assert_eq!(upstream.to_string(), "upstream failure in t1");
        let bug = SkipReason::KnownBug {
            tracker_id: "bug/912387".into(),
        };
        assert_eq!(bug.to_string(), "known bug bug/912387");
        assert_eq!(SkipReason::Disabled.to_string(), "disabled");
    }

    #[test]
    fn case_error_display() {
        let error = CaseError {
            kind: CaseErrorKind::AssertionFailed,
            message: "expected 2 databases, found 1".into(),
            detail: None,
        };
        assert_eq!(
            error.to_string(),
            "assertion failed: expected 2 databases, found 1"
        );
    }

    #[test]
    fn requirements_error_converts() {
        let err = UnsatisfiableRequirements {
            message: "no admin available".into(),
        };
        let case_error: CaseError = err.into();
        assert_eq!(case_error.kind, CaseErrorKind::UnsatisfiableRequirements);
        assert_eq!(case_error.message, "no admin available");
    }

    #[test]
    fn summary_separates_skip_causes() {
        let results = vec![
            CaseResult::passed("a", None, Duration::from_millis(5)),
            CaseResult::failed(
                "b",
                None,
                Duration::from_millis(5),
                CaseError::assertion("nope"),
            ),
            CaseResult::skipped(
                "c",
                None,
                SkipReason::UpstreamFailure {
                    dependency: "b".into(),
                },
            ),
            CaseResult::skipped(
                "d",
                None,
                SkipReason::KnownBug {
                    tracker_id: "bug/1".into(),
                },
            ),
            CaseResult::skipped("e", None, SkipReason::Disabled),
        ];
        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped_upstream, 1);
        assert_eq!(summary.skipped_known_bug, 1);
        assert_eq!(summary.skipped_disabled, 1);
        assert_eq!(summary.skipped(), 3);
        assert!(!summary.success());
    }

    #[test]
    fn summary_success_ignores_skips() {
        let results = vec![
            CaseResult::passed("a", None, Duration::from_millis(5)),
            CaseResult::skipped(
                "b",
                None,
                SkipReason::KnownBug {
                    tracker_id: "bug/2".into(),
                },
            ),
        ];
        assert!(RunSummary::from_results(&results).success());
    }
}
