use std::collections::HashMap;

use serde::Deserialize;

use crate::runner::result::{CaseError, CaseErrorKind, CaseStatus};

/// A tracked, expected failure: tests matching it are reported as skips
/// instead of failures until the bug is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnownBugEntry {
    pub tracker_id: String,
    /// The failure only counts as this bug if its text contains this.
    pub error_substring: String,
}

/// Lookup table keyed by qualified test name.
#[derive(Debug, Clone, Default)]
pub struct KnownBugTable {
    entries: HashMap<String, KnownBugEntry>,
}

/// What the interception decided about an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// The failure matched the registered symptom: record a skip.
    ConvertToSkip { tracker_id: String },
    /// The test failed with a different symptom than registered: the bug
    /// changed shape, escalate so an investigator looks.
    Escalate { error: CaseError },
}

impl KnownBugTable {
    pub fn new(entries: HashMap<String, KnownBugEntry>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, test_name: impl Into<String>, entry: KnownBugEntry) {
        self.entries.insert(test_name.into(), entry);
    }

    pub fn get(&self, test_name: &str) -> Option<&KnownBugEntry> {
        self.entries.get(test_name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &KnownBugEntry)> {
        self.entries.iter()
    }

    /// Consult the table for a case's outcome before it is recorded.
    ///
    /// Runs uniformly for every outcome:
    /// - pass with a registered entry → escalated error (the bug no
    ///   longer reproduces; the entry is stale);
    /// - fail/error whose text contains the registered substring →
    ///   converted to a skip carrying the tracker id;
    /// - fail/error without the substring → escalated error naming the
    ///   mismatch.
    ///
    /// Returns `None` when the test has no entry, or for outcomes that
    /// were already skips.
    pub fn intercept(
        &self,
        test_name: &str,
        status: &CaseStatus,
        error: Option<&CaseError>,
    ) -> Option<Interception> {
        let entry = self.entries.get(test_name)?;
        match status {
            CaseStatus::Skipped => None,
            CaseStatus::Passed => Some(Interception::Escalate {
                error: CaseError {
                    kind: CaseErrorKind::StaleKnownBug,
                    message: format!(
                        "\"{test_name}\" passes but is registered as known bug {}; \
                         remove the stale entry",
                        entry.tracker_id
                    ),
                    detail: None,
                },
            }),
            CaseStatus::Failed | CaseStatus::Error => {
                let text = error
                    .map(|e| format!("{}: {}", e.message, e.detail.as_deref().unwrap_or("")))
                    .unwrap_or_default();
                if text.contains(&entry.error_substring) {
                    Some(Interception::ConvertToSkip {
                        tracker_id: entry.tracker_id.clone(),
                    })
                } else {
                    Some(Interception::Escalate {
                        error: CaseError {
                            kind: CaseErrorKind::KnownBugMismatch,
                            message: format!(
                                "\"{test_name}\" is registered as known bug {} with expected \
                                 error text \"{}\", but the failure read differently; if the \
                                 bug changed or was fixed, update the entry",
                                entry.tracker_id, entry.error_substring
                            ),
                            detail: Some(text),
                        },
                    })
                }
            }
        }
    }
}
