use std::collections::HashMap;

use serde_json::Value;

use crate::runner::result::{CaseError, CaseErrorKind};
use crate::users::UserRegistry;

/// Mutable state threaded through every case in an execution plan.
///
/// Designated setup cases populate it (instance ids, credentials, host
/// names), dependents read it. Created once per run; there is no other
/// channel between cases.
pub struct RunContext {
    values: HashMap<String, Value>,
    pub users: UserRegistry,
}

impl RunContext {
    pub fn new(users: UserRegistry) -> Self {
        Self {
            values: HashMap::new(),
            users,
        }
    }

    /// Record a value under a dotted key, e.g. `instance.id`.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fetch a value a dependent case cannot proceed without.
    ///
    /// # Errors
    ///
    /// Returns a [`CaseErrorKind::MissingContextValue`] error naming the
    /// key, which records the case as errored rather than panicking.
    pub fn require(&self, key: &str) -> Result<&Value, CaseError> {
        self.values.get(key).ok_or_else(|| CaseError {
            kind: CaseErrorKind::MissingContextValue,
            message: format!("no upstream case recorded \"{key}\""),
            detail: None,
        })
    }

    /// [`require`](Self::require) for string-typed values.
    ///
    /// # Errors
    ///
    /// Errors if the key is absent or holds a non-string value.
    pub fn require_str(&self, key: &str) -> Result<&str, CaseError> {
        self.require(key)?.as_str().ok_or_else(|| CaseError {
            kind: CaseErrorKind::MissingContextValue,
            message: format!("context value \"{key}\" is not a string"),
            detail: None,
        })
    }

    /// [`require`](Self::require) for integer-typed values.
    ///
    /// # Errors
    ///
    /// Errors if the key is absent or holds a non-integer value.
    pub fn require_u64(&self, key: &str) -> Result<u64, CaseError> {
        self.require(key)?.as_u64().ok_or_else(|| CaseError {
            kind: CaseErrorKind::MissingContextValue,
            message: format!("context value \"{key}\" is not an integer"),
            detail: None,
        })
    }
}
