//! Check helpers for test bodies.
//!
//! Unlike `assert!`, these produce structured case failures the runner
//! records (and the known-bug table can match on) instead of panicking.

use std::fmt::Debug;

use crate::runner::result::CaseError;

/// Unconditional failure.
pub fn fail(message: impl Into<String>) -> CaseError {
    CaseError::assertion(message)
}

/// Check a condition.
///
/// # Errors
///
/// Returns an assertion failure with `message` when the condition is
/// false.
pub fn check_true(condition: bool, message: impl Into<String>) -> Result<(), CaseError> {
    if condition {
        Ok(())
    } else {
        Err(CaseError::assertion(message))
    }
}

/// Check a condition is false.
///
/// # Errors
///
/// Returns an assertion failure with `message` when the condition is
/// true.
pub fn check_false(condition: bool, message: impl Into<String>) -> Result<(), CaseError> {
    check_true(!condition, message)
}

/// Check two values for equality, naming what was compared.
///
/// # Errors
///
/// Returns an assertion failure quoting both values.
pub fn check_equal<T: PartialEq + Debug>(
    actual: T,
    expected: T,
    what: &str,
) -> Result<(), CaseError> {
    if actual == expected {
        Ok(())
    } else {
        Err(CaseError::assertion(format!(
            "{what}: expected {expected:?}, got {actual:?}"
        )))
    }
}

/// Check that text contains a fragment.
///
/// # Errors
///
/// Returns an assertion failure quoting the haystack.
pub fn check_contains(haystack: &str, needle: &str, what: &str) -> Result<(), CaseError> {
    if haystack.contains(needle) {
        Ok(())
    } else {
        Err(CaseError::assertion(format!(
            "{what}: expected to find \"{needle}\" in \"{haystack}\""
        )))
    }
}
