//! External configuration: the known-bug table and the test-identity
//! pool, both YAML.

use std::collections::HashMap;
use std::path::Path;

use crate::runner::known_bugs::{KnownBugEntry, KnownBugTable};
use crate::users::{Requirements, ServiceUser, UserRegistry};

/// Load a known-bug table.
///
/// The format maps qualified test names to their tracked excuse:
///
/// ```yaml
/// CreateInstance.wait_for_active:
///   tracker_id: bug/912387
///   error_substring: stuck in BUILD
/// ```
///
/// # Errors
///
/// Returns a message naming the file and cause on read or parse failure.
pub fn load_known_bugs(path: &Path) -> Result<KnownBugTable, String> {
    let input = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let entries: HashMap<String, KnownBugEntry> = serde_yaml::from_str(&input)
        .map_err(|e| format!("failed to parse known-bug table {}: {e}", path.display()))?;
    Ok(KnownBugTable::new(entries))
}

/// Load a user pool.
///
/// The format is a list of identities with their capabilities:
///
/// ```yaml
/// - auth_user: admin
///   auth_key: admin-secret
///   tenant: "2500"
///   requirements:
///     is_admin: true
///     services: [dbaas]
/// ```
///
/// # Errors
///
/// Returns a message naming the file and cause on read or parse failure,
/// or if the pool is empty.
pub fn load_user_pool(path: &Path) -> Result<UserRegistry, String> {
    let input = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let users: Vec<ServiceUser> = serde_yaml::from_str(&input)
        .map_err(|e| format!("failed to parse user pool {}: {e}", path.display()))?;
    if users.is_empty() {
        return Err(format!("user pool {} defines no identities", path.display()));
    }
    Ok(UserRegistry::new(users))
}

/// The pool used when no user file is supplied: enough identities for
/// the built-in suite against a fake deployment.
pub fn default_user_pool() -> UserRegistry {
    let user = |name: &str, is_admin: bool| ServiceUser {
        auth_user: name.to_owned(),
        auth_key: format!("{name}-key"),
        tenant: Some("demo".to_owned()),
        requirements: Requirements::new(is_admin),
        usage_count: 0,
    };
    UserRegistry::new(vec![
        user("admin", true),
        user("alice", false),
        user("bob", false),
    ])
}
