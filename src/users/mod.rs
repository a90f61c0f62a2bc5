use std::fmt;

use serde::Deserialize;

/// Capabilities a test needs from the identity it runs as.
///
/// Tests state what kind of user they need (admin or not, which services
/// the account must be enrolled in) instead of naming exact identities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Requirements {
    pub is_admin: bool,
    #[serde(default = "Requirements::default_services")]
    pub services: Vec<String>,
}

impl Requirements {
    pub fn new(is_admin: bool) -> Self {
        Self {
            is_admin,
            services: Self::default_services(),
        }
    }

    pub fn with_services(is_admin: bool, services: &[&str]) -> Self {
        Self {
            is_admin,
            services: services.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    fn default_services() -> Vec<String> {
        vec!["dbaas".to_owned()]
    }

    /// True if an identity with these capabilities can serve a test that
    /// asked for `requested`: admin status matches exactly and every
    /// requested service is present.
    pub fn satisfies(&self, requested: &Requirements) -> bool {
        if requested.is_admin != self.is_admin {
            return false;
        }
        requested
            .services
            .iter()
            .all(|service| self.services.contains(service))
    }
}

impl fmt::Display for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "is_admin={}, services={:?}", self.is_admin, self.services)
    }
}

/// A test identity: credentials plus the capabilities it carries.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceUser {
    pub auth_user: String,
    pub auth_key: String,
    #[serde(default)]
    pub tenant: Option<String>,
    pub requirements: Requirements,
    #[serde(skip)]
    pub usage_count: u32,
}

/// No registered identity satisfies what the test asked for. A gap in the
/// pool configuration, not a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsatisfiableRequirements {
    pub message: String,
}

impl fmt::Display for UnsatisfiableRequirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UnsatisfiableRequirements {}

/// Pool of test identities with selection by capability requirements.
///
/// Selection picks the least-used matching identity so repeated runs spread
/// load across the pool instead of hammering one account.
#[derive(Debug)]
pub struct UserRegistry {
    users: Vec<ServiceUser>,
}

impl UserRegistry {
    pub fn new(users: Vec<ServiceUser>) -> Self {
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> &[ServiceUser] {
        &self.users
    }

    /// Select the least-used identity satisfying `requirements`, skipping
    /// names in `exclude`. Increments the chosen identity's usage count.
    ///
    /// Ties break on pool order, so against a homogeneous pool repeated
    /// calls rotate through every member before reusing one.
    ///
    /// # Errors
    ///
    /// Returns [`UnsatisfiableRequirements`] when no identity matches.
    pub fn find_user(
        &mut self,
        requirements: &Requirements,
        exclude: &[&str],
    ) -> Result<&ServiceUser, UnsatisfiableRequirements> {
        let chosen = self
            .users
            .iter()
            .enumerate()
            .filter(|(_, user)| {
                !exclude.contains(&user.auth_user.as_str())
                    && user.requirements.satisfies(requirements)
            })
            .min_by_key(|(_, user)| user.usage_count)
            .map(|(index, _)| index);

        match chosen {
            Some(index) => {
                self.users[index].usage_count += 1;
                Ok(&self.users[index])
            }
            None => Err(UnsatisfiableRequirements {
                message: format!(
                    "the user pool lacks an identity meeting these requirements: {requirements}"
                ),
            }),
        }
    }

    /// Direct lookup by name. Increments the usage count, like any other
    /// selection.
    ///
    /// # Errors
    ///
    /// Returns [`UnsatisfiableRequirements`] when the name is absent.
    pub fn find_user_by_name(
        &mut self,
        name: &str,
    ) -> Result<&ServiceUser, UnsatisfiableRequirements> {
        let chosen = self.users.iter().position(|user| user.auth_user == name);
        match chosen {
            Some(index) => {
                self.users[index].usage_count += 1;
                Ok(&self.users[index])
            }
            None => Err(UnsatisfiableRequirements {
                message: format!("no identity named \"{name}\" in the user pool"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, is_admin: bool, services: &[&str]) -> ServiceUser {
        ServiceUser {
            auth_user: name.to_owned(),
            auth_key: format!("{name}-secret"),
            tenant: None,
            requirements: Requirements::with_services(is_admin, services),
            usage_count: 0,
        }
    }

    fn pool() -> UserRegistry {
        UserRegistry::new(vec![
            user("admin", true, &["dbaas"]),
            user("anne", true, &["dbaas"]),
            user("dan", true, &["dbaas", "compute"]),
            user("tim", false, &["dbaas"]),
            user("mike", false, &["dbaas"]),
        ])
    }

    #[test]
    fn usage_counts_start_at_zero() {
        let registry = pool();
        assert!(registry.users().iter().all(|u| u.usage_count == 0));
    }

    #[test]
    fn selection_spreads_load_across_matching_users() {
        let mut registry = pool();
        let admin_reqs = Requirements::new(true);
        for _ in 0..12 {
            registry.find_user(&admin_reqs, &[]).unwrap();
        }
        // 12 selections over 3 admins: exactly 4 each.
        let counts: Vec<u32> = registry
            .users()
            .iter()
            .filter(|u| u.requirements.is_admin)
            .map(|u| u.usage_count)
            .collect();
        assert_eq!(counts, vec![4, 4, 4]);
    }

    #[test]
    fn selection_counts_never_diverge_by_more_than_one() {
        let mut registry = pool();
        let reqs = Requirements::new(false);
        for _ in 0..7 {
            registry.find_user(&reqs, &[]).unwrap();
        }
        let counts: Vec<u32> = registry
            .users()
            .iter()
            .filter(|u| !u.requirements.is_admin)
            .map(|u| u.usage_count)
            .collect();
        let max = *counts.iter().max().unwrap();
        let min = *counts.iter().min().unwrap();
        assert!(max - min <= 1, "counts diverged: {counts:?}");
    }

    #[test]
    fn admin_flag_must_match_exactly() {
        let mut registry = pool();
        let chosen = registry.find_user(&Requirements::new(false), &[]).unwrap();
        assert!(!chosen.requirements.is_admin);
    }

    #[test]
    fn service_requirements_narrow_the_pool() {
        let mut registry = pool();
        let reqs = Requirements::with_services(true, &["dbaas", "compute"]);
        let chosen = registry.find_user(&reqs, &[]).unwrap();
        assert_eq!(chosen.auth_user, "dan");
    }

    #[test]
    fn unsatisfiable_requirements_error_not_silent() {
        let mut registry = pool();
        let reqs = Requirements::with_services(false, &["volume"]);
        let err = registry.find_user(&reqs, &[]).unwrap_err();
        assert!(err.message.contains("volume"));
    }

    #[test]
    fn exclusion_list_is_honored() {
        let mut registry = pool();
        let reqs = Requirements::new(false);
        let chosen = registry.find_user(&reqs, &["tim"]).unwrap();
        assert_eq!(chosen.auth_user, "mike");
    }

    #[test]
    fn excluding_every_candidate_errors() {
        let mut registry = pool();
        let reqs = Requirements::new(false);
        let err = registry.find_user(&reqs, &["tim", "mike"]).unwrap_err();
        assert!(err.message.contains("requirements"));
    }

    #[test]
    fn find_by_name_is_a_direct_lookup() {
        let mut registry = pool();
        let chosen = registry.find_user_by_name("anne").unwrap();
        assert_eq!(chosen.auth_user, "anne");
        assert_eq!(chosen.usage_count, 1);
    }

    #[test]
    fn find_by_unknown_name_errors() {
        let mut registry = pool();
        let err = registry.find_user_by_name("nobody").unwrap_err();
        assert!(err.message.contains("nobody"));
    }

    #[test]
    fn satisfies_requires_every_requested_service() {
        let broad = Requirements::with_services(true, &["dbaas", "compute", "volume"]);
        let narrow = Requirements::with_services(true, &["compute"]);
        assert!(broad.satisfies(&narrow));
        assert!(!narrow.satisfies(&broad));
    }

    #[test]
    fn requirements_display_names_both_fields() {
        let reqs = Requirements::new(true);
        let text = reqs.to_string();
        assert!(text.contains("is_admin=true"));
        assert!(text.contains("dbaas"));
    }
}
