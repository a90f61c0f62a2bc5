use crate::registry::entry::{CaseFn, ClassHook, DependencyTarget, Entry, TestCase, TestClass};
use crate::runner::context::RunContext;
use crate::runner::result::CaseError;

/// Central collection of everything test modules register.
///
/// Registration order is meaningful: when no dependency edge constrains
/// two entries, the planner keeps them in the order they were registered
/// here, so reports read in declaration order.
#[derive(Default)]
pub struct TestRegistry {
    entries: Vec<Entry>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_case(&mut self, case: TestCase) {
        self.entries.push(Entry::Case(case));
    }

    pub fn register_class(&mut self, class: TestClass) {
        self.entries.push(Entry::Class(class));
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every group label appearing anywhere in the registry.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |label: &String| {
            if !names.contains(label) {
                names.push(label.clone());
            }
        };
        for entry in &self.entries {
            match entry {
                Entry::Case(case) => case.groups.iter().for_each(&mut push),
                Entry::Class(class) => {
                    class.groups.iter().for_each(&mut push);
                    for case in &class.cases {
                        case.groups.iter().for_each(&mut push);
                    }
                }
            }
        }
        names
    }
}

/// Builds a [`TestCase`] descriptor.
pub struct CaseBuilder {
    name: String,
    groups: Vec<String>,
    depends_on: Vec<DependencyTarget>,
    enabled: bool,
    always_run: bool,
}

impl CaseBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            depends_on: Vec::new(),
            enabled: true,
            always_run: false,
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn depends_on_case(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(DependencyTarget::Case(name.into()));
        self
    }

    pub fn depends_on_class(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(DependencyTarget::Class(name.into()));
        self
    }

    pub fn depends_on_group(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(DependencyTarget::Group(name.into()));
        self
    }

    /// Gate the case on a condition computed at registration time, e.g.
    /// "only when the deployment under test supports volumes".
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Mark as teardown-like: runs even after failures or an abort.
    pub fn always_run(mut self) -> Self {
        self.always_run = true;
        self
    }

    pub fn run<F>(self, body: F) -> TestCase
    where
        F: Fn(&mut RunContext) -> Result<(), CaseError> + 'static,
    {
        TestCase {
            name: self.name,
            groups: self.groups,
            depends_on: self.depends_on,
            enabled: self.enabled,
            always_run: self.always_run,
            run: Box::new(body),
        }
    }
}

/// Builds a [`TestClass`] descriptor with hooks and member cases.
pub struct ClassBuilder {
    name: String,
    groups: Vec<String>,
    depends_on: Vec<DependencyTarget>,
    enabled: bool,
    before: Option<CaseFn>,
    after: Option<ClassHook>,
    cases: Vec<TestCase>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            depends_on: Vec::new(),
            enabled: true,
            before: None,
            after: None,
            cases: Vec::new(),
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn depends_on_case(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(DependencyTarget::Case(name.into()));
        self
    }

    pub fn depends_on_class(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(DependencyTarget::Class(name.into()));
        self
    }

    pub fn depends_on_group(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(DependencyTarget::Group(name.into()));
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Scoped setup, run once before the first member case. A failure
    /// here records every member as errored.
    pub fn before<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut RunContext) -> Result<(), CaseError> + 'static,
    {
        self.before = Some(Box::new(body));
        self
    }

    /// Scoped teardown, run once after the last member case.
    pub fn after<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut RunContext) -> Result<(), CaseError> + 'static,
    {
        self.after = Some(ClassHook {
            run: Box::new(body),
            always_run: false,
        });
        self
    }

    /// Teardown that must run no matter what happened before it.
    pub fn after_always<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut RunContext) -> Result<(), CaseError> + 'static,
    {
        self.after = Some(ClassHook {
            run: Box::new(body),
            always_run: true,
        });
        self
    }

    /// Add a member case. Member `depends_on_case` targets may name
    /// sibling cases by their short name.
    pub fn case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn build(self) -> TestClass {
        TestClass {
            name: self.name,
            groups: self.groups,
            depends_on: self.depends_on,
            enabled: self.enabled,
            before: self.before,
            after: self.after,
            cases: self.cases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut RunContext) -> Result<(), CaseError> {
        Ok(())
    }

    #[test]
    fn case_builder_collects_metadata() {
        let case = CaseBuilder::new("restart_guest")
            .group("dbaas.guest")
            .group("dbaas.guest.restart")
            .depends_on_group("dbaas.guest.initialize")
            .depends_on_case("verify_guest_started")
            .run(noop);
        assert_eq!(case.name, "restart_guest");
        assert_eq!(case.groups, vec!["dbaas.guest", "dbaas.guest.restart"]);
        assert_eq!(case.depends_on.len(), 2);
        assert!(case.enabled);
        assert!(!case.always_run);
    }

    #[test]
    fn case_builder_flags() {
        let case = CaseBuilder::new("delete_everything")
            .enabled(false)
            .always_run()
            .run(noop);
        assert!(!case.enabled);
        assert!(case.always_run);
    }

    #[test]
    fn class_builder_owns_members_and_hooks() {
        let class = ClassBuilder::new("CreateInstance")
            .group("dbaas.guest.initialize")
            .depends_on_group("services.initialize")
            .before(noop)
            .after_always(noop)
            .case(CaseBuilder::new("create").run(noop))
            .case(
                CaseBuilder::new("wait_for_active")
                    .depends_on_case("create")
                    .run(noop),
            )
            .build();
        assert_eq!(class.name, "CreateInstance");
        assert_eq!(class.cases.len(), 2);
        assert!(class.before.is_some());
        assert!(class.after.as_ref().unwrap().always_run);
        assert_eq!(class.qualified("create"), "CreateInstance.create");
        assert_eq!(class.before_step_name(), "CreateInstance.before_class");
        assert_eq!(class.after_step_name(), "CreateInstance.after_class");
    }

    #[test]
    fn registry_preserves_registration_order() {
        let mut registry = TestRegistry::new();
        registry.register_case(CaseBuilder::new("first").run(noop));
        registry.register_class(ClassBuilder::new("Second").build());
        registry.register_case(CaseBuilder::new("third").run(noop));
        let names: Vec<&str> = registry.entries().iter().map(Entry::name).collect();
        assert_eq!(names, vec!["first", "Second", "third"]);
    }

    #[test]
    fn group_membership_includes_member_cases() {
        let class = ClassBuilder::new("Databases")
            .group("dbaas.api.databases")
            .case(CaseBuilder::new("create").group("smoke").run(noop))
            .build();
        let entry = Entry::Class(class);
        assert!(entry.in_group("dbaas.api.databases"));
        assert!(entry.in_group("smoke"));
        assert!(!entry.in_group("dbaas.api.users"));
    }

    #[test]
    fn registry_group_names_deduplicate() {
        let mut registry = TestRegistry::new();
        registry.register_case(CaseBuilder::new("a").group("smoke").run(noop));
        registry.register_case(CaseBuilder::new("b").group("smoke").group("slow").run(noop));
        assert_eq!(registry.group_names(), vec!["smoke", "slow"]);
    }
}
