use std::fmt;

use crate::runner::context::RunContext;
use crate::runner::result::CaseError;

/// The body of a test case or class hook.
pub type CaseFn = Box<dyn Fn(&mut RunContext) -> Result<(), CaseError>>;

/// What a dependency declaration points at.
///
/// A group target means "all tests reachable through that label"; a class
/// target means every case (and scoped setup) of that class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyTarget {
    Case(String),
    Class(String),
    Group(String),
}

impl DependencyTarget {
    pub fn name(&self) -> &str {
        match self {
            Self::Case(name) | Self::Class(name) | Self::Group(name) => name,
        }
    }
}

impl fmt::Display for DependencyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Case(name) => write!(f, "case {name}"),
            Self::Class(name) => write!(f, "class {name}"),
            Self::Group(name) => write!(f, "group {name}"),
        }
    }
}

/// A registered test case: a named body with groups, dependencies, and
/// scheduling flags. Immutable once registered.
pub struct TestCase {
    pub name: String,
    pub groups: Vec<String>,
    pub depends_on: Vec<DependencyTarget>,
    /// Disabled cases stay in the plan but are recorded as skipped.
    pub enabled: bool,
    /// Teardown-like cases that must execute even after failures or an
    /// aborted run.
    pub always_run: bool,
    pub run: CaseFn,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .field("depends_on", &self.depends_on)
            .field("enabled", &self.enabled)
            .field("always_run", &self.always_run)
            .finish_non_exhaustive()
    }
}

/// A scoped hook attached to a class.
pub struct ClassHook {
    pub run: CaseFn,
    /// Always-run hooks execute even when setup or members failed, and
    /// even when the run aborts early.
    pub always_run: bool,
}

/// A named grouping of cases with scoped setup/teardown.
///
/// The class is the scheduling unit: its steps stay contiguous in the
/// plan, and dependencies declared at class level apply to every member.
pub struct TestClass {
    pub name: String,
    pub groups: Vec<String>,
    pub depends_on: Vec<DependencyTarget>,
    pub enabled: bool,
    pub before: Option<CaseFn>,
    pub after: Option<ClassHook>,
    pub cases: Vec<TestCase>,
}

impl TestClass {
    /// Qualified name of a member case, as used in plans, reports, and
    /// the known-bug table.
    pub fn qualified(&self, case_name: &str) -> String {
        format!("{}.{case_name}", self.name)
    }

    pub fn before_step_name(&self) -> String {
        format!("{}.before_class", self.name)
    }

    pub fn after_step_name(&self) -> String {
        format!("{}.after_class", self.name)
    }
}

impl fmt::Debug for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClass")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .field("depends_on", &self.depends_on)
            .field("enabled", &self.enabled)
            .field("cases", &self.cases)
            .finish_non_exhaustive()
    }
}

/// One registration: a free-standing case or a class.
#[derive(Debug)]
pub enum Entry {
    Case(TestCase),
    Class(TestClass),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Self::Case(case) => &case.name,
            Self::Class(class) => &class.name,
        }
    }

    pub fn depends_on(&self) -> &[DependencyTarget] {
        match self {
            Self::Case(case) => &case.depends_on,
            Self::Class(class) => &class.depends_on,
        }
    }

    /// True if the entry itself, or any member case, carries the label.
    pub fn in_group(&self, group: &str) -> bool {
        match self {
            Self::Case(case) => case.groups.iter().any(|g| g == group),
            Self::Class(class) => {
                class.groups.iter().any(|g| g == group)
                    || class
                        .cases
                        .iter()
                        .any(|case| case.groups.iter().any(|g| g == group))
            }
        }
    }
}
