use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;

use crate::graph::{DependencyCycle, UnknownDependency, build, dependency_closure, stable_topo};
use crate::plan::types::{ExecutionPlan, PlanMetadata, PlanStep, StepKind};
use crate::registry::{DependencyTarget, Entry, TestClass, TestRegistry};

/// Configuration-level failure while deriving an execution plan. Raised
/// before any test executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    UnknownDependency(UnknownDependency),
    DependencyCycle(DependencyCycle),
    /// A requested group label matches no registered test.
    UnknownGroup(String),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDependency(e) => e.fmt(f),
            Self::DependencyCycle(e) => e.fmt(f),
            Self::UnknownGroup(name) => {
                write!(f, "requested group \"{name}\" matches no registered test")
            }
        }
    }
}

impl std::error::Error for PlanError {}

impl From<UnknownDependency> for PlanError {
    fn from(e: UnknownDependency) -> Self {
        Self::UnknownDependency(e)
    }
}

impl From<DependencyCycle> for PlanError {
    fn from(e: DependencyCycle) -> Self {
        Self::DependencyCycle(e)
    }
}

/// Derive the execution plan for a registry, optionally narrowed to the
/// requested groups plus their transitive prerequisites.
///
/// Entries outside the requested closure are excluded outright; they
/// never execute and never appear in results. With no requested groups
/// the whole registry is planned.
///
/// # Errors
///
/// Returns [`PlanError`] for unknown dependency targets, dependency
/// cycles (naming the participants), or an unknown requested group.
pub fn compile(
    registry: &TestRegistry,
    requested_groups: &[String],
) -> Result<ExecutionPlan, PlanError> {
    let sg = build(registry)?;
    let order = stable_topo(&sg, registry)?;

    let included: Option<HashSet<usize>> = if requested_groups.is_empty() {
        None
    } else {
        let mut seeds = Vec::new();
        for group in requested_groups {
            let members: Vec<usize> = registry
                .entries()
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.in_group(group))
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                return Err(PlanError::UnknownGroup(group.clone()));
            }
            seeds.extend(members);
        }
        Some(dependency_closure(&sg, &seeds))
    };

    let mut steps = Vec::new();
    for &entry_index in &order {
        if included.as_ref().is_some_and(|set| !set.contains(&entry_index)) {
            continue;
        }
        match &registry.entries()[entry_index] {
            Entry::Case(case) => {
                let mut depends_on = Vec::new();
                for target in &case.depends_on {
                    extend_unique(&mut depends_on, flatten_target(registry, target));
                }
                steps.push(PlanStep {
                    order: 0,
                    name: case.name.clone(),
                    class: None,
                    kind: StepKind::Case,
                    groups: case.groups.clone(),
                    depends_on,
                    enabled: case.enabled,
                    always_run: case.always_run,
                    entry_index,
                    case_index: None,
                });
            }
            Entry::Class(class) => expand_class(registry, class, entry_index, &mut steps)?,
        }
    }

    for (i, step) in steps.iter_mut().enumerate() {
        step.order = i + 1;
    }

    Ok(ExecutionPlan {
        plan: PlanMetadata {
            entries_total: registry.len(),
            steps_total: steps.len(),
            requested_groups: requested_groups.to_vec(),
        },
        steps,
    })
}

/// Expand a class entry into hook and member steps, members ordered by
/// their sibling dependencies (registration order as tie-break).
fn expand_class(
    registry: &TestRegistry,
    class: &TestClass,
    entry_index: usize,
    steps: &mut Vec<PlanStep>,
) -> Result<(), PlanError> {
    let mut class_deps = Vec::new();
    for target in &class.depends_on {
        extend_unique(&mut class_deps, flatten_target(registry, target));
    }

    if class.before.is_some() {
        steps.push(PlanStep {
            order: 0,
            name: class.before_step_name(),
            class: Some(class.name.clone()),
            kind: StepKind::BeforeClass,
            groups: class.groups.clone(),
            depends_on: class_deps.clone(),
            enabled: class.enabled,
            always_run: false,
            entry_index,
            case_index: None,
        });
    }

    for member_index in order_members(class)? {
        let case = &class.cases[member_index];
        let mut depends_on = class_deps.clone();
        for target in &case.depends_on {
            if let DependencyTarget::Case(name) = target
                && class.cases.iter().any(|sibling| &sibling.name == name)
            {
                extend_unique(&mut depends_on, vec![class.qualified(name)]);
            } else {
                extend_unique(&mut depends_on, flatten_target(registry, target));
            }
        }

        let mut groups = class.groups.clone();
        extend_unique(&mut groups, case.groups.clone());

        steps.push(PlanStep {
            order: 0,
            name: class.qualified(&case.name),
            class: Some(class.name.clone()),
            kind: StepKind::Case,
            groups,
            depends_on,
            enabled: class.enabled && case.enabled,
            always_run: case.always_run,
            entry_index,
            case_index: Some(member_index),
        });
    }

    if let Some(after) = &class.after {
        steps.push(PlanStep {
            order: 0,
            name: class.after_step_name(),
            class: Some(class.name.clone()),
            kind: StepKind::AfterClass,
            groups: class.groups.clone(),
            // Teardown is ordered by position, not gated on upstream
            // state; always-run hooks must survive upstream failures.
            depends_on: Vec::new(),
            enabled: class.enabled,
            always_run: after.always_run,
            entry_index,
            case_index: None,
        });
    }

    Ok(())
}

/// Stable topological order over a class's member cases, honoring
/// sibling `depends_on` edges.
fn order_members(class: &TestClass) -> Result<Vec<usize>, PlanError> {
    let count = class.cases.len();
    let sibling_index = |name: &str| class.cases.iter().position(|c| c.name == name);

    let mut in_degree = vec![0usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (member, case) in class.cases.iter().enumerate() {
        for target in &case.depends_on {
            if let DependencyTarget::Case(name) = target
                && let Some(prerequisite) = sibling_index(name)
                && prerequisite != member
            {
                dependents[prerequisite].push(member);
                in_degree[member] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(member, _)| Reverse(member))
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(member)) = ready.pop() {
        order.push(member);
        for &dependent in &dependents[member] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() < count {
        let participants = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree > 0)
            .map(|(member, _)| class.qualified(&class.cases[member].name))
            .collect();
        return Err(PlanError::DependencyCycle(DependencyCycle { participants }));
    }
    Ok(order)
}

/// Flatten a dependency target to the step names whose outcome gates the
/// dependent. Class targets cover the scoped setup and every member;
/// teardown hooks are excluded, since their failures are reported but do
/// not gate downstream tests.
fn flatten_target(registry: &TestRegistry, target: &DependencyTarget) -> Vec<String> {
    let mut names = Vec::new();
    match target {
        DependencyTarget::Case(name) => names.push(name.clone()),
        DependencyTarget::Class(class_name) => {
            for entry in registry.entries() {
                if let Entry::Class(class) = entry
                    && &class.name == class_name
                {
                    names.extend(class_step_names(class));
                }
            }
        }
        DependencyTarget::Group(group) => {
            for entry in registry.entries() {
                match entry {
                    Entry::Case(case) if case.groups.iter().any(|g| g == group) => {
                        names.push(case.name.clone());
                    }
                    Entry::Class(class) => {
                        if class.groups.iter().any(|g| g == group) {
                            names.extend(class_step_names(class));
                        } else {
                            for case in &class.cases {
                                if case.groups.iter().any(|g| g == group) {
                                    names.push(class.qualified(&case.name));
                                }
                            }
                        }
                    }
                    Entry::Case(_) => {}
                }
            }
        }
    }
    names
}

fn class_step_names(class: &TestClass) -> Vec<String> {
    let mut names = Vec::new();
    if class.before.is_some() {
        names.push(class.before_step_name());
    }
    names.extend(class.cases.iter().map(|case| class.qualified(&case.name)));
    names
}

fn extend_unique(existing: &mut Vec<String>, additions: Vec<String>) {
    for name in additions {
        if !existing.contains(&name) {
            existing.push(name);
        }
    }
}
