use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::registry::{DependencyTarget, Entry, TestRegistry};

/// The registry's dependency structure as a petgraph `DiGraph`.
///
/// Node weights are entry indexes into the registry. Edges point from
/// prerequisite to dependent: an edge `B → A` means A declared a
/// dependency on B, so B's tests run first.
#[derive(Debug)]
pub struct SuiteGraph {
    pub graph: DiGraph<usize, ()>,
    /// Node index for each registry entry, by entry index.
    pub node_indices: Vec<NodeIndex>,
}

/// A dependency declaration that resolves to nothing in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDependency {
    pub source: String,
    pub target: String,
}

impl fmt::Display for UnknownDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" depends on {}, which matches nothing in the registry",
            self.source, self.target
        )
    }
}

impl std::error::Error for UnknownDependency {}

/// Build the dependency graph over registry entries.
///
/// Class- and group-valued targets resolve to every matching entry.
/// Member-level targets naming a sibling case resolve inside the class at
/// plan expansion, not here; member targets pointing outside the class
/// become edges on the owning class, since the class is the scheduling
/// unit.
///
/// # Errors
///
/// Returns [`UnknownDependency`] for a target no entry satisfies.
pub fn build(registry: &TestRegistry) -> Result<SuiteGraph, UnknownDependency> {
    let mut graph = DiGraph::new();
    let node_indices: Vec<NodeIndex> = (0..registry.len()).map(|i| graph.add_node(i)).collect();

    for (dependent, entry) in registry.entries().iter().enumerate() {
        let mut add_edges = |source_name: &str,
                             target: &DependencyTarget,
                             graph: &mut DiGraph<usize, ()>|
         -> Result<(), UnknownDependency> {
            let prerequisites =
                resolve_target(registry, target).ok_or_else(|| UnknownDependency {
                    source: source_name.to_owned(),
                    target: target.to_string(),
                })?;
            for prerequisite in prerequisites {
                // A group can include its own dependents; self-edges carry
                // no ordering information.
                if prerequisite != dependent
                    && graph
                        .find_edge(node_indices[prerequisite], node_indices[dependent])
                        .is_none()
                {
                    graph.add_edge(node_indices[prerequisite], node_indices[dependent], ());
                }
            }
            Ok(())
        };

        for target in entry.depends_on() {
            add_edges(entry.name(), target, &mut graph)?;
        }

        // Member cases may declare targets of their own. Sibling case
        // names stay intra-class; everything else orders the whole class.
        if let Entry::Class(class) = entry {
            for case in &class.cases {
                for target in &case.depends_on {
                    if let DependencyTarget::Case(name) = target
                        && class.cases.iter().any(|sibling| &sibling.name == name)
                    {
                        continue;
                    }
                    add_edges(&class.qualified(&case.name), target, &mut graph)?;
                }
            }
        }
    }

    Ok(SuiteGraph {
        graph,
        node_indices,
    })
}

/// Resolve a dependency target to registry entry indexes, or `None` if
/// nothing matches.
fn resolve_target(registry: &TestRegistry, target: &DependencyTarget) -> Option<Vec<usize>> {
    let entries = registry.entries();
    let matches: Vec<usize> = match target {
        DependencyTarget::Case(name) => entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| match entry {
                Entry::Case(case) => &case.name == name,
                Entry::Class(class) => class
                    .cases
                    .iter()
                    .any(|case| class.qualified(&case.name) == *name),
            })
            .map(|(i, _)| i)
            .collect(),
        DependencyTarget::Class(name) => entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| matches!(entry, Entry::Class(class) if &class.name == name))
            .map(|(i, _)| i)
            .collect(),
        DependencyTarget::Group(name) => entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.in_group(name))
            .map(|(i, _)| i)
            .collect(),
    };
    if matches.is_empty() { None } else { Some(matches) }
}
