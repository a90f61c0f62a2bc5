use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;

use crate::graph::builder::SuiteGraph;
use crate::registry::TestRegistry;

/// The declared dependency relation is not a DAG. Raised at plan time,
/// before anything executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCycle {
    /// Names of every entry participating in a cycle.
    pub participants: Vec<String>,
}

impl fmt::Display for DependencyCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dependency cycle involving: {}",
            self.participants.join(", ")
        )
    }
}

impl std::error::Error for DependencyCycle {}

/// Topological order over registry entries, stable with respect to
/// registration order.
///
/// Kahn's algorithm with an ordered ready-set: whenever several entries
/// have all their prerequisites satisfied, the one registered first is
/// scheduled first. Reports therefore read in declaration order wherever
/// no edge says otherwise.
///
/// # Errors
///
/// Returns [`DependencyCycle`] naming every participant when the graph is
/// not a DAG.
pub fn stable_topo(sg: &SuiteGraph, registry: &TestRegistry) -> Result<Vec<usize>, DependencyCycle> {
    let graph = &sg.graph;
    let mut in_degree: Vec<usize> = sg
        .node_indices
        .iter()
        .map(|&node| graph.neighbors_directed(node, Direction::Incoming).count())
        .collect();

    // Ready entries, smallest registration index first.
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(entry, _)| Reverse(entry))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(entry)) = ready.pop() {
        order.push(entry);
        for dependent in graph.neighbors_directed(sg.node_indices[entry], Direction::Outgoing) {
            let dependent_entry = graph[dependent];
            in_degree[dependent_entry] -= 1;
            if in_degree[dependent_entry] == 0 {
                ready.push(Reverse(dependent_entry));
            }
        }
    }

    if order.len() < graph.node_count() {
        return Err(DependencyCycle {
            participants: cycle_participants(sg, registry),
        });
    }
    Ok(order)
}

/// Entries inside a strongly connected component of more than one node
/// (or with a self-loop), in registration order.
fn cycle_participants(sg: &SuiteGraph, registry: &TestRegistry) -> Vec<String> {
    let mut entries: Vec<usize> = Vec::new();
    for component in tarjan_scc(&sg.graph) {
        let cyclic = component.len() > 1
            || component
                .first()
                .is_some_and(|&n| sg.graph.find_edge(n, n).is_some());
        if cyclic {
            entries.extend(component.iter().map(|&n| sg.graph[n]));
        }
    }
    entries.sort_unstable();
    entries
        .into_iter()
        .map(|i| registry.entries()[i].name().to_owned())
        .collect()
}

/// Entries in the requested groups plus their transitive prerequisites.
///
/// Everything outside the closure is excluded from the plan: never
/// executed, never counted.
pub fn dependency_closure(sg: &SuiteGraph, seeds: &[usize]) -> HashSet<usize> {
    let mut closure: HashSet<usize> = seeds.iter().copied().collect();
    let mut stack: Vec<NodeIndex> = seeds.iter().map(|&i| sg.node_indices[i]).collect();

    while let Some(node) = stack.pop() {
        for prerequisite in sg.graph.neighbors_directed(node, Direction::Incoming) {
            if closure.insert(sg.graph[prerequisite]) {
                stack.push(prerequisite);
            }
        }
    }
    closure
}
