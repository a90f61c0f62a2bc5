pub mod builder;
pub mod order;

pub use builder::{SuiteGraph, UnknownDependency, build};
pub use order::{DependencyCycle, dependency_closure, stable_topo};
