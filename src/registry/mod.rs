pub mod builder;
pub mod entry;

pub use builder::{CaseBuilder, ClassBuilder, TestRegistry};
pub use entry::{CaseFn, ClassHook, DependencyTarget, Entry, TestCase, TestClass};
