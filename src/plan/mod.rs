pub mod compiler;
pub mod types;

pub use compiler::{PlanError, compile};
pub use types::{ExecutionPlan, PlanMetadata, PlanStep, StepKind};
