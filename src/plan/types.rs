use serde::Serialize;

/// What a plan step executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    BeforeClass,
    Case,
    AfterClass,
}

/// One scheduled unit: a test case or a class hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub order: usize,
    /// Qualified name, e.g. `CreateInstance.wait_for_active`.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub kind: StepKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Flattened step names whose failure forces a skip of this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub enabled: bool,
    pub always_run: bool,
    /// Position of the owning entry in the registry.
    #[serde(skip)]
    pub entry_index: usize,
    /// Position of the case within its class, for member steps.
    #[serde(skip)]
    pub case_index: Option<usize>,
}

/// Metadata describing how a plan was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanMetadata {
    pub entries_total: usize,
    pub steps_total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requested_groups: Vec<String>,
}

/// The dependency-respecting order every run executes in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub plan: PlanMetadata,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// Steps that are test cases (not class hooks).
    pub fn case_steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.kind == StepKind::Case)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}
