use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use crate::plan::types::{ExecutionPlan, PlanStep, StepKind};
use crate::registry::entry::{CaseFn, Entry};
use crate::registry::TestRegistry;
use crate::runner::context::RunContext;
use crate::runner::known_bugs::{Interception, KnownBugTable};
use crate::runner::result::{
    CaseError, CaseErrorKind, CaseResult, CaseStatus, RunSummary, SkipReason,
};

/// Configuration for a run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Abort the run after the first failure; always-run teardown still
    /// executes.
    pub fail_fast: bool,
    /// Outer wall-clock bound for the whole run. Individual polls carry
    /// their own timeouts (or none); this is the backstop that turns a
    /// hung suite into an abort that still reports.
    pub wall_clock_budget: Option<Duration>,
}

/// The complete result of executing a plan.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<CaseResult>,
    pub summary: RunSummary,
    pub total_duration: Duration,
    /// Why the run stopped early, if it did.
    pub aborted: Option<String>,
}

impl RunOutcome {
    /// Process exit code: non-zero iff any case failed or errored.
    /// Skips, including known-bug conversions, do not affect it.
    pub fn exit_code(&self) -> i32 {
        if self.summary.success() { 0 } else { 1 }
    }
}

/// Executes an [`ExecutionPlan`] sequentially against the registry it was
/// compiled from.
pub struct Harness<'a> {
    registry: &'a TestRegistry,
    config: RunConfig,
    known_bugs: KnownBugTable,
}

impl<'a> Harness<'a> {
    pub fn new(registry: &'a TestRegistry, config: RunConfig) -> Self {
        Self {
            registry,
            config,
            known_bugs: KnownBugTable::default(),
        }
    }

    pub fn with_known_bugs(mut self, known_bugs: KnownBugTable) -> Self {
        self.known_bugs = known_bugs;
        self
    }

    /// Run every step in plan order.
    ///
    /// A single sequential worker: the only ordering guarantee is the
    /// plan's, and the only shared state between cases is `context`.
    pub fn run(&self, plan: &ExecutionPlan, context: &mut RunContext) -> RunOutcome {
        let start = Instant::now();
        let mut results: Vec<CaseResult> = Vec::with_capacity(plan.steps.len());
        // Steps whose final state blocks dependents.
        let mut failed: HashSet<String> = HashSet::new();
        let mut unrunnable: HashSet<String> = HashSet::new();
        // Classes whose scoped setup failed, with the setup error text.
        let mut poisoned: HashMap<String, String> = HashMap::new();
        let mut abort: Option<String> = None;

        for step in &plan.steps {
            if abort.is_none()
                && let Some(budget) = self.config.wall_clock_budget
                && start.elapsed() >= budget
            {
                abort = Some(format!(
                    "wall-clock budget of {:.0}s exceeded",
                    budget.as_secs_f64()
                ));
            }

            if !step.enabled {
                results.push(CaseResult::skipped(
                    &step.name,
                    step.class.as_deref(),
                    SkipReason::Disabled,
                ));
                continue;
            }

            if let Some(cause) = &abort
                && !step.always_run
            {
                unrunnable.insert(step.name.clone());
                results.push(CaseResult::skipped(
                    &step.name,
                    step.class.as_deref(),
                    SkipReason::Aborted {
                        cause: cause.clone(),
                    },
                ));
                continue;
            }

            // Members of a class whose setup failed are errors, not
            // silent skips. Always-run members still execute.
            if step.kind == StepKind::Case
                && !step.always_run
                && let Some(class) = &step.class
                && let Some(setup_error) = poisoned.get(class)
            {
                let result = self.intercepted(
                    step,
                    CaseResult::failed(
                        &step.name,
                        Some(class),
                        Duration::ZERO,
                        CaseError {
                            kind: CaseErrorKind::SetupFailed,
                            message: format!("before_class failed for {class}"),
                            detail: Some(setup_error.clone()),
                        },
                    ),
                    &mut unrunnable,
                );
                if result.is_failure() {
                    failed.insert(step.name.clone());
                }
                results.push(result);
                continue;
            }

            // Teardown of a poisoned class runs only if marked always-run.
            if step.kind == StepKind::AfterClass
                && !step.always_run
                && let Some(class) = &step.class
                && poisoned.contains_key(class)
            {
                results.push(CaseResult::skipped(
                    &step.name,
                    step.class.as_deref(),
                    SkipReason::UpstreamFailure {
                        dependency: format!("{class}.before_class"),
                    },
                ));
                continue;
            }

            if !step.always_run
                && let Some(dependency) = step
                    .depends_on
                    .iter()
                    .find(|dep| failed.contains(*dep) || unrunnable.contains(*dep))
            {
                unrunnable.insert(step.name.clone());
                results.push(CaseResult::skipped(
                    &step.name,
                    step.class.as_deref(),
                    SkipReason::UpstreamFailure {
                        dependency: dependency.clone(),
                    },
                ));
                continue;
            }

            let result = self.intercepted(step, self.execute(step, context), &mut unrunnable);

            if result.is_failure() {
                failed.insert(step.name.clone());
                if step.kind == StepKind::BeforeClass
                    && let Some(class) = &step.class
                {
                    let message = result
                        .error
                        .as_ref()
                        .map_or_else(|| "setup failed".to_owned(), CaseError::to_string);
                    poisoned.insert(class.clone(), message);
                }
                // Teardown failures count toward the exit code but never
                // stop the run; the original failure stays primary.
                if self.config.fail_fast && abort.is_none() && step.kind != StepKind::AfterClass {
                    abort = Some(format!("stopped after failure of {}", step.name));
                }
            }
            results.push(result);
        }

        let summary = RunSummary::from_results(&results);
        RunOutcome {
            results,
            summary,
            total_duration: start.elapsed(),
            aborted: abort,
        }
    }

    /// Invoke a step's body, converting panics into errored results.
    fn execute(&self, step: &PlanStep, context: &mut RunContext) -> CaseResult {
        let Some(body) = self.step_body(step) else {
            return CaseResult::failed(
                &step.name,
                step.class.as_deref(),
                Duration::ZERO,
                CaseError::runtime("plan step does not resolve to a registered body"),
            );
        };

        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| body(context)));
        let duration = start.elapsed();

        match outcome {
            Ok(Ok(())) => CaseResult::passed(&step.name, step.class.as_deref(), duration),
            Ok(Err(error)) => {
                CaseResult::failed(&step.name, step.class.as_deref(), duration, error)
            }
            Err(panic) => CaseResult::failed(
                &step.name,
                step.class.as_deref(),
                duration,
                CaseError::runtime(format!("panicked: {}", panic_message(panic.as_ref()))),
            ),
        }
    }

    /// Apply known-bug interception to an outcome before recording it.
    fn intercepted(
        &self,
        step: &PlanStep,
        result: CaseResult,
        unrunnable: &mut HashSet<String>,
    ) -> CaseResult {
        match self
            .known_bugs
            .intercept(&step.name, &result.status, result.error.as_ref())
        {
            None => result,
            Some(Interception::ConvertToSkip { tracker_id }) => {
                // The test still did not run to a useful conclusion, so
                // dependents are skipped just as for a plain failure.
                unrunnable.insert(step.name.clone());
                CaseResult::skipped(
                    &step.name,
                    step.class.as_deref(),
                    SkipReason::KnownBug { tracker_id },
                )
            }
            Some(Interception::Escalate { error }) => CaseResult {
                status: CaseStatus::Error,
                error: Some(error),
                skip_reason: None,
                ..result
            },
        }
    }

    fn step_body(&self, step: &PlanStep) -> Option<&CaseFn> {
        match &self.registry.entries()[step.entry_index] {
            Entry::Case(case) => Some(&case.run),
            Entry::Class(class) => match step.kind {
                StepKind::Case => step.case_index.map(|i| &class.cases[i].run),
                StepKind::BeforeClass => class.before.as_ref(),
                StepKind::AfterClass => class.after.as_ref().map(|hook| &hook.run),
            },
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
