use std::path::PathBuf;
use std::time::Duration;

use crate::config;
use crate::plan::compile;
use crate::registry::TestRegistry;
use crate::runner::context::RunContext;
use crate::runner::display::{format_case_result, format_slowest, format_summary};
use crate::runner::executor::{Harness, RunConfig};
use crate::runner::known_bugs::KnownBugTable;
use crate::runner::report::{emit_json, emit_yaml, to_report};

/// Options for the `run` command.
pub struct RunOptions {
    /// Requested group labels; empty runs everything registered.
    pub groups: Vec<String>,
    pub known_bugs: Option<PathBuf>,
    pub users: Option<PathBuf>,
    /// Outer wall-clock budget in seconds.
    pub budget_secs: Option<u64>,
    pub fail_fast: bool,
    pub report: Option<PathBuf>,
    pub format: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            known_bugs: None,
            users: None,
            budget_secs: None,
            fail_fast: false,
            report: None,
            format: "yaml".to_owned(),
        }
    }
}

/// What a `run` invocation produced: display text plus the process exit
/// code (non-zero iff any case failed or errored).
#[derive(Debug)]
pub struct RunOutput {
    pub text: String,
    pub exit_code: i32,
}

/// Run the registry, honoring group filters and configuration files.
///
/// # Errors
///
/// Returns an error string for plan-level configuration problems
/// (unknown dependencies, cycles, unknown groups) or unreadable config
/// files; test failures are not errors here, they surface in the exit
/// code.
pub fn run_suite(registry: &TestRegistry, options: &RunOptions) -> Result<RunOutput, String> {
    let plan = compile(registry, &options.groups).map_err(|e| e.to_string())?;

    let known_bugs = match &options.known_bugs {
        Some(path) => config::load_known_bugs(path)?,
        None => KnownBugTable::default(),
    };
    let users = match &options.users {
        Some(path) => config::load_user_pool(path)?,
        None => config::default_user_pool(),
    };

    let run_config = RunConfig {
        fail_fast: options.fail_fast,
        wall_clock_budget: options.budget_secs.map(Duration::from_secs),
    };

    let mut context = RunContext::new(users);
    let outcome = Harness::new(registry, run_config)
        .with_known_bugs(known_bugs)
        .run(&plan, &mut context);

    let mut text = String::new();
    for result in &outcome.results {
        text.push_str(&format_case_result(result));
        text.push('\n');
    }
    text.push_str(&format_summary(&outcome));
    text.push_str(&format_slowest(&outcome));

    if let Some(path) = &options.report {
        let report = to_report(&outcome, &options.groups);
        let contents = match options.format.as_str() {
            "yaml" => emit_yaml(&report),
            "json" => emit_json(&report),
            other => return Err(format!("unknown format '{other}' (expected: yaml, json)")),
        };
        std::fs::write(path, contents)
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        text.push_str(&format!("\nreport written to {}", path.display()));
    }

    Ok(RunOutput {
        text,
        exit_code: outcome.exit_code(),
    })
}

/// Print the execution order the planner derives, without running
/// anything.
///
/// # Errors
///
/// Returns an error string for plan-level configuration problems.
pub fn run_plan(registry: &TestRegistry, groups: &[String]) -> Result<String, String> {
    let plan = compile(registry, groups).map_err(|e| e.to_string())?;
    serde_yaml::to_string(&plan).map_err(|e| format!("failed to serialize plan: {e}"))
}

/// Resolve and cycle-check the registry and configuration files without
/// executing anything.
///
/// # Errors
///
/// Returns an error string for any configuration problem found.
pub fn run_validate(
    registry: &TestRegistry,
    groups: &[String],
    known_bugs: Option<&PathBuf>,
    users: Option<&PathBuf>,
) -> Result<String, String> {
    let plan = compile(registry, groups).map_err(|e| e.to_string())?;

    let mut lines = vec![format!(
        "plan ok: {} steps from {} entries",
        plan.plan.steps_total, plan.plan.entries_total
    )];

    if let Some(path) = known_bugs {
        let table = config::load_known_bugs(path)?;
        // An entry naming a test outside the plan is dead weight at best
        // and a typo at worst.
        let step_names = plan.step_names();
        let stale: Vec<String> = table
            .entries()
            .filter(|(name, _)| !step_names.contains(&name.as_str()))
            .map(|(name, _)| name.clone())
            .collect();
        if stale.is_empty() {
            lines.push(format!("known bugs ok: {} entries", table.len()));
        } else {
            return Err(format!(
                "known-bug entries match no planned test: {}",
                stale.join(", ")
            ));
        }
    }

    if let Some(path) = users {
        let pool = config::load_user_pool(path)?;
        lines.push(format!("user pool ok: {} identities", pool.len()));
    }

    Ok(lines.join("\n"))
}
