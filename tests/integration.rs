use std::io::Write;

use gauntlet::cli::commands::{RunOptions, run_plan, run_suite, run_validate};
use gauntlet::registry::{CaseBuilder, TestRegistry};
use gauntlet::runner::result::CaseError;
use gauntlet::suite;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ── Plan command ───────────────────────────────────────────

#[test]
fn cli_plan_emits_smoke_suite_order() {
    let registry = suite::smoke_registry();
    let yaml = run_plan(&registry, &[]).expect("plan should succeed");
    assert!(yaml.contains("name: wait_for_control_plane"));
    assert!(yaml.contains("name: CreateInstance.wait_for_active"));
    assert!(yaml.contains("name: DeleteInstance.wait_until_gone"));
    // Dependency listings survive serialization.
    assert!(yaml.contains("depends_on"));
    // Lifecycle precedes the API surfaces in the emitted order.
    let create = yaml.find("CreateInstance.create").unwrap();
    let databases = yaml.find("Databases.create_databases").unwrap();
    assert!(create < databases);
}

#[test]
fn cli_plan_with_group_filter_narrows_output() {
    let registry = suite::smoke_registry();
    let yaml = run_plan(&registry, &["dbaas.guest.initialize".to_owned()]).unwrap();
    assert!(yaml.contains("wait_for_control_plane"));
    assert!(!yaml.contains("Databases."));
    assert!(yaml.contains("requested_groups"));
}

#[test]
fn cli_plan_unknown_group_errors() {
    let registry = suite::smoke_registry();
    let err = run_plan(&registry, &["no.such.group".to_owned()]).unwrap_err();
    assert!(err.contains("no.such.group"));
}

// ── Run command ────────────────────────────────────────────

#[test]
fn cli_run_smoke_suite_exits_zero() {
    let registry = suite::smoke_registry();
    let output = run_suite(&registry, &RunOptions::default()).expect("run should start");
    assert_eq!(output.exit_code, 0, "smoke suite failed:\n{}", output.text);
    assert!(output.text.contains("[PASSED] CreateInstance.wait_for_active"));
    assert!(output.text.contains("Results:"));
    assert!(output.text.contains("Slowest tests:"));
}

#[test]
fn cli_run_failure_exits_nonzero() {
    let mut registry = TestRegistry::new();
    registry.register_case(
        CaseBuilder::new("doomed").run(|_| Err(CaseError::assertion("always fails"))),
    );
    let output = run_suite(&registry, &RunOptions::default()).unwrap();
    assert_eq!(output.exit_code, 1);
    assert!(output.text.contains("[FAILED] doomed"));
    assert!(output.text.contains("1 failed"));
}

#[test]
fn cli_run_writes_report_file() {
    let registry = suite::smoke_registry();
    let report_path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let options = RunOptions {
        report: Some(report_path.to_path_buf()),
        format: "json".to_owned(),
        ..RunOptions::default()
    };
    let output = run_suite(&registry, &options).unwrap();
    assert_eq!(output.exit_code, 0);
    let contents = std::fs::read_to_string(&report_path).unwrap();
    let report: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(report["summary"]["success"], true);
    assert!(report["slowest"].as_array().is_some());
}

#[test]
fn cli_run_rejects_unknown_report_format() {
    let registry = suite::smoke_registry();
    let options = RunOptions {
        report: Some(std::env::temp_dir().join("never_written.out")),
        format: "xml".to_owned(),
        ..RunOptions::default()
    };
    let err = run_suite(&registry, &options).unwrap_err();
    assert!(err.contains("xml"));
}

#[test]
fn cli_run_with_known_bug_file_converts_failure() {
    let mut registry = TestRegistry::new();
    registry.register_case(
        CaseBuilder::new("resize").run(|_| Err(CaseError::assertion("resize stuck at 22%"))),
    );
    let bugs = write_temp(
        "resize:\n\
         \x20 tracker_id: bug/781217\n\
         \x20 error_substring: \"stuck at 22%\"\n",
    );
    let options = RunOptions {
        known_bugs: Some(bugs.path().to_path_buf()),
        ..RunOptions::default()
    };
    let output = run_suite(&registry, &options).unwrap();
    assert_eq!(output.exit_code, 0, "known-bug skip must not fail the run");
    assert!(output.text.contains("known bug bug/781217"));
}

#[test]
fn cli_run_with_user_pool_file() {
    use gauntlet::users::Requirements;

    let mut registry = TestRegistry::new();
    registry.register_case(CaseBuilder::new("needs_admin").run(|ctx| {
        let admin = ctx.users.find_user(&Requirements::new(true), &[])?;
        if admin.auth_user == "cloud_admin" {
            Ok(())
        } else {
            Err(CaseError::assertion("wrong identity selected"))
        }
    }));
    let pool = write_temp(
        "- auth_user: cloud_admin\n\
         \x20 auth_key: secret\n\
         \x20 requirements:\n\
         \x20   is_admin: true\n",
    );
    let options = RunOptions {
        users: Some(pool.path().to_path_buf()),
        ..RunOptions::default()
    };
    let output = run_suite(&registry, &options).unwrap();
    assert_eq!(output.exit_code, 0, "{}", output.text);
}

#[test]
fn cli_run_budget_aborts_but_reports() {
    let mut registry = TestRegistry::new();
    registry.register_case(CaseBuilder::new("slow").run(|_| {
        std::thread::sleep(std::time::Duration::from_millis(30));
        Ok(())
    }));
    registry.register_case(CaseBuilder::new("later").run(|_| Ok(())));
    let options = RunOptions {
        budget_secs: Some(0),
        ..RunOptions::default()
    };
    let output = run_suite(&registry, &options).unwrap();
    assert!(output.text.contains("Run aborted"));
    // No failures, only not-reached skips: still exit zero.
    assert_eq!(output.exit_code, 0);
}

// ── Validate command ───────────────────────────────────────

#[test]
fn cli_validate_reports_counts() {
    let registry = suite::smoke_registry();
    let result = run_validate(&registry, &[], None, None).unwrap();
    assert!(result.contains("plan ok"));
}

#[test]
fn cli_validate_checks_config_files() {
    let registry = suite::smoke_registry();
    let bugs = write_temp(
        "CreateInstance.wait_for_active:\n\
         \x20 tracker_id: bug/912387\n\
         \x20 error_substring: stuck in BUILD\n",
    );
    let pool = write_temp(
        "- auth_user: admin\n\
         \x20 auth_key: secret\n\
         \x20 requirements:\n\
         \x20   is_admin: true\n",
    );
    let result = run_validate(
        &registry,
        &[],
        Some(&bugs.path().to_path_buf()),
        Some(&pool.path().to_path_buf()),
    )
    .unwrap();
    assert!(result.contains("known bugs ok: 1 entries"));
    assert!(result.contains("user pool ok: 1 identities"));
}

#[test]
fn cli_validate_flags_known_bug_for_unplanned_test() {
    let registry = suite::smoke_registry();
    let bugs = write_temp(
        "Ghost.test:\n\
         \x20 tracker_id: bug/1\n\
         \x20 error_substring: whatever\n",
    );
    let err = run_validate(&registry, &[], Some(&bugs.path().to_path_buf()), None).unwrap_err();
    assert!(err.contains("Ghost.test"));
}

#[test]
fn cli_validate_surfaces_cycles() {
    let mut registry = TestRegistry::new();
    registry.register_case(CaseBuilder::new("a").depends_on_case("b").run(|_| Ok(())));
    registry.register_case(CaseBuilder::new("b").depends_on_case("a").run(|_| Ok(())));
    let err = run_validate(&registry, &[], None, None).unwrap_err();
    assert!(err.contains("cycle"));
}
