//! End-to-end grading scenarios over a throwaway submission.
//!
//! Each test builds a submission shaped like the `poly_exp` assignment: a
//! contributors list, a source file with starter TODOs, a protected test
//! file, a build script, and a fake GoogleTest binary.
#![cfg(unix)]

use grader::core::types::{CheckKind, CheckOutcome, FailureKind, Phase};
use grader::io::digest::sha256_hex;
use grader::plan::{Plan, run_plan};
use grader::test_support::{TestSubmission, gtest_json};

const STARTER_SOURCE: &str = "// TODO: implement\nint solve() { return 0; } // TODO\n";
const TEST_SOURCE: &str = "#include <gtest/gtest.h>\n";

fn plan_text() -> String {
    format!(
        r#"
[assignment]
name = "poly_exp"
total_points = 8
passing_threshold = 4

[[checks]]
type = "contributors_present"

[[checks]]
type = "contributors_not_default"

[[checks]]
type = "files_exist"
paths = ["README.md", "poly_exp.cpp", "poly_exp_test.cpp"]

[[checks]]
type = "file_unchanged"
path = "poly_exp.cpp"
digest = "{starter}"

[[checks]]
type = "file_changed"
path = "poly_exp_test.cpp"
digest = "{pinned}"

[[checks]]
type = "command_succeeds"
cmd = ["sh", "build.sh"]

[[checks]]
type = "string_removed"
name = "TODO comments removed"
points = 2
pattern = "TODO"
paths = ["poly_exp.cpp"]

[[checks]]
type = "gtest_run"
binary = "poly_exp_test"

[[checks]]
type = "gtest_suite_test"
name = "soccer_trivial"
points = 2

[[checks]]
type = "gtest_suite_test"
name = "soccer_general"
points = 2

[[checks]]
type = "gtest_suite_test"
name = "soccer_large"
points = 2
"#,
        starter = sha256_hex(STARTER_SOURCE.as_bytes()),
        pinned = sha256_hex(TEST_SOURCE.as_bytes()),
    )
}

fn plan() -> Plan {
    Plan::parse_str(&plan_text()).expect("plan parses")
}

/// A submission that passes every fail-fast check.
fn submission(source: &str) -> TestSubmission {
    let submission = TestSubmission::new().expect("submission");
    submission
        .write("README.md", "# poly_exp\n\nGroup members:\nGrace Hopper\n\nNotes\n")
        .expect("readme");
    submission.write("poly_exp.cpp", source).expect("source");
    submission.write("poly_exp_test.cpp", TEST_SOURCE).expect("test source");
    submission.write("build.sh", "exit 0\n").expect("build script");
    submission
}

fn fake_tests(submission: &TestSubmission, large_passes: bool) {
    let json = gtest_json(&[
        ("soccer_trivial", &[("empty", true), ("single", true)][..]),
        ("soccer_general", &[("small", true)][..]),
        ("soccer_large", &[("huge", large_passes)][..]),
    ]);
    let exit_code = if large_passes { 0 } else { 1 };
    submission
        .write_fake_gtest("poly_exp_test", Some(&json), "[==========] done\n", exit_code)
        .expect("fake gtest");
}

#[test]
fn completed_submission_earns_every_point() {
    let submission = submission("int solve() { return 1; }\n");
    fake_tests(&submission, true);
    let plan = plan();

    let report = run_plan(&plan, plan.config.clone(), submission.path()).expect("grade");

    assert_eq!(report.checks.len(), plan.checks.len());
    assert!(report.checks.iter().all(|check| check.outcome == CheckOutcome::Pass));
    assert_eq!(report.score, 8);
    assert_eq!(report.phase, Phase::Active);
    assert!(report.passed);
    assert_eq!(submission.invocations("poly_exp_test").expect("runs"), 1);
}

#[test]
fn failing_suite_and_leftover_todo_lose_only_their_points() {
    let submission = submission("// TODO: tidy\nint solve() { return 1; }\n");
    fake_tests(&submission, false);
    let plan = plan();

    let report = run_plan(&plan, plan.config.clone(), submission.path()).expect("grade");

    let todo = &report.checks[6];
    assert_eq!(todo.outcome, CheckOutcome::Fail);
    assert_eq!(todo.failure, Some(FailureKind::Content));
    assert!(todo.detail.contains("1 occurrence(s)"));

    let large = report.checks.last().expect("last check");
    assert_eq!(large.name, "soccer_large");
    assert_eq!(large.outcome, CheckOutcome::Fail);
    assert!(large.detail.contains("huge"));

    assert_eq!(report.score, 4);
    assert!(report.passed);
    assert!(!report.is_terminated());
}

#[test]
fn unchanged_starter_source_stops_grading() {
    let submission = submission(STARTER_SOURCE);
    fake_tests(&submission, true);
    let plan = plan();

    let report = run_plan(&plan, plan.config.clone(), submission.path()).expect("grade");

    assert_eq!(
        report.phase,
        Phase::Terminated {
            by: "poly_exp.cpp was modified".to_string()
        }
    );
    assert_eq!(report.score, 0);
    assert!(!report.passed);
    assert_eq!(report.checks.len(), plan.checks.len());
    assert!(
        report.checks[4..]
            .iter()
            .all(|check| check.outcome == CheckOutcome::Skipped)
    );
    assert_eq!(submission.invocations("poly_exp_test").expect("runs"), 0);
}

#[test]
fn edited_protected_test_file_is_rejected() {
    let submission = submission("int solve() { return 1; }\n");
    submission
        .write("poly_exp_test.cpp", "TEST(soccer_large, huge) {}\n")
        .expect("tamper");
    fake_tests(&submission, true);
    let plan = plan();

    let report = run_plan(&plan, plan.config.clone(), submission.path()).expect("grade");

    let tampered = &report.checks[4];
    assert_eq!(tampered.outcome, CheckOutcome::Fail);
    assert_eq!(tampered.failure, Some(FailureKind::Integrity));
    assert!(tampered.detail.contains("expected sha256"));
    assert!(report.is_terminated());
}

#[test]
fn broken_build_stops_before_tests() {
    let submission = submission("int solve() { return 1; }\n");
    submission
        .write("build.sh", "echo 'poly_exp.cpp:1: error: expected ;' >&2\nexit 2\n")
        .expect("build script");
    fake_tests(&submission, true);
    let plan = plan();

    let report = run_plan(&plan, plan.config.clone(), submission.path()).expect("grade");

    let build = &report.checks[5];
    assert_eq!(build.kind, CheckKind::FailFast);
    assert_eq!(build.failure, Some(FailureKind::Build));
    assert!(build.detail.contains("exit status 2"));
    assert!(build.detail.contains("expected ;"));
    assert_eq!(submission.invocations("poly_exp_test").expect("runs"), 0);
}

#[test]
fn placeholder_contributor_is_rejected() {
    let submission = submission("int solve() { return 1; }\n");
    submission
        .write("README.md", "Group members:\nAda Lovelace\n")
        .expect("readme");
    let plan = plan();

    let report = run_plan(&plan, plan.config.clone(), submission.path()).expect("grade");

    assert_eq!(report.checks[0].outcome, CheckOutcome::Pass);
    assert_eq!(report.checks[1].outcome, CheckOutcome::Fail);
    assert!(report.checks[1].detail.contains("Ada Lovelace"));
    assert!(report.is_terminated());
}

#[test]
fn awarded_points_match_passing_records() {
    let submission = submission("// TODO\nint solve() { return 1; }\n");
    fake_tests(&submission, false);
    let plan = plan();

    let report = run_plan(&plan, plan.config.clone(), submission.path()).expect("grade");

    let from_records: u32 = report
        .checks
        .iter()
        .filter(|check| check.outcome == CheckOutcome::Pass)
        .map(|check| check.points_awarded)
        .sum();
    assert_eq!(report.score, from_records);
    assert!(report.score <= report.total_points);
    assert!(
        report
            .checks
            .iter()
            .filter(|check| check.outcome != CheckOutcome::Pass)
            .all(|check| check.points_awarded == 0)
    );
}
