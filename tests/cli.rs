//! End-to-end coverage of the thin CLI surface (`run`/`validate`/
//! `queue-cleanup`) via `assert_cmd`, exercising the compiled binary rather
//! than calling library functions directly.

use assert_cmd::Command;
use predicates::prelude::*;

fn write_tests_file(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn validate_reports_object_count_for_a_clean_file() {
    let dir = tempfile::tempdir().unwrap();
    let tests = write_tests_file(
        dir.path(),
        "clean.test",
        r#"
        [Tests]
          [a]
            type = Echo
            input = "hello"
          []
        []
        "#,
    );

    Command::cargo_bin("harnessrs")
        .unwrap()
        .arg("validate")
        .arg(&tests)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 object(s) constructed"));
}

#[test]
fn validate_exits_nonzero_on_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let tests = write_tests_file(
        dir.path(),
        "bad.test",
        r#"
        [Tests]
          [a]
            type = NoSuchType
          []
        []
        "#,
    );

    Command::cargo_bin("harnessrs")
        .unwrap()
        .arg("validate")
        .arg(&tests)
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown type"));
}

#[test]
fn run_dispatches_an_echo_job_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let tests = write_tests_file(
        dir.path(),
        "run.test",
        r#"
        [Tests]
          [a]
            type = Echo
            input = "hello"
          []
        []
        "#,
    );

    Command::cargo_bin("harnessrs")
        .unwrap()
        .current_dir(dir.path())
        .arg("run")
        .arg(&tests)
        .assert()
        .success();
}

#[test]
fn run_exits_nonzero_when_the_file_fails_to_parse_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let tests = write_tests_file(
        dir.path(),
        "unparseable.test",
        r#"
        [Tests]
          [a]
            type = NoSuchType
          []
        []
        "#,
    );

    Command::cargo_bin("harnessrs")
        .unwrap()
        .current_dir(dir.path())
        .arg("run")
        .arg(&tests)
        .assert()
        .failure();
}

#[test]
fn queue_cleanup_succeeds_with_no_recorded_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let tests = write_tests_file(
        dir.path(),
        "cleanup.test",
        r#"
        [Tests]
          [a]
            type = Echo
            input = "hello"
          []
        []
        "#,
    );

    Command::cargo_bin("harnessrs")
        .unwrap()
        .arg("queue-cleanup")
        .arg(&tests)
        .assert()
        .success();
}
