//! End-to-end tests for the `ccrecon` binary: init, submit, status, and
//! audit against a real temp database, through the actual process.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli(db: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ccrecon").expect("binary builds");
    cmd.arg("--db").arg(db);
    cmd
}

#[test]
fn test_init_creates_database() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("state.db");

    cli(&db).arg("init").assert().success();
    assert!(db.exists());
}

#[test]
fn test_status_on_unknown_job_fails_with_message() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("state.db");

    cli(&db).arg("init").assert().success();
    cli(&db)
        .args(["status", "no-such-job"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-job"));
}

#[test]
fn test_submit_reconstruction_requires_input_file() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("state.db");

    cli(&db).arg("init").assert().success();
    cli(&db)
        .args(["submit", "--instruction", "rewrite this"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--input"));
}

#[test]
fn test_submit_expansion_runs_without_an_input_file() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("state.db");

    cli(&db).arg("init").assert().success();
    cli(&db)
        .args(["submit", "--expand", "--instruction", "expand to 600 words with sections: intro, body"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Complete"));
}
