use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_version() {
    Command::new(env!("CARGO_BIN_EXE_molt-tui"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::new(env!("CARGO_BIN_EXE_molt-tui"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Molt-TUI").and(predicate::str::contains("--version")));
}

#[test]
fn short_version_flag() {
    Command::new(env!("CARGO_BIN_EXE_molt-tui"))
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains("Molt-TUI"));
}
