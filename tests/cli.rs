//! Binary smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_core_flags() {
    Command::cargo_bin("parley")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--conversation"))
        .stdout(predicate::str::contains("--poll-interval"));
}

#[test]
fn version_prints_package_version() {
    Command::cargo_bin("parley")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
