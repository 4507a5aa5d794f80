//! Integration tests for the paco CLI surface: help, version and argument
//! parsing.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn paco() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("paco"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    paco().assert().code(2).stderr(predicate::str::contains(
        "Keep a pool of self-hosted CI runners registered and supervised",
    ));
}

#[test]
fn test_cli_help_lists_every_command() {
    let assert = paco().arg("--help").assert().success();
    let out = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for command in ["install", "start", "stop", "kill", "status", "logs", "uninstall"] {
        assert!(out.contains(command), "help is missing `{command}`:\n{out}");
    }
}

#[test]
fn test_cli_version_flag_shows_version() {
    paco()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("paco"));
}

#[test]
fn test_stop_help_documents_force() {
    paco()
        .args(["stop", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_logs_help_documents_filters() {
    paco()
        .args(["logs", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--follow"))
        .stdout(predicate::str::contains("--lines"))
        .stdout(predicate::str::contains("--since"));
}

#[test]
fn test_unknown_command_is_a_usage_error() {
    paco()
        .arg("restart")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
