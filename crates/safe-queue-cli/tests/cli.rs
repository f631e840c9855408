//! Tests for the safe-queue binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn safe_queue() -> Command {
    let mut cmd = Command::cargo_bin("safe-queue").expect("binary should be built");
    cmd.env_remove("SAFE_QUEUE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    safe_queue()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("checkout"))
        .stdout(predicate::str::contains("purge"));
}

#[test]
fn test_config_prints_defaults_as_yaml() {
    safe_queue()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("name: queue"))
        .stdout(predicate::str::contains("type: redis"));
}

#[test]
fn test_config_reads_file_and_environment() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(file, "[safe]\nttl_seconds = 45\n\n[store]\ntype = \"in_memory\"").unwrap();

    safe_queue()
        .env("SAFE_QUEUE__QUEUE__NAME", "jobs")
        .arg("--config")
        .arg(file.path())
        .args(["config", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"jobs\""))
        .stdout(predicate::str::contains("\"ttl_seconds\": 45"))
        .stdout(predicate::str::contains("\"in_memory\""));
}

#[test]
fn test_invalid_configuration_exits_with_code_1() {
    safe_queue()
        .env("SAFE_QUEUE__SAFE__TTL_SECONDS", "0")
        .arg("config")
        .assert()
        .code(1);
}

#[test]
fn test_unconfirmed_purge_exits_with_code_4() {
    safe_queue().arg("purge").assert().code(4);
}

#[test]
fn test_invalid_log_level_is_reported_on_stderr() {
    safe_queue()
        .args(["--log-level", "safe_queue=notalevel", "config"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("--log-level"));
}

#[test]
fn test_fatal_error_is_reported_with_logging_filtered_off() {
    safe_queue()
        .env("RUST_LOG", "off")
        .env("SAFE_QUEUE__SAFE__TTL_SECONDS", "0")
        .arg("config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ttl_seconds"));
}
