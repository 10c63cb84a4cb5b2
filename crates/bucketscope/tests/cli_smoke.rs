//! CLI smoke tests.
//!
//! Every command here stays offline: either it needs no limiter, or it fails
//! before any request is sent. Config is pinned to a temp file so the
//! developer's own `bucketscope.toml` is never read.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Build a `bscope` command with an isolated, empty config file.
#[allow(deprecated)]
fn bscope_cmd(dir: &TempDir) -> Command {
    let config = dir.path().join("bucketscope.toml");
    std::fs::write(&config, "[logging]\nlevel = \"warn\"\n").expect("write temp config");

    let mut cmd = Command::cargo_bin("bscope").expect("bscope binary should be built");
    cmd.env("BUCKETSCOPE_CONFIG", &config);
    cmd.env_remove("BUCKETSCOPE_ENDPOINT");
    cmd.env_remove("BUCKETSCOPE_ALGORITHM");
    cmd.env_remove("BUCKETSCOPE_LOG");
    cmd.env_remove("RUST_LOG");
    cmd
}

// =============================================================================
// Help and discovery
// =============================================================================

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    bscope_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("profiles"))
        .stdout(predicate::str::contains("configure"))
        .stdout(predicate::str::contains("visualize"));
}

#[test]
fn profiles_lists_both_algorithms() {
    let dir = TempDir::new().unwrap();
    bscope_cmd(&dir)
        .arg("profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("Token Bucket (token-bucket)"))
        .stdout(predicate::str::contains("Leaky Bucket (leaky-bucket)"))
        .stdout(predicate::str::contains("refillRate"))
        .stdout(predicate::str::contains("currentSize"));
}

#[test]
fn profiles_json_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    let output = bscope_cmd(&dir)
        .args(["profiles", "--json"])
        .output()
        .expect("bscope profiles --json should execute");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let profiles = parsed.as_array().expect("array of profiles");
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0]["kind"], "token-bucket");
    assert_eq!(profiles[1]["rate_parameter_name"], "leakRate");
}

// =============================================================================
// Failures that never reach the network
// =============================================================================

#[test]
fn invalid_capacity_fails_before_any_request() {
    let dir = TempDir::new().unwrap();
    bscope_cmd(&dir)
        // Nothing listens here; a request would surface as a network error.
        .args(["--endpoint", "http://127.0.0.1:9"])
        .args(["configure", "--capacity", "-1", "--rate", "2"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Please enter valid positive numbers for Capacity and Rate.",
        ))
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains("Network").not());
}

#[test]
fn unknown_algorithm_is_fatal() {
    let dir = TempDir::new().unwrap();
    bscope_cmd(&dir)
        .args(["--algorithm", "fixed-window", "configure", "--capacity", "5", "--rate", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown algorithm"))
        .stderr(predicate::str::contains("bscope profiles"));
}

#[test]
fn invalid_endpoint_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    bscope_cmd(&dir)
        .args(["--endpoint", "localhost:8888", "profiles"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("base_url"));
}

#[test]
fn missing_explicit_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    bscope_cmd(&dir)
        .arg("--config")
        .arg(&missing)
        .arg("profiles")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn unreachable_limiter_reports_network_error() {
    let dir = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    bscope_cmd(&dir)
        .args(["--endpoint", &format!("http://{addr}")])
        .args(["configure", "--capacity", "10", "--rate", "2"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Attempting to configure token-bucket on server..."))
        .stdout(predicate::str::contains("Network Error during configuration"))
        .stderr(predicate::str::contains("Network unavailable"));
}
