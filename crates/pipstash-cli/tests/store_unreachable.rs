//! Store-backed commands against a connection that cannot be established.
//! Port 1 on localhost refuses immediately, so these run without a server.

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;

const DEAD_STORE: &str = "redis://127.0.0.1:1/0";

fn json_stdout(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).expect("json envelope on stdout")
}

#[test]
fn signup_reports_store_unavailable() {
    let assert = cargo_bin_cmd!("pipstash")
        .env("PIPSTASH_REDIS_URL", DEAD_STORE)
        .env("PIPSTASH_PASSWORD", "pw")
        .args(["--json", "signup", "alice"])
        .assert()
        .code(2);

    let payload = json_stdout(&assert.get_output().stdout);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["details"]["reason"], "store_unavailable");
}

#[test]
fn upload_reports_store_unavailable_before_reading_a_password() {
    // No PIPSTASH_PASSWORD here: the connection fails before any prompt.
    let assert = cargo_bin_cmd!("pipstash")
        .env("PIPSTASH_REDIS_URL", DEAD_STORE)
        .env_remove("PIPSTASH_PASSWORD")
        .args(["--json", "upload", "alice"])
        .assert()
        .code(2);

    let payload = json_stdout(&assert.get_output().stdout);
    assert_eq!(payload["command"], "upload");
    assert_eq!(payload["status"], "error");
}

#[test]
fn quiet_mode_reports_failures_on_stderr() {
    let assert = cargo_bin_cmd!("pipstash")
        .env("PIPSTASH_REDIS_URL", DEAD_STORE)
        .env("PIPSTASH_PASSWORD", "pw")
        .args(["--quiet", "signup", "alice"])
        .assert()
        .code(2);

    let output = assert.get_output();
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[PS300]"), "stderr was: {stderr}");
}

#[test]
fn restore_reports_store_unavailable() {
    let assert = cargo_bin_cmd!("pipstash")
        .env("PIPSTASH_REDIS_URL", DEAD_STORE)
        .env("PIPSTASH_PASSWORD", "pw")
        .args(["--json", "restore", "alice", "requests"])
        .assert()
        .code(2);

    let payload = json_stdout(&assert.get_output().stdout);
    assert_eq!(payload["status"], "error");
}
