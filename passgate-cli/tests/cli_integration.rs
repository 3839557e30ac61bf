//! CLI integration tests for passgate-cli.
//!
//! These tests run the actual binary and check outputs, exit codes and
//! file artifacts. None of them needs a running server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Port 1 on loopback refuses connections.
const UNREACHABLE: &str = "http://127.0.0.1:1";

/// Get a Command for the passgate binary.
fn passgate() -> Command {
    let mut cmd = Command::cargo_bin("passgate").unwrap();
    cmd.env_remove("PASSGATE_URL")
        .env_remove("PASSGATE_TOKEN_FILE")
        .env_remove("PASSGATE_ORIGIN")
        .env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    passgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Passwordless WebAuthn login"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("whoami"))
        .stdout(predicate::str::contains("logout"));
}

#[test]
fn test_version_displays_version() {
    passgate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("passgate"));
}

#[test]
fn test_help_shows_exit_codes() {
    passgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("69"));
}

#[test]
fn test_register_help_shows_options() {
    passgate()
        .args(["register", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("--display-name"))
        .stdout(predicate::str::contains("--token-file"));
}

// ============================================================================
// Usage Error Tests
// ============================================================================

#[test]
fn test_unknown_command_is_usage_error() {
    // Exit code 64 = EX_USAGE
    passgate().arg("enroll").assert().code(64);
}

#[test]
fn test_missing_name_is_usage_error() {
    passgate().arg("register").assert().code(64);
}

#[test]
fn test_invalid_url_is_usage_error() {
    passgate()
        .args(["--url", "ftp://example.com", "whoami"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("unsupported scheme"));
}

#[test]
fn test_verbose_conflicts_with_quiet() {
    passgate()
        .args(["--verbose", "--quiet", "token", "show"])
        .assert()
        .code(64);
}

// ============================================================================
// Token File Tests
// ============================================================================

#[test]
fn test_token_show_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let token = temp.path().join("absent.json");

    // Exit code 74 = EX_IOERR
    passgate()
        .args(["--token-file", token.to_str().unwrap(), "token", "show"])
        .assert()
        .code(74)
        .stderr(predicate::str::contains("Failed to read token file"));
}

#[test]
fn test_login_without_token_is_io_error() {
    let temp = TempDir::new().unwrap();
    let token = temp.path().join("absent.json");

    passgate()
        .args(["--url", UNREACHABLE, "--token-file", token.to_str().unwrap(), "login"])
        .assert()
        .code(74);
}

#[test]
fn test_corrupt_token_is_rejected() {
    let temp = TempDir::new().unwrap();
    let token = temp.path().join("token.json");
    fs::write(&token, b"not json").unwrap();

    passgate()
        .args(["--token-file", token.to_str().unwrap(), "token", "show"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Invalid token file"));
}

#[test]
fn test_token_show_empty_token() {
    let temp = TempDir::new().unwrap();
    let token = temp.path().join("token.json");
    fs::write(&token, r#"{"origin":"http://localhost:3000"}"#).unwrap();

    passgate()
        .args(["--token-file", token.to_str().unwrap(), "token", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://localhost:3000"))
        .stdout(predicate::str::contains("\"credentials\": []"));
}

// ============================================================================
// Server Unavailable Tests
// ============================================================================

#[test]
fn test_register_unreachable_server() {
    let temp = TempDir::new().unwrap();
    let token = temp.path().join("token.json");

    // Exit code 69 = EX_UNAVAILABLE
    passgate()
        .args(["--url", UNREACHABLE, "--token-file", token.to_str().unwrap()])
        .args(["register", "alice"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("server unavailable"));

    // Nothing was registered, so nothing was written
    assert!(!token.exists());
}

#[test]
fn test_whoami_unreachable_server() {
    let temp = TempDir::new().unwrap();
    let token = temp.path().join("token.json");

    passgate()
        .args(["--url", UNREACHABLE, "--token-file", token.to_str().unwrap(), "whoami"])
        .assert()
        .code(69);
}

#[test]
fn test_logout_without_session_succeeds() {
    let temp = TempDir::new().unwrap();
    let token = temp.path().join("token.json");

    passgate()
        .args(["--url", UNREACHABLE, "--token-file", token.to_str().unwrap(), "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No active session"));
}
