//! Integration tests for the adw CLI
//!
//! These exercise argument handling, startup validation and state lookup
//! through the real binary. Agent, GitHub and git interactions are covered by
//! the unit tests with in-memory collaborators.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "CLAUDE_CODE_PATH",
    "ADW_MODEL",
    "ADW_AGENT_TIMEOUT_SECS",
    "GITHUB_REPO",
];

/// Helper to create an adw Command with a clean environment
fn adw() -> Command {
    let mut cmd = cargo_bin_cmd!("adw");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper to create an adw Command with the required agent environment set
fn adw_with_env() -> Command {
    let mut cmd = adw();
    cmd.env("ANTHROPIC_API_KEY", "sk-test")
        .env("CLAUDE_CODE_PATH", "/nonexistent/claude");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Write a state document the way a previous phase would have left it
fn write_state(dir: &TempDir, adw_id: &str, issue_ref: &str) {
    let run_dir = dir.path().join("agents").join(adw_id);
    fs::create_dir_all(&run_dir).unwrap();
    fs::write(
        run_dir.join("adw_state.json"),
        format!(
            r#"{{
  "adw_id": "{adw_id}",
  "issue_ref": "{issue_ref}",
  "issue_class": "/bug",
  "branch_name": "bug-issue-{issue_ref}-adw-{adw_id}-login",
  "version": 3,
  "saves": [],
  "notes": "kept by other tools"
}}"#
        ),
    )
    .unwrap();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_adw_help() {
        adw()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("plan"))
            .stdout(predicate::str::contains("review"));
    }

    #[test]
    fn test_adw_version() {
        adw().arg("--version").assert().success();
    }

    #[test]
    fn test_missing_subcommand_exits_1() {
        adw().assert().code(1);
    }

    #[test]
    fn test_missing_issue_number_exits_1() {
        adw().arg("plan").assert().code(1);
    }

    #[test]
    fn test_unknown_flag_exits_1() {
        adw().args(["run", "42", "--bogus"]).assert().code(1);
    }
}

// =============================================================================
// Startup validation
// =============================================================================

mod startup {
    use super::*;

    #[test]
    fn test_missing_env_is_fatal_before_state() {
        let dir = create_temp_project();

        adw()
            .args(["--project-dir", dir.path().to_str().unwrap(), "plan", "42"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("ANTHROPIC_API_KEY"))
            .stderr(predicate::str::contains("CLAUDE_CODE_PATH"));

        assert!(!dir.path().join("agents").exists());
    }

    #[test]
    fn test_env_file_supplies_required_variables() {
        let dir = create_temp_project();
        fs::write(
            dir.path().join(".env"),
            "ANTHROPIC_API_KEY=sk-test\nCLAUDE_CODE_PATH=/nonexistent/claude\n",
        )
        .unwrap();

        adw()
            .args(["--project-dir", dir.path().to_str().unwrap(), "build", "42", "deadbeef"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No workflow state found for deadbeef"))
            .stderr(predicate::str::contains("ANTHROPIC_API_KEY").not());
    }

    #[test]
    fn test_malformed_config_file_is_fatal() {
        let dir = create_temp_project();
        fs::write(dir.path().join("adw.toml"), "[agent\nmodel =").unwrap();

        adw_with_env()
            .args(["--project-dir", dir.path().to_str().unwrap(), "plan", "42"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("adw.toml"));
    }

    #[test]
    fn test_invalid_run_id_is_rejected() {
        let dir = create_temp_project();

        adw_with_env()
            .args(["--project-dir", dir.path().to_str().unwrap(), "plan", "42", "../escape"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Invalid workflow identifier"));

        assert!(!dir.path().join("escape").exists());
    }
}

// =============================================================================
// Phase preconditions
// =============================================================================

mod preconditions {
    use super::*;

    #[test]
    fn test_build_against_unknown_run_exits_1() {
        let dir = create_temp_project();

        adw_with_env()
            .args(["--project-dir", dir.path().to_str().unwrap(), "build", "42", "deadbeef"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No workflow state found for deadbeef"));

        assert!(!dir.path().join("agents").join("deadbeef").exists());
    }

    #[test]
    fn test_later_phase_without_run_id_exits_1() {
        let dir = create_temp_project();

        adw_with_env()
            .args(["--project-dir", dir.path().to_str().unwrap(), "test", "42"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("adw_id"));
    }

    #[test]
    fn test_run_id_from_other_issue_is_conflict() {
        let dir = create_temp_project();
        write_state(&dir, "abc12345", "7");

        adw_with_env()
            .args(["--project-dir", dir.path().to_str().unwrap(), "review", "42", "abc12345"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("belongs to issue 7"));
    }

    #[test]
    fn test_plan_with_run_id_from_other_issue_is_conflict() {
        let dir = create_temp_project();
        write_state(&dir, "abc12345", "7");

        adw_with_env()
            .args(["--project-dir", dir.path().to_str().unwrap(), "plan", "42", "abc12345"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("belongs to issue 7"));

        // The other issue's run directory gets no log for this attempt.
        assert!(!dir.path().join("agents").join("abc12345").join("adw_plan").exists());
        let state = fs::read_to_string(
            dir.path().join("agents").join("abc12345").join("adw_state.json"),
        )
        .unwrap();
        assert!(state.contains(r#""issue_ref": "7""#));
    }
}

// =============================================================================
// State inspection
// =============================================================================

mod state_inspection {
    use super::*;

    #[test]
    fn test_state_prints_document() {
        let dir = create_temp_project();
        write_state(&dir, "abc12345", "42");

        adw()
            .args(["--project-dir", dir.path().to_str().unwrap(), "state", "abc12345"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""adw_id": "abc12345""#))
            .stdout(predicate::str::contains(r#""issue_class": "/bug""#))
            .stdout(predicate::str::contains(r#""notes": "kept by other tools""#));
    }

    #[test]
    fn test_state_for_unknown_run_exits_1() {
        let dir = create_temp_project();

        adw()
            .args(["--project-dir", dir.path().to_str().unwrap(), "state", "feedface"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No workflow state found"));
    }

    #[test]
    fn test_corrupt_state_exits_1() {
        let dir = create_temp_project();
        let run_dir = dir.path().join("agents").join("abc12345");
        fs::create_dir_all(&run_dir).unwrap();
        fs::write(run_dir.join("adw_state.json"), "{\"adw_id\": \"abc1").unwrap();

        adw()
            .args(["--project-dir", dir.path().to_str().unwrap(), "state", "abc12345"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("not a valid workflow document"));
    }
}
