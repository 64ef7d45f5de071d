//! CLI tests for taskpilot

mod common;

use common::{fixture_provider, TestEnv, DEAD_HOST};
use predicates::prelude::*;

#[test]
fn test_help_flag() {
    let env = TestEnv::new().unwrap();
    env.command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Autonomous task agent"))
        .stdout(predicate::str::contains("--mcp"))
        .stdout(predicate::str::contains("--strategy"))
        .stdout(predicate::str::contains("--context-length"));
}

#[test]
fn test_version_flag() {
    let env = TestEnv::new().unwrap();
    env.command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_init_writes_default_config() {
    let env = TestEnv::new().unwrap();
    env.command().arg("--init").assert().success();

    let content = std::fs::read_to_string(env.config_file()).unwrap();
    assert!(content.contains("\"context_length\": 8192"));
    assert!(content.contains("\"interpreter\": \"python3\""));
}

#[test]
fn test_init_with_explicit_path() {
    let env = TestEnv::new().unwrap();
    let path = env.temp_dir.path().join("custom.json");

    env.command()
        .args(["--init", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.json"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"strategy\": \"tool-calling\""));
    assert!(!env.config_file().exists());
}

#[test]
fn test_init_keeps_existing_config() {
    let env = TestEnv::new().unwrap();
    let path = env.temp_dir.path().join("keep.json");
    std::fs::write(&path, "{\"backend\": {\"model\": \"mine\"}}").unwrap();

    env.command()
        .args(["--init", "--config"])
        .arg(&path)
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "{\"backend\": {\"model\": \"mine\"}}"
    );
}

#[test]
fn test_unknown_strategy_rejected() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--strategy", "telepathy", "do something"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("telepathy"));
}

#[test]
fn test_missing_config_file_fails() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--config", "does-not-exist.json", "do something"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG NOT FOUND"))
        .stderr(predicate::str::contains("does-not-exist.json"));
}

#[test]
fn test_invalid_context_length_fails() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--context-length", "100", "--host", DEAD_HOST, "do something"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("context_length"));
}

#[test]
fn test_single_shot_backend_failure_exits_nonzero() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--host", DEAD_HOST, "print hello"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("backend failure"));
}

#[test]
fn test_task_file_is_read() {
    let env = TestEnv::new().unwrap();
    std::fs::write(env.work_dir.join("task.txt"), "print hello").unwrap();

    // The backend is unreachable, so reading the file is the last thing that succeeds
    env.command()
        .args(["--host", DEAD_HOST, "-v", "task.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("READING TASK FROM task.txt"));
}

#[test]
fn test_interactive_exit() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--host", DEAD_HOST])
        .write_stdin("exit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Interactive mode"));
}

#[test]
fn test_interactive_end_of_input() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--host", DEAD_HOST])
        .write_stdin("")
        .assert()
        .success();
}

#[test]
fn test_interactive_survives_backend_failure() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--host", DEAD_HOST])
        .write_stdin("print hello\nexit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("TASK ABORTED"));
}

#[test]
fn test_unavailable_tool_provider_is_not_fatal() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args([
            "--host",
            DEAD_HOST,
            "--mcp",
            "definitely-not-a-real-binary-4242 --stdio",
        ])
        .write_stdin("exit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("UNAVAILABLE"));
}

#[test]
fn test_tool_provider_closed_on_exit() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--host", DEAD_HOST, "--mcp"])
        .arg(fixture_provider())
        .write_stdin("exit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("OFFERS 3 TOOLS"))
        .stderr(predicate::str::contains("CLOSING TOOL PROVIDER sh"));
}

#[test]
fn test_tool_provider_closed_after_backend_failure() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["--host", DEAD_HOST, "--mcp"])
        .arg(fixture_provider())
        .arg("print hello")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("backend failure"))
        .stderr(predicate::str::contains("CLOSING TOOL PROVIDER sh"));
}
