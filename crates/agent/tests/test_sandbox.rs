//! Tests for the execution sandbox

use std::fs;
use std::path::Path;
use std::time::Duration;
use taskpilot_agent::ExecutionSandbox;
use tempfile::TempDir;

fn leftover_scripts(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("taskpilot-"))
        .count()
}

fn sandbox(work: &TempDir, scratch: &TempDir, timeout_secs: u64) -> ExecutionSandbox {
    ExecutionSandbox::new("sh", Duration::from_secs(timeout_secs), work.path())
        .with_scratch_dir(scratch.path())
}

#[tokio::test]
async fn test_success_output_and_cleanup() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let run = sandbox(&work, &scratch, 10)
        .run("echo 'Hello, World!'")
        .await;

    assert!(run.succeeded);
    assert_eq!(run.output.trim(), "Hello, World!");
    assert_eq!(leftover_scripts(scratch.path()), 0);
}

#[tokio::test]
async fn test_failure_combines_streams_and_cleans_up() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let run = sandbox(&work, &scratch, 10)
        .run("echo out\necho err >&2\nexit 4")
        .await;

    assert!(!run.succeeded);
    assert!(run.output.contains("out"));
    assert!(run.output.contains("err"));
    assert!(run.output.contains("EXIT CODE: 4"));
    assert_eq!(leftover_scripts(scratch.path()), 0);
}

#[tokio::test]
async fn test_timeout_is_distinct_and_cleans_up() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let run = sandbox(&work, &scratch, 1).run("sleep 5").await;

    assert!(!run.succeeded);
    assert!(run.output.starts_with("TIMEOUT"));
    assert_eq!(leftover_scripts(scratch.path()), 0);
}

#[tokio::test]
async fn test_empty_output_is_success() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let run = sandbox(&work, &scratch, 10).run("true").await;

    assert!(run.succeeded);
    assert_eq!(run.output, "(no output)");
}

#[tokio::test]
async fn test_runs_in_work_dir() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let run = sandbox(&work, &scratch, 10)
        .run("echo made > created.txt")
        .await;

    assert!(run.succeeded);
    assert_eq!(
        fs::read_to_string(work.path().join("created.txt")).unwrap(),
        "made\n"
    );
}

#[tokio::test]
async fn test_missing_interpreter_fails() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let sandbox = ExecutionSandbox::new(
        "definitely-not-an-interpreter",
        Duration::from_secs(5),
        work.path(),
    )
    .with_scratch_dir(scratch.path());

    let run = sandbox.run("print(1)").await;

    assert!(!run.succeeded);
    assert!(run.output.contains("failed to start"));
    assert_eq!(leftover_scripts(scratch.path()), 0);
}
