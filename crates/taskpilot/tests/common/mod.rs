//! Common test utilities for taskpilot CLI tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Backend address nothing listens on
pub const DEAD_HOST: &str = "http://127.0.0.1:9";

/// `--mcp` selector launching the scripted tool provider fixture
pub fn fixture_provider() -> String {
    let script = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("mcp")
        .join("tests")
        .join("fixtures")
        .join("fake_server.sh");
    format!("sh {}", script.display())
}

/// Isolated home and working directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub home_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let home_dir = temp_dir.path().join("home");
        let work_dir = temp_dir.path().join("work");
        std::fs::create_dir_all(&home_dir)?;
        std::fs::create_dir_all(&work_dir)?;

        Ok(Self {
            temp_dir,
            home_dir,
            work_dir,
        })
    }

    /// Default config location under the isolated home
    pub fn config_file(&self) -> PathBuf {
        self.home_dir.join(".taskpilot").join("config.json")
    }

    /// Command with HOME and cwd pointed into the sandbox
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_taskpilot"));
        cmd.env("HOME", &self.home_dir)
            .env_remove("RUST_LOG")
            .current_dir(&self.work_dir);
        cmd
    }
}
