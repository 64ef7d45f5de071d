//! Execution sandbox for generated code segments

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of running one code segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRun {
    pub succeeded: bool,
    pub output: String,
}

/// Removes the script file when dropped
struct TempScript {
    path: PathBuf,
}

impl TempScript {
    async fn write(&self, code: &str) -> std::io::Result<()> {
        tokio::fs::write(&self.path, code).await
    }
}

impl Drop for TempScript {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {:?}: {}", self.path, e);
            }
        }
    }
}

/// Runs code with an interpreter as a fresh child process
pub struct ExecutionSandbox {
    interpreter: String,
    timeout: Duration,
    work_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl ExecutionSandbox {
    pub fn new(interpreter: impl Into<String>, timeout: Duration, work_dir: impl AsRef<Path>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            work_dir: work_dir.as_ref().to_path_buf(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Place temporary scripts somewhere other than the system temp dir
    pub fn with_scratch_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.scratch_dir = dir.as_ref().to_path_buf();
        self
    }

    fn extension(&self) -> &'static str {
        let program = Path::new(&self.interpreter)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match program.as_str() {
            p if p.starts_with("python") => "py",
            "sh" | "bash" | "zsh" | "dash" => "sh",
            "node" | "nodejs" => "js",
            _ => "txt",
        }
    }

    /// Write `code` to a uniquely named file and execute it.
    ///
    /// The file is removed on every exit path. Failing to spawn the
    /// interpreter counts as a failed run, not an error.
    pub async fn run(&self, code: &str) -> SandboxRun {
        let path = self
            .scratch_dir
            .join(format!("taskpilot-{}.{}", Uuid::new_v4(), self.extension()));

        // Armed before the write: a failed write can still leave a partial file
        let script = TempScript { path: path.clone() };
        if let Err(e) = script.write(code).await {
            return SandboxRun {
                succeeded: false,
                output: format!("failed to write script {}: {}", path.display(), e),
            };
        }

        info!("◆ RUNNING SEGMENT WITH {}", self.interpreter);
        debug!("Script {:?}:\n{}", path, code);

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&path)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return SandboxRun {
                    succeeded: false,
                    output: format!("failed to start {}: {}", self.interpreter, e),
                }
            }
            Err(_) => {
                return SandboxRun {
                    succeeded: false,
                    output: format!(
                        "TIMEOUT: execution exceeded {} seconds and was killed",
                        self.timeout.as_secs()
                    ),
                }
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if output.status.success() {
            let output = if combined.trim().is_empty() {
                "(no output)".to_string()
            } else {
                combined
            };
            SandboxRun {
                succeeded: true,
                output,
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&format!("EXIT CODE: {}", code));
            SandboxRun {
                succeeded: false,
                output: combined,
            }
        }
    }
}
