//! Stdio transport
//!
//! Newline-delimited JSON over a spawned child's stdin/stdout.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, trace};

use crate::{McpError, Result};

/// Child process speaking newline-delimited JSON-RPC
pub struct StdioTransport {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    child: Child,
}

impl StdioTransport {
    /// Spawn a tool-provider process
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: &Path,
    ) -> Result<Self> {
        info!("◆ SPAWNING TOOL PROVIDER: {} {:?}", command, args);
        for key in env.keys() {
            debug!("  env {}=<set>", key);
        }

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .current_dir(working_dir)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::Spawn {
            command: command.to_string(),
            source: e,
        })?;

        let stdin = child.stdin.take().ok_or(McpError::Closed)?;
        let stdout = child.stdout.take().ok_or(McpError::Closed)?;

        Ok(Self {
            stdin,
            stdout: BufReader::new(stdout),
            child,
        })
    }

    /// Write one message followed by a newline
    pub async fn send(&mut self, message: &str) -> Result<()> {
        self.stdin.write_all(message.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        trace!("→ {}", message);
        Ok(())
    }

    /// Read the next JSON line, skipping blank and non-JSON output
    pub async fn receive(&mut self) -> Result<String> {
        loop {
            let mut line = String::new();
            let bytes = self.stdout.read_line(&mut line).await?;
            if bytes == 0 {
                return Err(McpError::Closed);
            }

            let line = line.trim();
            if line.starts_with('{') {
                trace!("← {}", line);
                return Ok(line.to_string());
            }
            if !line.is_empty() {
                debug!("Skipping non-JSON line: {}", line);
            }
        }
    }

    /// Close stdin and wait for the process, killing it if it lingers
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.stdin.shutdown().await;
        drop(self.stdin);
        match tokio::time::timeout(std::time::Duration::from_secs(2), self.child.wait()).await {
            Ok(status) => {
                debug!("Tool provider exited with {}", status?);
            }
            Err(_) => {
                debug!("Tool provider did not exit, killing");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}
