//! Built-in shell tool

use async_trait::async_trait;
use regex::RegexSet;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{parse_args, FailureReason, ToolOutcome, ToolTrait};

const MAX_OUTPUT_BYTES: usize = 10_000;

const BLOCKED_PATTERNS: &[&str] = &[
    // rm with flags aimed at / or ~
    r"\brm\s+(-\S+\s+)+(/|~|\$HOME)/?\*?(\s|;|$)",
    r"\bmkfs(\.\w+)?\b",
    r"\bdd\b.*\bof=/dev/(sd|hd|nvme|xvd|vd|mmcblk|disk)",
    r":\s*\(\s*\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    r"(^|[;&|]\s*)(sudo\s+)?(shutdown|reboot|halt|poweroff)\b",
    r">\s*/dev/(sd|hd|nvme|xvd|vd|mmcblk)[a-z0-9]*",
    r"\bchmod\s+-R\s+0?777\s+/(\s|$)",
];

fn blocked_commands() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(BLOCKED_PATTERNS).expect("blocked command patterns are valid"))
}

/// Whether a command matches the catastrophic-command guard
pub fn is_blocked(command: &str) -> bool {
    blocked_commands().is_match(command.trim())
}

/// Run a shell command in the working directory
pub struct RunTerminalCommandTool {
    root: PathBuf,
    timeout_secs: u64,
}

impl RunTerminalCommandTool {
    pub fn new(root: PathBuf, timeout_secs: u64) -> Self {
        Self { root, timeout_secs }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RunTerminalCommandArgs {
    command: String,
}

fn truncate_output(mut text: String) -> String {
    if text.len() <= MAX_OUTPUT_BYTES {
        return text;
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let remaining = text.len() - cut;
    text.truncate(cut);
    format!("{}\n[OUTPUT TRUNCATED: {} BYTES REMAINING]", text, remaining)
}

#[async_trait]
impl ToolTrait for RunTerminalCommandTool {
    fn name(&self) -> &str {
        "run_terminal_command"
    }
    fn description(&self) -> &str {
        "Run a shell command in the working directory and return its output. \
         Never start servers, GUIs or commands that do not terminate."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Command line passed to sh -c" }
            },
            "required": ["command"]
        })
    }
    async fn execute(&self, args: Value) -> ToolOutcome {
        let args: RunTerminalCommandArgs = match parse_args(self.name(), args) {
            Ok(args) => args,
            Err(outcome) => return outcome,
        };

        if is_blocked(&args.command) {
            warn!("◆ BLOCKED COMMAND: {}", args.command);
            return ToolOutcome::failure(
                FailureReason::Blocked,
                format!("refusing to run '{}'", args.command),
            );
        }

        debug!("Executing: {}", args.command);
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&args.command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolOutcome::failure(
                    FailureReason::Io,
                    format!("failed to start command: {}", e),
                )
            }
            Err(_) => {
                return ToolOutcome::failure(
                    FailureReason::Timeout(self.timeout_secs),
                    format!(
                        "TIMEOUT: '{}' did not finish within {} seconds",
                        args.command, self.timeout_secs
                    ),
                )
            }
        };

        let mut parts = Vec::new();
        if !output.stdout.is_empty() {
            parts.push(String::from_utf8_lossy(&output.stdout).to_string());
        }
        if !output.stderr.is_empty() {
            parts.push(format!(
                "STDERR:\n{}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        if output.status.success() {
            let text = if parts.is_empty() {
                "(no output)".to_string()
            } else {
                parts.join("\n")
            };
            return ToolOutcome::success(truncate_output(text));
        }

        let code = output.status.code().unwrap_or(-1);
        parts.push(format!("EXIT CODE: {}", code));
        ToolOutcome::failure(
            FailureReason::NonZeroExit(code),
            truncate_output(parts.join("\n")),
        )
    }
}
