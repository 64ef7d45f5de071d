//! Tool registry and dispatch
//!
//! Built-in file and shell tools plus whatever external providers
//! advertise, behind one name-keyed dispatch entry point.

pub mod external;
pub mod filesystem;
pub mod path_utils;
pub mod shell;

pub use external::ExternalTool;
pub use filesystem::{ReadFileTool, SearchAndReplaceTool, WriteFileTool};
pub use shell::RunTerminalCommandTool;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use taskpilot_config::McpServerConfig;
use taskpilot_mcp::McpClient;
use taskpilot_provider::Tool;

/// Why a tool invocation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    NotFound,
    InvalidArguments,
    Io,
    NonZeroExit(i32),
    Timeout(u64),
    Blocked,
    SearchNotFound,
    External,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NotFound => write!(f, "tool not found"),
            FailureReason::InvalidArguments => write!(f, "invalid arguments"),
            FailureReason::Io => write!(f, "i/o error"),
            FailureReason::NonZeroExit(code) => write!(f, "exit code {}", code),
            FailureReason::Timeout(secs) => write!(f, "timed out after {}s", secs),
            FailureReason::Blocked => write!(f, "blocked command"),
            FailureReason::SearchNotFound => write!(f, "search text not found"),
            FailureReason::External => write!(f, "tool provider error"),
        }
    }
}

/// Result of dispatching one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success { output: String },
    Failure { reason: FailureReason, detail: String },
}

impl ToolOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        ToolOutcome::Success {
            output: output.into(),
        }
    }

    pub fn failure(reason: FailureReason, detail: impl Into<String>) -> Self {
        ToolOutcome::Failure {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }

    /// Text fed back to the model as the tool message
    pub fn to_message_text(&self) -> String {
        match self {
            ToolOutcome::Success { output } if output.trim().is_empty() => {
                "(no output)".to_string()
            }
            ToolOutcome::Success { output } => output.clone(),
            ToolOutcome::Failure { reason, detail } if detail.trim().is_empty() => {
                format!("ERROR ({})", reason)
            }
            ToolOutcome::Failure { reason, detail } => format!("ERROR ({}): {}", reason, detail),
        }
    }
}

/// A callable capability
#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> ToolOutcome;
}

type BoxedTool = Box<dyn ToolTrait + Send + Sync>;

pub fn to_provider_tool(tool: &dyn ToolTrait) -> Tool {
    Tool::new(tool.name(), tool.description(), tool.parameters())
}

/// Deserialize tool arguments into the typed payload for that tool.
///
/// A missing argument object is treated as `{}` so required-field errors
/// name the field rather than complaining about `null`.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolOutcome> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| {
        ToolOutcome::failure(
            FailureReason::InvalidArguments,
            format!("{}: {}", tool, e),
        )
    })
}

/// Name-keyed tool catalogue
pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
    providers: Vec<Arc<McpClient>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            providers: Vec::new(),
        }
    }

    /// Registry holding the four built-in tools rooted at `root`
    pub fn with_builtins(root: impl AsRef<Path>, command_timeout_secs: u64) -> Self {
        let root: PathBuf = root.as_ref().to_path_buf();
        let mut registry = Self::new();
        registry.register(ReadFileTool::new(root.clone()));
        registry.register(WriteFileTool::new(root.clone()));
        registry.register(SearchAndReplaceTool::new(root.clone()));
        registry.register(RunTerminalCommandTool::new(root, command_timeout_secs));
        registry
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Box::new(tool));
    }

    /// Register unless the name is already taken; returns whether it was added
    pub fn register_if_absent<T: ToolTrait + 'static>(&mut self, tool: T) -> bool {
        if self.tools.contains_key(tool.name()) {
            return false;
        }
        self.register(tool);
        true
    }

    /// Connect each external provider and register the tools it lists.
    ///
    /// Providers that fail to start or list tools are logged and skipped.
    pub async fn connect_providers(
        &mut self,
        servers: &[(String, McpServerConfig)],
        working_dir: &Path,
    ) {
        for (name, server) in servers {
            let client = match McpClient::connect(
                name,
                &server.command,
                &server.args,
                &server.env,
                working_dir,
            )
            .await
            {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!("◆ TOOL PROVIDER {} UNAVAILABLE, SKIPPING: {}", name, e);
                    continue;
                }
            };

            match client.list_tools().await {
                Ok(definitions) => {
                    for definition in definitions {
                        let tool_name = definition.name.clone();
                        let tool = ExternalTool::new(Arc::clone(&client), definition);
                        if self.register_if_absent(tool) {
                            debug!("Registered external tool {} from {}", tool_name, name);
                        } else {
                            warn!(
                                "◆ TOOL {} FROM {} SHADOWED BY EXISTING TOOL",
                                tool_name, name
                            );
                        }
                    }
                    self.providers.push(client);
                }
                Err(e) => {
                    warn!("◆ TOOL PROVIDER {} FAILED TO LIST TOOLS: {}", name, e);
                    if let Err(e) = client.close().await {
                        debug!("Closing {} failed: {}", name, e);
                    }
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&(dyn ToolTrait + Send + Sync)> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool schemas, sorted by name
    pub fn definitions(&self) -> Vec<Tool> {
        let mut definitions: Vec<Tool> = self
            .tools
            .values()
            .map(|t| to_provider_tool(t.as_ref()))
            .collect();
        definitions.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        definitions
    }

    /// Tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Run the named tool; unknown names are a recoverable failure
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            warn!("◆ UNKNOWN TOOL REQUESTED: {}", name);
            return ToolOutcome::failure(
                FailureReason::NotFound,
                format!(
                    "tool '{}' not found; available tools: {}",
                    name,
                    self.names().join(", ")
                ),
            );
        };

        info!("◆ TOOL: {}", name);
        debug!("  args: {}", args);
        let outcome = tool.execute(args).await;
        match &outcome {
            ToolOutcome::Success { output } => debug!("  ok ({} bytes)", output.len()),
            ToolOutcome::Failure { reason, .. } => info!("  {} failed: {}", name, reason),
        }
        outcome
    }

    /// Close every external provider session
    pub async fn shutdown(&self) {
        for client in &self.providers {
            if let Err(e) = client.close().await {
                warn!("◆ FAILED TO CLOSE TOOL PROVIDER {}: {}", client.name(), e);
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
