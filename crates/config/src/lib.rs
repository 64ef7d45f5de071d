//! Configuration management for taskpilot
//!
//! Loads and saves backend, loop and tool-provider settings from a JSON file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG I/O ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("CONFIG PARSE FAILED: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CONFIG NOT FOUND: {0}")]
    NotFound(PathBuf),

    #[error("INVALID SETTING: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Model backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_context_length")]
    pub context_length: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            context_length: default_context_length(),
            temperature: default_temperature(),
        }
    }
}

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:7b".to_string()
}

fn default_context_length() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.2
}

/// How the loop turns a model reply into an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// The model acts only through registered tools
    #[default]
    ToolCalling,
    /// The model emits a code segment that the sandbox executes
    CodeEmission,
}

impl std::str::FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tool-calling" | "tools" => Ok(Strategy::ToolCalling),
            "code-emission" | "code" => Ok(Strategy::CodeEmission),
            other => Err(ConfigError::Invalid(format!("unknown strategy '{}'", other))),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::ToolCalling => write!(f, "tool-calling"),
            Strategy::CodeEmission => write!(f, "code-emission"),
        }
    }
}

/// Control loop limits and execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_sandbox_timeout")]
    pub sandbox_timeout_secs: u64,
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_iterations: default_max_iterations(),
            max_tool_rounds: default_max_tool_rounds(),
            max_consecutive_failures: default_max_consecutive_failures(),
            command_timeout_secs: default_command_timeout(),
            sandbox_timeout_secs: default_sandbox_timeout(),
            interpreter: default_interpreter(),
        }
    }
}

fn default_max_iterations() -> u32 {
    50
}

fn default_max_tool_rounds() -> u32 {
    25
}

fn default_max_consecutive_failures() -> u32 {
    8
}

fn default_command_timeout() -> u64 {
    60
}

fn default_sandbox_timeout() -> u64 {
    30
}

fn default_interpreter() -> String {
    "python3".to_string()
}

/// External tool provider launched over stdio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl McpServerConfig {
    /// Parse a literal command line such as `npx -y some-server .`
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let command = parts.next()?;
        Some(Self {
            command,
            args: parts.collect(),
            env: HashMap::new(),
        })
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub host: Option<String>,
    pub context_length: Option<u32>,
    pub strategy: Option<Strategy>,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ NO CONFIG AT {:?}, USING DEFAULTS", path);
            return Ok(Config::default());
        }

        debug!("◆ LOADING CONFIG FROM {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a file the caller named explicitly; a missing file is an error
    pub async fn load_required(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::load_from(path).await
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ WRITING CONFIG TO {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.backend.context_length < 512 {
            return Err(ConfigError::Invalid(format!(
                "context_length {} is below the 512 minimum",
                self.backend.context_length
            )));
        }
        if self.backend.host.trim().is_empty() {
            return Err(ConfigError::Invalid("backend host is empty".to_string()));
        }
        if self.agent.max_iterations == 0
            || self.agent.max_tool_rounds == 0
            || self.agent.max_consecutive_failures == 0
        {
            return Err(ConfigError::Invalid(
                "loop limits must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(model) = overrides.model {
            self.backend.model = model;
        }
        if let Some(host) = overrides.host {
            self.backend.host = host;
        }
        if let Some(context_length) = overrides.context_length {
            self.backend.context_length = context_length;
        }
        if let Some(strategy) = overrides.strategy {
            self.agent.strategy = strategy;
        }
        self.validate()
    }

    /// Resolve a `--mcp` selector to a server definition.
    ///
    /// A selector naming an entry of `mcp_servers` wins; anything else is
    /// treated as a literal command line.
    pub fn resolve_mcp(&self, selector: &str) -> Option<(String, McpServerConfig)> {
        if let Some(server) = self.mcp_servers.get(selector) {
            return Some((selector.to_string(), server.clone()));
        }
        let server = McpServerConfig::from_command_line(selector)?;
        let name = Path::new(&server.command)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| server.command.clone());
        Some((name, server))
    }
}

/// Write the default config file if none exists
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("◆ CONFIG ALREADY PRESENT AT {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("◆ CONFIG WRITTEN TO {:?}", config_path);
    }

    Config::load().await
}
