//! Model backend contract
//!
//! Role-tagged messages, tool schemas and the `Provider` trait the agent
//! loop drives, plus an Ollama-compatible HTTP backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use thiserror::Error;
use tracing::{debug, trace};

pub mod ollama;

pub use ollama::OllamaProvider;

/// Backend errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("BACKEND UNREACHABLE: {0}")]
    Request(#[from] reqwest::Error),

    #[error("MALFORMED PAYLOAD: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BACKEND REJECTED: {0}")]
    Api(String),

    #[error("CORRUPTED RESPONSE")]
    InvalidResponse,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Backend response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: Usage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Textual content, empty when the backend sent none
    pub fn text_content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    pub fn with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            tool_calls,
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        }
    }
}

/// Token accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Conversation entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDef>>,
    /// Tool name a `tool` message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn tool(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::with_role(Role::Tool, result)
        }
    }
}

/// Tool call echoed back inside an assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDef {
    pub function: FunctionCall,
}

impl ToolCallDef {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

impl From<&ToolCall> for ToolCallDef {
    fn from(call: &ToolCall) -> Self {
        Self::new(&call.name, call.arguments.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// Tool specification advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Request parameters
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    /// Context window the backend should allocate, in tokens
    pub context_length: u32,
    pub temperature: f32,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            tools: Vec::new(),
            context_length: 8192,
            temperature: 0.2,
        }
    }
}

impl ChatParams {
    /// Content of the first system message, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message, if any
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Language-model backend
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse>;
    fn default_model(&self) -> String;
}

/// Log a request summary before it leaves the process
pub(crate) fn log_request(params: &ChatParams) {
    debug!(
        "◆ BACKEND REQUEST: model={} messages={} tools={} num_ctx={}",
        params.model,
        params.messages.len(),
        params.tools.len(),
        params.context_length
    );
    for message in &params.messages {
        trace!("  [{:?}] {}", message.role, message.content);
    }
}
