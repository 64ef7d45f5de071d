//! External tool-provider client
//!
//! Speaks MCP (JSON-RPC 2.0) to a child process over newline-delimited stdio.

use thiserror::Error;

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::McpClient;
pub use protocol::{Content, ToolCallResult, ToolDefinition};

/// Tool-provider errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("FAILED TO SPAWN '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PROVIDER I/O ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("MALFORMED MESSAGE: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PROVIDER ERROR {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("PROVIDER TIMED OUT AFTER {0}s")]
    Timeout(u64),

    #[error("PROVIDER CONNECTION CLOSED")]
    Closed,
}

pub type Result<T> = std::result::Result<T, McpError>;
