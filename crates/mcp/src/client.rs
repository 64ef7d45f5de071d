//! Tool-provider session
//!
//! One request is in flight at a time; replies are matched by id and
//! server notifications in between are skipped.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::protocol::{
    ClientInfo, InitializeParams, InitializeResult, RpcMessage, RpcNotification, RpcRequest,
    ToolCallParams, ToolCallResult, ToolDefinition, ToolsListResult, PROTOCOL_VERSION,
};
use crate::transport::StdioTransport;
use crate::{McpError, Result};

const REQUEST_TIMEOUT_SECS: u64 = 30;

struct Session {
    transport: StdioTransport,
    next_id: i64,
}

/// Connected tool provider
pub struct McpClient {
    name: String,
    session: Mutex<Option<Session>>,
    timeout: Duration,
}

impl McpClient {
    /// Spawn the provider process and perform the initialize handshake
    pub async fn connect(
        name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: &Path,
    ) -> Result<Self> {
        let transport = StdioTransport::spawn(command, args, env, working_dir)?;
        let client = Self {
            name: name.to_string(),
            session: Mutex::new(Some(Session {
                transport,
                next_id: 1,
            })),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        };
        client.initialize().await?;
        Ok(client)
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<()> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: "taskpilot".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result: InitializeResult = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;

        let server = result
            .server_info
            .map(|s| format!("{} {}", s.name, s.version.unwrap_or_default()))
            .unwrap_or_else(|| "unknown server".to_string());
        info!(
            "◆ TOOL PROVIDER {} READY ({}, protocol {})",
            self.name,
            server.trim(),
            result.protocol_version.as_deref().unwrap_or("?")
        );

        self.notify("notifications/initialized", None).await
    }

    /// List the tools this provider exposes
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let result: ToolsListResult = self.request("tools/list", None).await?;
        info!("◆ TOOL PROVIDER {} OFFERS {} TOOLS", self.name, result.tools.len());
        Ok(result.tools)
    }

    /// Invoke a tool by name
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let arguments = if arguments.is_null() {
            serde_json::json!({})
        } else {
            arguments
        };
        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        self.request("tools/call", Some(serde_json::to_value(params)?))
            .await
    }

    /// End the session; later calls fail with `Closed`
    pub async fn close(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        match session {
            Some(session) => {
                info!("◆ CLOSING TOOL PROVIDER {}", self.name);
                session.transport.shutdown().await
            }
            None => Ok(()),
        }
    }

    async fn request<R: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<R> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(McpError::Closed)?;

        let id = session.next_id;
        session.next_id += 1;
        let json = serde_json::to_string(&RpcRequest::new(id, method, params))?;
        debug!("MCP {} request [{}]: {}", self.name, id, method);

        session.transport.send(&json).await?;

        let reply = tokio::time::timeout(self.timeout, Self::await_reply(session, id)).await;
        let message = match reply {
            Ok(message) => message?,
            Err(_) => {
                warn!("MCP {} request [{}] timed out", self.name, id);
                return Err(McpError::Timeout(self.timeout.as_secs()));
            }
        };

        if let Some(error) = message.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(serde_json::from_value(message.result.unwrap_or(Value::Null))?)
    }

    async fn await_reply(session: &mut Session, id: i64) -> Result<RpcMessage> {
        loop {
            let line = session.transport.receive().await?;
            let message: RpcMessage = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    debug!("Ignoring unparsable message: {}", e);
                    continue;
                }
            };
            if let Some(method) = &message.method {
                debug!("MCP server message: {}", method);
                continue;
            }
            match message.id {
                Some(reply_id) if reply_id == id => return Ok(message),
                Some(other) => debug!("Ignoring reply to stale request {}", other),
                None => debug!("Ignoring message without id"),
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(McpError::Closed)?;
        let json = serde_json::to_string(&RpcNotification::new(method, params))?;
        session.transport.send(&json).await
    }
}
