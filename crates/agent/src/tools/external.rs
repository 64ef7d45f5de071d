//! Tools advertised by external providers

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use taskpilot_mcp::{McpClient, ToolDefinition};

use super::{FailureReason, ToolOutcome, ToolTrait};

/// Forwards calls to the provider session that advertised the tool
pub struct ExternalTool {
    client: Arc<McpClient>,
    name: String,
    description: String,
    schema: Value,
}

impl ExternalTool {
    pub fn new(client: Arc<McpClient>, definition: ToolDefinition) -> Self {
        let description = definition
            .description
            .unwrap_or_else(|| format!("Tool provided by {}", client.name()));
        Self {
            client,
            name: definition.name,
            description,
            schema: definition.input_schema,
        }
    }

    pub fn provider(&self) -> &str {
        self.client.name()
    }
}

#[async_trait]
impl ToolTrait for ExternalTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn parameters(&self) -> Value {
        self.schema.clone()
    }
    async fn execute(&self, args: Value) -> ToolOutcome {
        debug!("Forwarding {} to provider {}", self.name, self.provider());
        match self.client.call_tool(&self.name, args).await {
            Ok(result) if result.is_error => {
                ToolOutcome::failure(FailureReason::External, result.text())
            }
            Ok(result) => ToolOutcome::success(result.text()),
            Err(e) => ToolOutcome::failure(
                FailureReason::External,
                format!("{} ({}): {}", self.name, self.provider(), e),
            ),
        }
    }
}
