//! Ollama-compatible backend
//!
//! Talks to `POST {host}/api/chat` with streaming disabled.

use crate::*;
use reqwest::Client;
use serde_json::json;

/// HTTP backend speaking the Ollama chat protocol
pub struct OllamaProvider {
    client: Client,
    host: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(host: impl Into<String>, default_model: impl Into<String>) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            host,
            default_model: default_model.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| {
                let mut obj = json!({ "role": m.role, "content": &m.content });
                if let Some(tool_calls) = &m.tool_calls {
                    obj["tool_calls"] = json!(tool_calls);
                }
                if let Some(name) = &m.name {
                    obj["tool_name"] = json!(name);
                }
                obj
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": {
                "num_ctx": params.context_length,
                "temperature": params.temperature,
            },
        });

        if !params.tools.is_empty() {
            body["tools"] = json!(params.tools);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let message = json
            .get("message")
            .filter(|m| m.is_object())
            .ok_or(ProviderError::InvalidResponse)?;

        let content = message["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let finish_reason = json["done_reason"].as_str().unwrap_or("stop").to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for (index, call) in calls.iter().enumerate() {
                let function = &call["function"];
                let name = function["name"]
                    .as_str()
                    .ok_or(ProviderError::InvalidResponse)?;
                // Some models send arguments as an encoded JSON string
                let arguments = function["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| function["arguments"].clone());

                tool_calls.push(ToolCall {
                    id: call["id"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{}", index)),
                    name: name.to_string(),
                    arguments,
                });
            }
        }

        let prompt_tokens = json["prompt_eval_count"].as_u64().unwrap_or(0) as u32;
        let completion_tokens = json["eval_count"].as_u64().unwrap_or(0) as u32;

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        })
    }
}

#[async_trait::async_trait]
impl Provider for OllamaProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        trace!("◆ CONNECTING TO BACKEND AT {}", self.host);
        log_request(&params);

        let url = format!("{}/api/chat", self.host);
        let body = self.build_request(&params);

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let error = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ProviderError::Api(error));
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let response = self.parse_response(json)?;

        debug!(
            "◆ BACKEND RESPONSE: {} TOOL CALLS, {} TOKENS",
            response.tool_calls.len(),
            response.usage.total_tokens
        );

        Ok(response)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }
}
