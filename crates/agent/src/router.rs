//! Task routing between plain conversation and the control loop

use std::sync::Arc;
use tracing::{debug, info};

use taskpilot_provider::{ChatParams, Message, Provider};

use crate::Result;

/// Where a task goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chat,
    Action,
}

/// Map the router's one-word reply to a route.
///
/// Anything that is not clearly CHAT is treated as an action.
pub fn classify(reply: &str) -> Route {
    let upper = reply.to_uppercase();
    if upper.contains("ACTION") {
        Route::Action
    } else if upper.contains("CHAT") {
        Route::Chat
    } else {
        Route::Action
    }
}

pub struct TaskRouter<P: Provider> {
    provider: Arc<P>,
    model: String,
    context_length: u32,
}

impl<P: Provider> TaskRouter<P> {
    pub fn new(provider: Arc<P>, model: impl Into<String>, context_length: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            context_length,
        }
    }

    fn params(&self, messages: Vec<Message>, temperature: f32) -> ChatParams {
        ChatParams {
            model: self.model.clone(),
            messages,
            context_length: self.context_length,
            temperature,
            ..Default::default()
        }
    }

    pub async fn route(&self, task: &str) -> Result<Route> {
        let messages = crate::context::PromptBuilder::router_messages(task);
        let response = self.provider.chat(self.params(messages, 0.0)).await?;
        debug!("Router replied: {}", response.text_content());
        let route = classify(response.text_content());
        info!("◆ ROUTE: {:?}", route);
        Ok(route)
    }

    /// Answer a conversational task directly
    pub async fn chat_reply(&self, messages: Vec<Message>, temperature: f32) -> Result<String> {
        let response = self.provider.chat(self.params(messages, temperature)).await?;
        Ok(response.text_content().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("CHAT"), Route::Chat);
        assert_eq!(classify("chat."), Route::Chat);
        assert_eq!(classify("ACTION"), Route::Action);
        assert_eq!(classify("CHAT or ACTION? ACTION"), Route::Action);
        assert_eq!(classify("I am not sure"), Route::Action);
        assert_eq!(classify(""), Route::Action);
    }
}
