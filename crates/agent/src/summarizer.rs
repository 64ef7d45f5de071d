//! Context summarizer
//!
//! Compresses progress and error history into a bounded summary at the
//! top of every outer iteration.

use std::sync::Arc;
use tracing::{debug, info};

use taskpilot_provider::{ChatParams, Provider};

use crate::context::PromptBuilder;
use crate::Result;

/// Divisor applied to the context length for history slices
pub const SUMMARY_FAN_OUT: u32 = 4;

/// Character budgets derived from the backend context length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    /// Trailing characters of each log fed to the summarizer
    pub tail_chars: usize,
    /// Hard cap on the summary itself
    pub summary_chars: usize,
}

impl ContextBudget {
    pub fn from_context_length(context_length: u32) -> Self {
        Self {
            tail_chars: (context_length / SUMMARY_FAN_OUT).max(1) as usize,
            summary_chars: (context_length / (2 * SUMMARY_FAN_OUT)).max(1) as usize,
        }
    }
}

/// Last `chars` characters of `text`, cut on a char boundary
pub fn tail(text: &str, chars: usize) -> &str {
    let count = text.chars().count();
    if count <= chars {
        return text;
    }
    match text.char_indices().nth(count - chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// First `chars` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct ContextSummarizer<P: Provider> {
    provider: Arc<P>,
    model: String,
    budget: ContextBudget,
    context_length: u32,
    temperature: f32,
}

impl<P: Provider> ContextSummarizer<P> {
    pub fn new(provider: Arc<P>, model: impl Into<String>, context_length: u32, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            budget: ContextBudget::from_context_length(context_length),
            context_length,
            temperature,
        }
    }

    pub fn budget(&self) -> ContextBudget {
        self.budget
    }

    /// Produce the next summary. One backend call; never signals
    /// completion or failure on its own.
    pub async fn summarize(
        &self,
        progress_tail: &str,
        error_tail: &str,
        previous: &str,
    ) -> Result<String> {
        let messages = PromptBuilder::summary_messages(
            progress_tail,
            error_tail,
            previous,
            self.budget.summary_chars,
        );
        let params = ChatParams {
            model: self.model.clone(),
            messages,
            context_length: self.context_length,
            temperature: self.temperature,
            ..Default::default()
        };

        let response = self.provider.chat(params).await?;
        let raw = response.text_content().trim();
        let summary = truncate_chars(raw, self.budget.summary_chars).to_string();
        if summary.len() < raw.len() {
            debug!(
                "Summary truncated from {} to {} chars",
                raw.chars().count(),
                self.budget.summary_chars
            );
        }
        info!("◆ SUMMARY UPDATED ({} chars)", summary.chars().count());
        Ok(summary)
    }
}
