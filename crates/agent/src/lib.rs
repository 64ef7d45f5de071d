//! Autonomous task agent
//!
//! Routes tasks, then drives a summarize/generate/execute/check loop
//! against a model backend using built-in and external tools.

use thiserror::Error;

pub mod context;
pub mod loop_agent;
pub mod router;
pub mod sandbox;
pub mod state;
pub mod summarizer;
pub mod tools;

pub use context::{PromptBuilder, COMPLETION_SENTINEL};
pub use loop_agent::{AgentLoop, TaskOutcome};
pub use router::{Route, TaskRouter};
pub use sandbox::{ExecutionSandbox, SandboxRun};
pub use state::LoopState;
pub use summarizer::{ContextBudget, ContextSummarizer, SUMMARY_FAN_OUT};
pub use tools::{FailureReason, ToolOutcome, ToolRegistry, ToolTrait};

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("BACKEND FAILURE: {0}")]
    Provider(#[from] taskpilot_provider::ProviderError),

    #[error("AGENT I/O ERROR: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
