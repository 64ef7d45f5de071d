//! Control loop: summarize, generate, execute, check

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use taskpilot_config::{AgentSettings, Config, Strategy};
use taskpilot_provider::{ChatParams, Message, Provider, ToolCallDef};

use crate::context::{contains_sentinel, extract_code_segment, is_affirmative, PromptBuilder};
use crate::router::{Route, TaskRouter};
use crate::sandbox::ExecutionSandbox;
use crate::state::LoopState;
use crate::summarizer::{truncate_chars, ContextSummarizer};
use crate::tools::{ToolOutcome, ToolRegistry};
use crate::Result;

const ENTRY_PREVIEW_CHARS: usize = 400;

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Chat { reply: String },
    Completed { iterations: u32, summary: String },
    GaveUp { iterations: u32, reason: String },
}

/// What one generation turn did
#[derive(Debug, Clone, PartialEq, Eq)]
enum IterationOutcome {
    Succeeded(String),
    Failed(String),
    Idle,
}

struct Turn {
    outcome: IterationOutcome,
    /// The sentinel was emitted and honored
    finished: bool,
    last_output: String,
}

/// Drives a task to completion against a model backend
pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    tools: ToolRegistry,
    prompts: PromptBuilder,
    router: TaskRouter<P>,
    summarizer: ContextSummarizer<P>,
    sandbox: ExecutionSandbox,
    settings: AgentSettings,
    model: String,
    context_length: u32,
    temperature: f32,
}

impl<P: Provider> AgentLoop<P> {
    pub fn new(provider: P, tools: ToolRegistry, config: &Config, working_dir: impl AsRef<Path>) -> Self {
        let provider = Arc::new(provider);
        let working_dir: PathBuf = working_dir.as_ref().to_path_buf();
        let backend = &config.backend;
        let settings = config.agent.clone();

        Self {
            router: TaskRouter::new(Arc::clone(&provider), &backend.model, backend.context_length),
            summarizer: ContextSummarizer::new(
                Arc::clone(&provider),
                &backend.model,
                backend.context_length,
                backend.temperature,
            ),
            sandbox: ExecutionSandbox::new(
                &settings.interpreter,
                Duration::from_secs(settings.sandbox_timeout_secs),
                &working_dir,
            ),
            prompts: PromptBuilder::new(&working_dir, settings.strategy, &settings.interpreter),
            provider,
            tools,
            settings,
            model: backend.model.clone(),
            context_length: backend.context_length,
            temperature: backend.temperature,
        }
    }

    /// Replace the sandbox used for code emission
    pub fn with_sandbox(mut self, sandbox: ExecutionSandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Route a task, answering conversation directly and running the
    /// control loop for everything else
    pub async fn run_task(&self, task: &str) -> Result<TaskOutcome> {
        match self.router.route(task).await? {
            Route::Chat => {
                let reply = self
                    .router
                    .chat_reply(self.prompts.chat_messages(task), self.temperature)
                    .await?;
                Ok(TaskOutcome::Chat { reply })
            }
            Route::Action => self.execute_task(task).await,
        }
    }

    /// Run the control loop until the task completes or the loop gives up
    pub async fn execute_task(&self, task: &str) -> Result<TaskOutcome> {
        let budget = self.summarizer.budget();
        let mut state = LoopState::new();

        info!("◆ TASK START ({} strategy)", self.settings.strategy);

        loop {
            if state.iteration >= self.settings.max_iterations {
                warn!("◆ ITERATION LIMIT REACHED");
                return Ok(TaskOutcome::GaveUp {
                    iterations: state.iteration,
                    reason: format!(
                        "reached the limit of {} iterations without finishing",
                        self.settings.max_iterations
                    ),
                });
            }

            state = state.begin_iteration();
            info!("◆ ITERATION {}", state.iteration);

            let summary = self
                .summarizer
                .summarize(
                    state.progress_tail(budget.tail_chars),
                    state.error_tail(budget.tail_chars),
                    &state.summary,
                )
                .await?;
            state = state.apply_summary(summary);

            let turn = match self.settings.strategy {
                Strategy::ToolCalling => self.tool_turn(task, &state).await?,
                Strategy::CodeEmission => self.code_turn(task, &state).await?,
            };

            state = match turn.outcome {
                IterationOutcome::Succeeded(entry) => {
                    info!("◆ STEP SUCCEEDED");
                    state.record_success(&entry)
                }
                IterationOutcome::Failed(detail) => {
                    info!("◆ STEP FAILED");
                    debug!("Error: {}", detail);
                    state.record_failure(&detail)
                }
                IterationOutcome::Idle => {
                    debug!("Turn ran no action");
                    state.record_idle()
                }
            };

            if turn.finished && !state.has_pending_error() {
                info!("◆ TASK COMPLETE AFTER {} ITERATIONS", state.iteration);
                return Ok(TaskOutcome::Completed {
                    iterations: state.iteration,
                    summary: state.summary,
                });
            }

            if state.has_pending_error() {
                if state.consecutive_failures >= self.settings.max_consecutive_failures {
                    warn!("◆ GIVING UP AFTER {} CONSECUTIVE FAILURES", state.consecutive_failures);
                    return Ok(TaskOutcome::GaveUp {
                        iterations: state.iteration,
                        reason: format!(
                            "{} consecutive failures; last error: {}",
                            state.consecutive_failures,
                            truncate_chars(&state.error_log, ENTRY_PREVIEW_CHARS)
                        ),
                    });
                }
                continue;
            }

            if self.check_complete(task, &state, &turn.last_output).await? {
                info!("◆ TASK COMPLETE AFTER {} ITERATIONS", state.iteration);
                return Ok(TaskOutcome::Completed {
                    iterations: state.iteration,
                    summary: state.summary,
                });
            }
        }
    }

    fn params(&self, messages: Vec<Message>, with_tools: bool) -> ChatParams {
        ChatParams {
            model: self.model.clone(),
            messages,
            tools: if with_tools {
                self.tools.definitions()
            } else {
                Vec::new()
            },
            context_length: self.context_length,
            temperature: self.temperature,
        }
    }

    /// One generation turn with tool calling, including its inner rounds
    async fn tool_turn(&self, task: &str, state: &LoopState) -> Result<Turn> {
        let mut messages = self
            .prompts
            .generation_messages(task, &state.summary, &state.error_log);
        let mut actions: Vec<String> = Vec::new();
        let mut last: Option<(String, ToolOutcome)> = None;

        for round in 1..=self.settings.max_tool_rounds {
            debug!("Tool round {}", round);
            let response = self.provider.chat(self.params(messages.clone(), true)).await?;
            let text = response.text_content().to_string();

            let error_pending = match &last {
                Some((_, outcome)) => !outcome.is_success(),
                None => state.has_pending_error(),
            };

            if contains_sentinel(&text) {
                if error_pending {
                    debug!("Ignoring completion sentinel while an error is pending");
                } else {
                    if response.has_tool_calls() {
                        info!(
                            "◆ COMPLETION SIGNALLED, SKIPPING {} TOOL CALLS",
                            response.tool_calls.len()
                        );
                    }
                    return Ok(Self::finish_turn(actions, last, text, true));
                }
            }

            if !response.has_tool_calls() {
                return Ok(Self::finish_turn(actions, last, text, false));
            }

            let mut assistant = Message::assistant(text);
            assistant.tool_calls = Some(response.tool_calls.iter().map(ToolCallDef::from).collect());
            messages.push(assistant);

            for call in &response.tool_calls {
                let outcome = self.tools.dispatch(&call.name, call.arguments.clone()).await;
                let result_text = outcome.to_message_text();
                actions.push(format!(
                    "{} {} -> {}",
                    call.name,
                    call.arguments,
                    truncate_chars(&result_text, ENTRY_PREVIEW_CHARS)
                ));
                messages.push(Message::tool(&call.name, result_text));
                last = Some((call.name.clone(), outcome));
            }
        }

        warn!("◆ TOOL ROUND LIMIT REACHED");
        Ok(Turn {
            outcome: IterationOutcome::Failed(format!(
                "TOOL ROUND LIMIT: still requesting tools after {} rounds; \
                 finish the step with fewer tool calls",
                self.settings.max_tool_rounds
            )),
            finished: false,
            last_output: String::new(),
        })
    }

    fn finish_turn(
        actions: Vec<String>,
        last: Option<(String, ToolOutcome)>,
        reply: String,
        finished: bool,
    ) -> Turn {
        match last {
            Some((_, ToolOutcome::Success { output })) => Turn {
                outcome: IterationOutcome::Succeeded(actions.join("\n")),
                finished,
                last_output: output,
            },
            Some((name, failure)) => {
                let text = failure.to_message_text();
                Turn {
                    outcome: IterationOutcome::Failed(format!("{} failed: {}", name, text)),
                    finished,
                    last_output: text,
                }
            }
            None => Turn {
                outcome: IterationOutcome::Idle,
                finished,
                last_output: reply,
            },
        }
    }

    /// One generation turn that emits code for the sandbox
    async fn code_turn(&self, task: &str, state: &LoopState) -> Result<Turn> {
        let messages = self
            .prompts
            .generation_messages(task, &state.summary, &state.error_log);
        let response = self.provider.chat(self.params(messages, false)).await?;
        let reply = response.text_content();
        let sentinel = contains_sentinel(reply);

        if sentinel && !state.has_pending_error() {
            return Ok(Turn {
                outcome: IterationOutcome::Idle,
                finished: true,
                last_output: reply.to_string(),
            });
        }

        let code = extract_code_segment(reply);
        if code.is_empty() {
            let outcome = if sentinel {
                IterationOutcome::Idle
            } else {
                IterationOutcome::Failed("no executable code segment in the reply".to_string())
            };
            return Ok(Turn {
                outcome,
                finished: false,
                last_output: reply.to_string(),
            });
        }

        let run = self.sandbox.run(&code).await;
        let outcome = if run.succeeded {
            IterationOutcome::Succeeded(format!(
                "ran:\n{}\noutput:\n{}",
                truncate_chars(&code, ENTRY_PREVIEW_CHARS),
                truncate_chars(&run.output, ENTRY_PREVIEW_CHARS)
            ))
        } else {
            IterationOutcome::Failed(run.output.clone())
        };
        Ok(Turn {
            outcome,
            finished: false,
            last_output: run.output,
        })
    }

    async fn check_complete(&self, task: &str, state: &LoopState, last_output: &str) -> Result<bool> {
        let messages = PromptBuilder::completion_messages(
            task,
            &state.summary,
            truncate_chars(last_output, ENTRY_PREVIEW_CHARS),
        );
        let mut params = self.params(messages, false);
        params.temperature = 0.0;
        let response = self.provider.chat(params).await?;
        let done = is_affirmative(response.text_content());
        info!("◆ COMPLETE: {}", if done { "YES" } else { "NO" });
        Ok(done)
    }

    /// Close external tool providers
    pub async fn shutdown(&self) {
        self.tools.shutdown().await;
    }
}
