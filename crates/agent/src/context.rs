//! Prompt assembly for every backend query the agent makes

use chrono::Local;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use taskpilot_config::Strategy;
use taskpilot_provider::Message;

/// Literal the model emits when the task is finished
pub const COMPLETION_SENTINEL: &str = "PROJECT_DONE";

/// Builds message lists for routing, generation and checks
pub struct PromptBuilder {
    working_dir: PathBuf,
    strategy: Strategy,
    interpreter: String,
}

impl PromptBuilder {
    pub fn new(working_dir: impl AsRef<Path>, strategy: Strategy, interpreter: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            strategy,
            interpreter: interpreter.into(),
        }
    }

    pub fn router_messages(task: &str) -> Vec<Message> {
        vec![
            Message::system(
                "Classify the user's request. Answer with exactly one word:\n\
                 CHAT if it is a question or conversation that needs no files, commands or code run,\n\
                 ACTION if it requires creating or changing files, running commands or executing code.",
            ),
            Message::user(task),
        ]
    }

    pub fn chat_messages(&self, task: &str) -> Vec<Message> {
        vec![
            Message::system(format!(
                "You are taskpilot, a helpful assistant working in {}. \
                 Answer the user directly and concisely.",
                self.working_dir.display()
            )),
            Message::user(task),
        ]
    }

    pub fn summary_messages(
        progress_tail: &str,
        error_tail: &str,
        previous: &str,
        max_chars: usize,
    ) -> Vec<Message> {
        let system = format!(
            "You maintain a running summary of an automated coding task. \
             Reply with plain factual text only, no markdown and no advice, \
             in fewer than {} characters. Record what has been done, what files exist \
             and the current error if there is one.",
            max_chars
        );
        let mut body = String::new();
        body.push_str("PREVIOUS SUMMARY:\n");
        body.push_str(if previous.is_empty() { "(none)" } else { previous });
        body.push_str("\n\nRECENT PROGRESS:\n");
        body.push_str(if progress_tail.is_empty() { "(none)" } else { progress_tail });
        body.push_str("\n\nCURRENT ERROR:\n");
        body.push_str(if error_tail.is_empty() { "(none)" } else { error_tail });
        vec![Message::system(system), Message::user(body)]
    }

    fn generation_system_prompt(&self) -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
        let mode = match self.strategy {
            Strategy::ToolCalling => "Work only through the provided tools. Make one focused step at a time \
                 and inspect tool results before continuing."
                .to_string(),
            Strategy::CodeEmission => format!(
                "Reply with a single fenced code block containing a complete program for `{}`. \
                 It is executed as-is and its output is shown to you next turn.",
                self.interpreter
            ),
        };
        format!(
            r#"# taskpilot

You are taskpilot, an autonomous agent that completes programming tasks step by step.

## Current Time
{now}

## Working Directory
{dir}
Relative paths resolve against this directory.

## Rules
- {mode}
- Never start servers, daemons, GUI programs or loops that do not terminate.
- If a previous step failed, fix that error before doing anything else.
- When the whole task is finished and verified, reply with {sentinel} and nothing else."#,
            now = now,
            dir = self.working_dir.display(),
            mode = mode,
            sentinel = COMPLETION_SENTINEL,
        )
    }

    /// Messages for one generation turn; a pending error is quoted verbatim
    pub fn generation_messages(&self, task: &str, summary: &str, error_log: &str) -> Vec<Message> {
        let mut body = format!("TASK:\n{}\n", task);
        if !summary.trim().is_empty() {
            body.push_str(&format!("\nPROGRESS SO FAR:\n{}\n", summary.trim()));
        }
        if !error_log.trim().is_empty() {
            body.push_str(&format!(
                "\nTHE LAST STEP FAILED WITH THIS ERROR:\n{}\n\nFix this error before continuing.\n",
                error_log.trim_end()
            ));
        } else {
            body.push_str("\nDo the next step.\n");
        }
        vec![Message::system(self.generation_system_prompt()), Message::user(body)]
    }

    pub fn completion_messages(task: &str, summary: &str, last_output: &str) -> Vec<Message> {
        vec![
            Message::system(
                "Decide whether the task below is fully complete. Answer with exactly one word: yes or no.",
            ),
            Message::user(format!(
                "TASK:\n{}\n\nSUMMARY:\n{}\n\nLAST OUTPUT:\n{}",
                task,
                if summary.is_empty() { "(none)" } else { summary },
                if last_output.is_empty() { "(none)" } else { last_output },
            )),
        ]
    }
}

/// True when the reply opens with an affirmative word
pub fn is_affirmative(text: &str) -> bool {
    let first = text
        .trim()
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or("")
        .to_lowercase();
    matches!(first.as_str(), "yes" | "y" | "true")
}

pub fn contains_sentinel(text: &str) -> bool {
    text.contains(COMPLETION_SENTINEL)
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("fence pattern is valid"))
}

/// The first fenced block, else the whole reply, minus the sentinel
pub fn extract_code_segment(reply: &str) -> String {
    let segment = fenced_block()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply);
    segment.replace(COMPLETION_SENTINEL, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_fenced_block() {
        let reply = "Here you go:\n```python\nprint('hi')\n```\nand more\n```\nignored\n```";
        assert_eq!(extract_code_segment(reply), "print('hi')");
    }

    #[test]
    fn test_extract_without_fence() {
        assert_eq!(extract_code_segment("echo hi\n"), "echo hi");
    }

    #[test]
    fn test_extract_strips_sentinel() {
        assert_eq!(extract_code_segment("PROJECT_DONE"), "");
        assert_eq!(
            extract_code_segment("```sh\necho ok\nPROJECT_DONE\n```"),
            "echo ok"
        );
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("  Yes, the task is complete."));
        assert!(is_affirmative("YES"));
        assert!(is_affirmative("**yes**"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("Not yet"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yesterday"));
    }

    #[test]
    fn test_generation_prompt_includes_error_verbatim() {
        let builder = PromptBuilder::new("/tmp/work", Strategy::ToolCalling, "python3");
        let messages = builder.generation_messages("do it", "", "EXIT CODE: 1");
        let user = &messages[1].content;
        assert!(user.contains("EXIT CODE: 1"));
        assert!(user.contains("Fix this error"));
        assert!(messages[0].content.contains(COMPLETION_SENTINEL));
        assert!(messages[0].content.contains("Never start servers"));
    }

    #[test]
    fn test_generation_prompt_without_error() {
        let builder = PromptBuilder::new("/tmp/work", Strategy::CodeEmission, "python3");
        let messages = builder.generation_messages("do it", "made a.txt", "");
        assert!(!messages[1].content.contains("Fix this error"));
        assert!(messages[1].content.contains("made a.txt"));
        assert!(messages[0].content.contains("python3"));
    }

    #[test]
    fn test_summary_prompt_states_limit() {
        let messages = PromptBuilder::summary_messages("p", "e", "", 512);
        assert!(messages[0].content.contains("512"));
        assert!(messages[1].content.contains("PREVIOUS SUMMARY:\n(none)"));
    }
}
