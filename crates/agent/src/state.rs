//! Control-loop state
//!
//! The progress log only grows; the error log holds the single most
//! recent failure. Transitions take the state by value and return the
//! next one.

/// Accumulated state for one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopState {
    pub progress_log: String,
    pub error_log: String,
    pub summary: String,
    pub iteration: u32,
    pub consecutive_failures: u32,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the next outer iteration
    pub fn begin_iteration(mut self) -> Self {
        self.iteration += 1;
        self
    }

    pub fn apply_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Append a progress entry and clear the pending error
    pub fn record_success(mut self, entry: &str) -> Self {
        if !self.progress_log.is_empty() && !self.progress_log.ends_with('\n') {
            self.progress_log.push('\n');
        }
        self.progress_log
            .push_str(&format!("[step {}] {}\n", self.iteration, entry.trim_end()));
        self.error_log.clear();
        self.consecutive_failures = 0;
        self
    }

    /// Replace the pending error; progress is untouched
    pub fn record_failure(mut self, detail: &str) -> Self {
        self.error_log = detail.to_string();
        self.consecutive_failures += 1;
        self
    }

    /// A turn that ran no action leaves the logs as they are
    pub fn record_idle(self) -> Self {
        self
    }

    pub fn has_pending_error(&self) -> bool {
        !self.error_log.is_empty()
    }

    pub fn progress_tail(&self, chars: usize) -> &str {
        crate::summarizer::tail(&self.progress_log, chars)
    }

    pub fn error_tail(&self, chars: usize) -> &str {
        crate::summarizer::tail(&self.error_log, chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_clears_error() {
        let state = LoopState::new()
            .begin_iteration()
            .record_failure("Traceback: boom")
            .begin_iteration()
            .record_success("ran echo\nok");

        assert!(state.error_log.is_empty());
        assert!(!state.has_pending_error());
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.progress_log.contains("[step 2] ran echo\nok"));
    }

    #[test]
    fn test_failure_leaves_progress_untouched() {
        let state = LoopState::new().begin_iteration().record_success("first");
        let before = state.progress_log.clone();

        let state = state.begin_iteration().record_failure("exit 1");
        assert_eq!(state.progress_log, before);
        assert_eq!(state.error_log, "exit 1");
        assert_eq!(state.consecutive_failures, 1);
    }

    #[test]
    fn test_error_log_is_overwritten() {
        let state = LoopState::new()
            .record_failure("first error")
            .record_failure("second error");
        assert_eq!(state.error_log, "second error");
        assert_eq!(state.consecutive_failures, 2);
    }

    #[test]
    fn test_progress_only_grows() {
        let mut state = LoopState::new();
        let mut last_len = 0;
        for i in 0..5 {
            state = state.begin_iteration();
            state = if i % 2 == 0 {
                state.record_success(&format!("entry {}", i))
            } else {
                state.record_failure("nope")
            };
            assert!(state.progress_log.len() >= last_len);
            last_len = state.progress_log.len();
        }
    }

    #[test]
    fn test_idle_changes_nothing() {
        let state = LoopState::new().begin_iteration().record_failure("pending");
        let idle = state.clone().record_idle();
        assert_eq!(idle, state);
    }}
