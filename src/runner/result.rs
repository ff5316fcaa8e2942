//! Per-task results and token accounting.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::llm::Usage;

/// Token usage for one generation call, or a running sum of many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Backend-reported total; not reconciled with the other two fields.
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        Self::new(usage.prompt_tokens, usage.completion_tokens, usage.total_tokens)
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// How a single task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Script exited zero and produced its artifact.
    Success,
    /// The backend answered but produced no usable code.
    GenerationFailed,
    /// The script ran and either exited non-zero or left no artifact.
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// Transport, sandbox or routing failure outside the model's control.
    InfrastructureError { message: String },
}

impl TaskOutcome {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Success => "success",
            TaskOutcome::GenerationFailed => "generation_failed",
            TaskOutcome::ExecutionFailed { .. } => "execution_failed",
            TaskOutcome::InfrastructureError { .. } => "infrastructure_error",
        }
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of running one task under one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Position of the task in the selected task set.
    pub task_index: usize,
    pub outcome: TaskOutcome,
    /// Wall-clock time covering generation and execution.
    pub elapsed_seconds: f64,
    pub tokens: TokenUsage,
}

impl TaskResult {
    pub fn new(
        task_index: usize,
        outcome: TaskOutcome,
        elapsed_seconds: f64,
        tokens: TokenUsage,
    ) -> Self {
        Self {
            task_index,
            outcome,
            elapsed_seconds: elapsed_seconds.max(0.0),
            tokens,
        }
    }

    /// An infrastructure failure with zeroed timing and tokens.
    pub fn infrastructure(task_index: usize, message: impl Into<String>) -> Self {
        Self::new(
            task_index,
            TaskOutcome::InfrastructureError {
                message: message.into(),
            },
            0.0,
            TokenUsage::default(),
        )
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success)
    }

    /// Error text, present only for infrastructure failures.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::InfrastructureError { message } => Some(message),
            _ => None,
        }
    }
}

/// Truncates a string to at most `max_len` bytes on a char boundary.
pub(crate) fn truncate_string(s: String, max_len: usize) -> String {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
