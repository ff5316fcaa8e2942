//! Task runner: one task through generation then execution.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use uuid::Uuid;

use super::invoker::{Generation, GenerationInvoker};
use super::result::{TaskOutcome, TaskResult, TokenUsage};
use super::sandbox::{SandboxError, ScriptExecutor};
use crate::corpus::Task;

/// Drives a single task and normalizes every ending into a [`TaskResult`].
#[derive(Clone)]
pub struct TaskRunner {
    invoker: GenerationInvoker,
    executor: Arc<dyn ScriptExecutor>,
}

impl TaskRunner {
    pub fn new(invoker: GenerationInvoker, executor: Arc<dyn ScriptExecutor>) -> Self {
        Self { invoker, executor }
    }

    /// Fresh identifier namespacing one run's scratch files.
    pub fn new_run_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Generate code for `task` with `model` under `system_prompt` and execute it.
    ///
    /// The executor is skipped when generation fails. Elapsed time covers
    /// both phases.
    pub async fn run(&self, model: &str, system_prompt: &str, task: &Task) -> TaskResult {
        let run_id = Self::new_run_id();
        let start = Instant::now();

        let (code, tokens) = match self
            .invoker
            .generate(model, system_prompt, &task.text, &run_id)
            .await
        {
            Generation::Code { code, usage } => (code, usage),
            Generation::Empty { usage } => {
                info!(task = task.index, model, "Model returned no code");
                return TaskResult::new(
                    task.index,
                    TaskOutcome::GenerationFailed,
                    start.elapsed().as_secs_f64(),
                    usage,
                );
            }
            Generation::Failed { error: message } => {
                error!(task = task.index, model, error = %message, "Generation failed");
                return TaskResult::new(
                    task.index,
                    TaskOutcome::InfrastructureError { message },
                    start.elapsed().as_secs_f64(),
                    TokenUsage::default(),
                );
            }
        };

        let outcome = match self.executor.execute(&code, &run_id).await {
            Ok(report) if report.success() => TaskOutcome::Success,
            Ok(report) => TaskOutcome::ExecutionFailed {
                exit_code: report.exit_code,
                stderr: report.stderr,
            },
            Err(SandboxError::Timeout(limit)) => TaskOutcome::ExecutionFailed {
                exit_code: None,
                stderr: format!("timed out after {limit:?}"),
            },
            Err(e) => {
                error!(task = task.index, run_id, error = %e, "Sandbox failure");
                TaskOutcome::InfrastructureError {
                    message: e.to_string(),
                }
            }
        };

        TaskResult::new(task.index, outcome, start.elapsed().as_secs_f64(), tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
    use crate::runner::sandbox::ExecutionReport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedProvider(Result<&'static str, &'static str>);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            let content = self.0.map_err(|e| LlmError::RequestFailed(e.to_string()))?;
            Ok(GenerationResponse {
                id: "id".to_string(),
                model: "m".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage {
                    prompt_tokens: 5,
                    completion_tokens: 7,
                    total_tokens: 12,
                },
            })
        }
    }

    /// Answers successfully but without any choice.
    struct NoChoicesProvider;

    #[async_trait]
    impl LlmProvider for NoChoicesProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            Ok(GenerationResponse {
                id: "id".to_string(),
                model: "m".to_string(),
                choices: Vec::new(),
                usage: Usage::default(),
            })
        }
    }

    /// Records calls and returns a canned outcome.
    struct StubExecutor {
        calls: AtomicUsize,
        exit_code: Option<i32>,
        artifact: bool,
        fail: bool,
    }

    impl StubExecutor {
        fn new(exit_code: Option<i32>, artifact: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                exit_code,
                artifact,
                fail: false,
            }
        }

        fn broken() -> Self {
            Self {
                fail: true,
                ..Self::new(None, false)
            }
        }
    }

    #[async_trait]
    impl ScriptExecutor for StubExecutor {
        async fn execute(&self, code: &str, _run_id: &str) -> Result<ExecutionReport, SandboxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(!code.contains("```"), "fences must be stripped before execution");
            if self.fail {
                return Err(SandboxError::Spawn {
                    command: "uv run".to_string(),
                    reason: "not found".to_string(),
                });
            }
            Ok(ExecutionReport {
                exit_code: self.exit_code,
                artifact_created: self.artifact,
                stdout: String::new(),
                stderr: "trace".to_string(),
                duration: Duration::from_millis(1),
            })
        }
    }

    fn runner(provider: FixedProvider, executor: Arc<StubExecutor>) -> TaskRunner {
        TaskRunner::new(GenerationInvoker::new(Arc::new(provider)), executor)
    }

    fn hello() -> Task {
        Task::new(4, "hello")
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(TaskRunner::new_run_id(), TaskRunner::new_run_id());
    }

    #[tokio::test]
    async fn test_success() {
        let executor = Arc::new(StubExecutor::new(Some(0), true));
        let result = runner(FixedProvider(Ok("```python\nok\n```")), executor.clone())
            .run("m", "p", &hello())
            .await;

        assert!(result.success());
        assert_eq!(result.task_index, 4);
        assert_eq!(result.tokens, TokenUsage::new(5, 7, 12));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exit_zero_without_artifact_is_plain_failure() {
        let executor = Arc::new(StubExecutor::new(Some(0), false));
        let result = runner(FixedProvider(Ok("print(1)")), executor)
            .run("m", "p", &hello())
            .await;

        assert!(!result.success());
        assert!(result.error().is_none());
        assert!(matches!(
            result.outcome,
            TaskOutcome::ExecutionFailed { exit_code: Some(0), .. }
        ));
    }

    #[tokio::test]
    async fn test_connection_error_skips_executor() {
        let executor = Arc::new(StubExecutor::new(Some(0), true));
        let result = runner(FixedProvider(Err("connection refused")), executor.clone())
            .run("m", "p", &hello())
            .await;

        assert!(!result.success());
        assert!(result.error().is_some_and(|e| !e.is_empty()));
        assert!(result.tokens.is_zero());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_generation_skips_executor() {
        let executor = Arc::new(StubExecutor::new(Some(0), true));
        let result = runner(FixedProvider(Ok("   ")), executor.clone())
            .run("m", "p", &hello())
            .await;

        assert_eq!(result.outcome, TaskOutcome::GenerationFailed);
        assert!(result.error().is_none());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sandbox_failure_is_infrastructure_error() {
        let executor = Arc::new(StubExecutor::broken());
        let result = runner(FixedProvider(Ok("print(1)")), executor)
            .run("m", "p", &hello())
            .await;

        assert!(!result.success());
        assert!(result.error().is_some_and(|e| e.contains("not found")));
        assert_eq!(result.tokens, TokenUsage::new(5, 7, 12));
    }

    #[tokio::test]
    async fn test_response_without_choices_is_reported() {
        let executor = Arc::new(StubExecutor::new(Some(0), true));
        let result = TaskRunner::new(
            GenerationInvoker::new(Arc::new(NoChoicesProvider)),
            executor.clone(),
        )
        .run("m", "p", &hello())
        .await;

        assert!(!result.success());
        assert!(result.error().is_some_and(|e| e.contains("no choices")));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }
}
