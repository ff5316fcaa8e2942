//! Generation invoker: one request/response cycle against the chat backend.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use regex::Regex;
use tracing::{debug, warn};

use super::result::TokenUsage;
use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::metrics::MetricsCollector;

/// Artifact name the built-in prompts ask the script to write.
pub const DEFAULT_ARTIFACT_NAME: &str = "test.pptx";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```python\n|```").expect("Invalid code fence regex"));

/// Per-run artifact name, e.g. `test_3f2a….pptx`.
pub fn artifact_file_name(run_id: &str) -> String {
    format!("test_{run_id}.pptx")
}

/// Rewrites the default artifact name in a system prompt to the per-run name.
pub fn parametrize_prompt(system_prompt: &str, run_id: &str) -> String {
    system_prompt.replace(DEFAULT_ARTIFACT_NAME, &artifact_file_name(run_id))
}

/// Removes every ```` ```python ```` / ```` ``` ```` marker and trims the result.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// What the backend produced for one task.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// Cleaned program text ready for execution.
    Code { code: String, usage: TokenUsage },
    /// The backend answered with nothing usable.
    Empty { usage: TokenUsage },
    /// Transport or decoding failure; usage is unknown.
    Failed { error: String },
}

/// Wraps an [`LlmProvider`] with prompt construction and output cleanup.
#[derive(Clone)]
pub struct GenerationInvoker {
    provider: Arc<dyn LlmProvider>,
    metrics: MetricsCollector,
}

impl GenerationInvoker {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            metrics: MetricsCollector::new(),
        }
    }

    /// Ask `model` to solve `task_text` under `system_prompt`.
    ///
    /// The artifact name in the prompt is rewritten for `run_id` so concurrent
    /// runs target distinct files. Never returns an error: failures are folded
    /// into [`Generation::Failed`].
    pub async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        task_text: &str,
        run_id: &str,
    ) -> Generation {
        let request = GenerationRequest::new(
            model,
            vec![
                Message::system(parametrize_prompt(system_prompt, run_id)),
                Message::user(task_text),
            ],
        );

        let start = Instant::now();
        let response = match self.provider.generate(request).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics
                    .record_llm_request(model, false, start.elapsed().as_secs_f64(), None);
                warn!(model, run_id, error = %e, "Generation request failed");
                return Generation::Failed {
                    error: e.to_string(),
                };
            }
        };
        let latency = start.elapsed().as_secs_f64();

        let usage = TokenUsage::from(response.usage);
        self.metrics
            .record_llm_request(model, true, latency, Some(usage));
        debug!(
            model,
            run_id,
            latency_secs = format!("{latency:.2}"),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Generation finished"
        );

        let Some(raw) = response.first_content() else {
            warn!(model, run_id, "Backend response carried no choices");
            return Generation::Failed {
                error: LlmError::EmptyResponse.to_string(),
            };
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Generation::Empty { usage };
        }

        let code = strip_code_fences(raw);
        if code.is_empty() {
            return Generation::Empty { usage };
        }

        debug!(run_id, "Generated code:\n{}", code);
        Generation::Code { code, usage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockLlmProvider {
        response: Mutex<Result<Option<String>, String>>,
        last_request: Mutex<Option<GenerationRequest>>,
    }

    impl MockLlmProvider {
        fn replying(content: &str) -> Self {
            Self {
                response: Mutex::new(Ok(Some(content.to_string()))),
                last_request: Mutex::new(None),
            }
        }

        fn without_choices() -> Self {
            Self {
                response: Mutex::new(Ok(None)),
                last_request: Mutex::new(None),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Mutex::new(Err(message.to_string())),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            *self.last_request.lock().expect("lock poisoned") = Some(request);
            let content = self
                .response
                .lock()
                .expect("lock poisoned")
                .clone()
                .map_err(LlmError::RequestFailed)?;
            Ok(GenerationResponse {
                id: "test-id".to_string(),
                model: "test-model".to_string(),
                choices: content
                    .into_iter()
                    .map(|content| Choice {
                        index: 0,
                        message: Message::assistant(content),
                        finish_reason: "stop".to_string(),
                    })
                    .collect(),
                usage: Usage {
                    prompt_tokens: 100,
                    completion_tokens: 200,
                    total_tokens: 300,
                },
            })
        }
    }

    #[test]
    fn test_strip_code_fences() {
        let wrapped = "```python\nfrom pptx import Presentation\nprs = Presentation()\n```";
        assert_eq!(
            strip_code_fences(wrapped),
            "from pptx import Presentation\nprs = Presentation()"
        );
        assert_eq!(strip_code_fences("print(1)"), "print(1)");
        assert_eq!(strip_code_fences("```\nx = 1\n```\n"), "x = 1");
    }

    #[test]
    fn test_parametrize_prompt() {
        let prompt = "Save as 'test.pptx'. Then prs.save('test.pptx')";
        let rewritten = parametrize_prompt(prompt, "abc");
        assert_eq!(
            rewritten,
            "Save as 'test_abc.pptx'. Then prs.save('test_abc.pptx')"
        );
    }

    #[tokio::test]
    async fn test_generate_strips_fences_and_copies_usage() {
        let provider = Arc::new(MockLlmProvider::replying(
            "  ```python\nprint('hi')\n```  ",
        ));
        let invoker = GenerationInvoker::new(provider.clone());

        let generation = invoker
            .generate("m", "write test.pptx", "hello", "r1")
            .await;

        assert_eq!(
            generation,
            Generation::Code {
                code: "print('hi')".to_string(),
                usage: TokenUsage::new(100, 200, 300),
            }
        );

        let request = provider
            .last_request
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("request recorded");
        assert!(!request.stream);
        assert_eq!(request.system_prompt(), Some("write test_r1.pptx"));
        assert_eq!(request.messages[1], Message::user("hello"));
    }

    #[tokio::test]
    async fn test_generate_empty_output_is_empty() {
        let invoker = GenerationInvoker::new(Arc::new(MockLlmProvider::replying("   \n ")));
        let generation = invoker.generate("m", "p", "t", "r").await;
        assert!(matches!(generation, Generation::Empty { .. }));
    }

    #[tokio::test]
    async fn test_generate_fences_only_is_empty() {
        let invoker = GenerationInvoker::new(Arc::new(MockLlmProvider::replying("```python\n```")));
        let generation = invoker.generate("m", "p", "t", "r").await;
        assert!(matches!(generation, Generation::Empty { .. }));
    }

    #[tokio::test]
    async fn test_generate_transport_failure() {
        let invoker =
            GenerationInvoker::new(Arc::new(MockLlmProvider::failing("connection reset")));
        match invoker.generate("m", "p", "t", "r").await {
            Generation::Failed { error } => assert!(error.contains("connection reset")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_no_choices_is_failure() {
        let invoker = GenerationInvoker::new(Arc::new(MockLlmProvider::without_choices()));
        match invoker.generate("m", "p", "t", "r").await {
            Generation::Failed { error } => {
                assert_eq!(error, LlmError::EmptyResponse.to_string())
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
