//! Per-task execution: generate a script, run it, check the artifact.
//!
//! ```text
//! Task ─▶ GenerationInvoker ─▶ code ─▶ ScriptExecutor ─▶ TaskResult
//!          (chat backend)               (subprocess)
//! ```
//!
//! Every path through [`TaskRunner::run`] yields a [`TaskResult`]; nothing
//! in here returns an error to the orchestrator.

pub mod invoker;
pub mod result;
pub mod sandbox;
pub mod task_runner;

pub use invoker::{
    artifact_file_name, parametrize_prompt, strip_code_fences, Generation, GenerationInvoker,
    DEFAULT_ARTIFACT_NAME,
};
pub use result::{TaskOutcome, TaskResult, TokenUsage};
pub use sandbox::{
    script_file_name, ExecutionReport, Isolation, ProcessSandbox, SandboxConfig, SandboxError,
    ScriptExecutor, DEFAULT_WORK_DIR,
};
pub use task_runner::TaskRunner;
