//! Sandboxed executor for generated scripts.
//!
//! Each run writes its script to `.script_<run_id>.py` inside a scratch
//! directory and expects the script to produce `test_<run_id>.pptx` next to
//! it. A run passes only when the interpreter exits zero and the artifact
//! exists afterwards. The script file is removed on every exit path, and the
//! artifact is removed whenever the run fails, so after `execute` returns the
//! artifact exists iff the run succeeded.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::invoker::artifact_file_name;
use super::result::truncate_string;

/// Default scratch directory, relative to the current directory.
pub const DEFAULT_WORK_DIR: &str = ".deckbench-scratch";

/// Maximum captured output kept per stream.
const MAX_CAPTURED_OUTPUT: usize = 10_000;

/// How the interpreter process is isolated from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Isolation {
    /// Child process in the scratch directory.
    Process,
    /// `docker run --rm` with the scratch directory mounted at `/workspace`.
    Docker { image: String },
}

/// Configuration for the sandboxed executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Directory holding scripts and artifacts.
    pub work_dir: PathBuf,
    /// Interpreter command; the script file name is appended.
    pub interpreter: Vec<String>,
    /// Optional wall-clock limit per script. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub isolation: Isolation,
    /// Memory limit in MB (Docker only).
    pub memory_limit_mb: u64,
    /// Network mode (Docker only).
    pub network_mode: String,
    pub env_vars: Vec<(String, String)>,
    /// Leave a passing run's deck in `work_dir`. Failed runs never keep one.
    #[serde(default = "default_keep_artifacts")]
    pub keep_artifacts: bool,
}

fn default_keep_artifacts() -> bool {
    true
}

impl SandboxConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            interpreter: vec!["uv".to_string(), "run".to_string()],
            timeout: None,
            isolation: Isolation::Process,
            memory_limit_mb: 2048,
            network_mode: "bridge".to_string(),
            env_vars: Vec::new(),
            keep_artifacts: true,
        }
    }

    pub fn with_interpreter<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interpreter = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run scripts inside a Docker container built from `image`.
    pub fn with_docker(mut self, image: impl Into<String>) -> Self {
        self.isolation = Isolation::Docker {
            image: image.into(),
        };
        self
    }

    pub fn with_memory_mb(mut self, mb: u64) -> Self {
        self.memory_limit_mb = mb;
        self
    }

    pub fn without_network(mut self) -> Self {
        self.network_mode = "none".to_string();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Delete each deck once it has been checked, passing or not.
    pub fn discard_artifacts(mut self) -> Self {
        self.keep_artifacts = false;
        self
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORK_DIR)
    }
}

/// Scratch file name for a run's script.
pub fn script_file_name(run_id: &str) -> String {
    format!(".script_{run_id}.py")
}

/// Observed result of running one script.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub exit_code: Option<i32>,
    pub artifact_created: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ExecutionReport {
    /// Exit status zero and artifact present.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && self.artifact_created
    }
}

/// Error types for sandbox operations.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Failed to launch '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Script timed out after {0:?}")]
    Timeout(Duration),

    #[error("Interpreter command is empty")]
    EmptyInterpreter,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs untrusted generated code and reports exit status plus artifact presence.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(&self, code: &str, run_id: &str) -> Result<ExecutionReport, SandboxError>;
}

/// Removes a run's scratch files when dropped.
struct ScratchGuard {
    script: PathBuf,
    artifact: PathBuf,
    keep_artifact: bool,
}

impl ScratchGuard {
    fn new(work_dir: &Path, run_id: &str) -> Self {
        Self {
            script: work_dir.join(script_file_name(run_id)),
            artifact: work_dir.join(artifact_file_name(run_id)),
            keep_artifact: false,
        }
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.script) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove scratch script {}: {}", self.script.display(), e);
            }
        }
        if !self.keep_artifact {
            let _ = std::fs::remove_file(&self.artifact);
        }
    }
}

/// Executor that launches the configured interpreter as a child process.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    config: SandboxConfig,
}

impl ProcessSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Builds `docker run` arguments for one script.
    pub fn docker_run_args(&self, image: &str, work_dir: &Path, run_id: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            format!("deckbench-{run_id}"),
            format!("--memory={}m", self.config.memory_limit_mb),
            format!("--network={}", self.config.network_mode),
            "-w".to_string(),
            "/workspace".to_string(),
            "-v".to_string(),
            format!("{}:/workspace", work_dir.display()),
        ];

        for (key, value) in &self.config.env_vars {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }

        args.push(image.to_string());
        args.extend(self.config.interpreter.iter().cloned());
        args.push(script_file_name(run_id));
        args
    }

    fn build_command(&self, work_dir: &Path, run_id: &str) -> Result<Command, SandboxError> {
        let mut command = match &self.config.isolation {
            Isolation::Process => {
                let (program, rest) = self
                    .config
                    .interpreter
                    .split_first()
                    .ok_or(SandboxError::EmptyInterpreter)?;
                let mut cmd = Command::new(program);
                cmd.args(rest).arg(script_file_name(run_id));
                for (key, value) in &self.config.env_vars {
                    cmd.env(key, value);
                }
                cmd
            }
            Isolation::Docker { image } => {
                if self.config.interpreter.is_empty() {
                    return Err(SandboxError::EmptyInterpreter);
                }
                let mut cmd = Command::new("docker");
                cmd.args(self.docker_run_args(image, work_dir, run_id));
                cmd
            }
        };

        command
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }

    fn command_line(&self) -> String {
        match &self.config.isolation {
            Isolation::Process => self.config.interpreter.join(" "),
            Isolation::Docker { image } => format!("docker run {image}"),
        }
    }
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

#[async_trait]
impl ScriptExecutor for ProcessSandbox {
    async fn execute(&self, code: &str, run_id: &str) -> Result<ExecutionReport, SandboxError> {
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| SandboxError::Setup(format!("Failed to create work dir: {e}")))?;
        let work_dir = tokio::fs::canonicalize(&self.config.work_dir).await?;

        let mut guard = ScratchGuard::new(&work_dir, run_id);

        // A leftover artifact from an earlier run would read as a pass.
        match tokio::fs::remove_file(&guard.artifact).await {
            Ok(()) => debug!(run_id, "Removed stale artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SandboxError::Io(e)),
        }

        tokio::fs::write(&guard.script, code).await?;

        let mut command = self.build_command(&work_dir, run_id)?;
        let start = Instant::now();
        let child = command.spawn().map_err(|e| SandboxError::Spawn {
            command: self.command_line(),
            reason: e.to_string(),
        })?;

        let output = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    if let Isolation::Docker { .. } = self.config.isolation {
                        let _ = Command::new("docker")
                            .args(["kill", &format!("deckbench-{run_id}")])
                            .output()
                            .await;
                    }
                    return Err(SandboxError::Timeout(limit));
                }
            },
            None => child.wait_with_output().await?,
        };
        let duration = start.elapsed();

        let artifact_created = tokio::fs::try_exists(&guard.artifact).await.unwrap_or(false);
        let report = ExecutionReport {
            exit_code: output.status.code(),
            artifact_created,
            stdout: truncate_string(
                String::from_utf8_lossy(&output.stdout).to_string(),
                MAX_CAPTURED_OUTPUT,
            ),
            stderr: truncate_string(
                String::from_utf8_lossy(&output.stderr).to_string(),
                MAX_CAPTURED_OUTPUT,
            ),
            duration,
        };

        if report.success() {
            guard.keep_artifact = self.config.keep_artifacts;
            info!(run_id, artifact = %guard.artifact.display(), "Presentation generated");
        } else if report.exit_code == Some(0) {
            info!(run_id, "Script exited cleanly but produced no artifact");
        } else {
            info!(run_id, exit_code = ?report.exit_code, "Script failed");
            debug!(run_id, "Script stderr:\n{}", report.stderr);
        }

        Ok(report)
    }
}
