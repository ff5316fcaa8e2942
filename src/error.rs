//! Error types for deckbench operations.
//!
//! Each subsystem owns one enum:
//! - LLM and embedding backend calls
//! - Task corpus loading
//! - Routing classifier artifacts
//! - Report persistence
//! - Benchmark setup

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: set OPENROUTER_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Backend returned no choices")]
    EmptyResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while loading tasks from a corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    #[error("Record {index} has no string field '{field}'")]
    MissingField { index: usize, field: String },

    #[error("Unsupported corpus file '{0}': expected .jsonl or .parquet")]
    UnsupportedFormat(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while loading or applying the routing classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier artifact has no classes")]
    Empty,

    #[error("Weight row {row} has {actual} columns, expected {expected}")]
    RaggedWeights {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Bias has {bias} entries but weights have {classes} rows")]
    BiasMismatch { classes: usize, bias: usize },

    #[error("Embedding has {actual} dimensions, classifier expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Classifier has {classifier} classes but the routing table maps {table}")]
    ClassCountMismatch { classifier: usize, table: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while persisting or reading reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Configuration '{0}' not found in report")]
    UnknownConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised before any task is dispatched.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("Configuration '{0}' is routed but no prompt router was supplied")]
    RouterMissing(String),

    #[error("Duplicate configuration name '{0}'")]
    DuplicateConfiguration(String),

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("Prompt for configuration '{name}' never names '{artifact}', so no run could produce its deck")]
    PromptWithoutArtifact { name: String, artifact: String },

    #[error("Invalid suite: {0}")]
    InvalidSuite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
