//! deckbench: benchmark engine for LLM slide-deck code generation.
//!
//! Each task asks a model for a python-pptx script, runs the script in a
//! scratch directory and passes when the script exits zero and writes its
//! deck. Configurations vary the model, the system prompt, or route the
//! prompt per task with a fixed-weight classifier.

// Core modules
pub mod benchmark;
pub mod cli;
pub mod corpus;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod routing;
pub mod runner;

// Re-export commonly used error types
pub use error::{BenchmarkError, ClassifierError, CorpusError, LlmError, ReportError};
