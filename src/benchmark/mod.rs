//! Benchmark engine.
//!
//! ```text
//! Configuration × Task ─▶ BenchmarkOrchestrator ─▶ TaskRunner (bounded pool)
//!                                │
//!                                ├─ PromptRouter (routed configurations)
//!                                ▼
//!                     ConfigurationResult per configuration
//!                                ▼
//!                        Report ─▶ ReportSink (JSON)
//! ```

pub mod aggregate;
pub mod config;
pub mod coverage;
pub mod orchestrator;
pub mod report;

pub use aggregate::ConfigurationResult;
pub use config::{BenchmarkSuite, Configuration, PromptStrategy, RoutingSettings};
pub use coverage::{analyze, CoverageAnalysis};
pub use orchestrator::{BenchmarkOrchestrator, DEFAULT_CONCURRENCY};
pub use report::{Report, ReportSink};
