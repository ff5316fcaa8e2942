//! Metrics module for Prometheus-based monitoring.
//!
//! Covers task outcomes and durations, chat-completion usage, and routing
//! decisions. A run can dump the text exposition to a file on exit.
//!
//! # Example
//!
//! ```ignore
//! use deckbench::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! let collector = MetricsCollector::new();
//! collector.record_task("baseline", "success", 12.0);
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics, write_metrics};

pub use prometheus::{
    EMBEDDING_CACHE_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL, LLM_TOKENS_TOTAL, REGISTRY,
    ROUTING_TOTAL, TASKS_IN_FLIGHT, TASKS_TOTAL, TASK_DURATION,
};
