//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by deckbench and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{CounterVec, Encoder, Gauge, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

/// Serializes `init_metrics` so every static comes from the same registry.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Global Prometheus registry for all deckbench metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total tasks finished, labeled by configuration and outcome kind.
pub static TASKS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// End-to-end task duration in seconds, labeled by configuration.
pub static TASK_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Tasks currently generating or executing.
pub static TASKS_IN_FLIGHT: OnceLock<Gauge> = OnceLock::new();

/// Total chat-completion requests, labeled by model and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Chat-completion latency in seconds, labeled by model.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total tokens used, labeled by model and type (prompt/completion).
pub static LLM_TOKENS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Routing decisions, labeled by class id.
pub static ROUTING_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Embedding cache lookups, labeled by result (hit/miss).
pub static EMBEDDING_CACHE_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Recording before initialization is a no-op, and a
/// second call leaves the first set of metrics in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    // Task metrics
    let tasks_total = CounterVec::new(
        Opts::new("deckbench_tasks_total", "Total number of tasks finished"),
        &["configuration", "outcome"],
    )?;

    let task_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "deckbench_task_duration_seconds",
            "Task duration in seconds, generation plus execution",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["configuration"],
    )?;

    let tasks_in_flight = Gauge::new(
        "deckbench_tasks_in_flight",
        "Number of tasks currently being processed",
    )?;

    // LLM metrics
    let llm_requests_total = CounterVec::new(
        Opts::new("deckbench_llm_requests_total", "Total chat-completion requests"),
        &["model", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "deckbench_llm_latency_seconds",
            "Chat-completion latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["model"],
    )?;

    let llm_tokens_total = CounterVec::new(
        Opts::new("deckbench_llm_tokens_total", "Total tokens used"),
        &["model", "type"],
    )?;

    // Routing metrics
    let routing_total = CounterVec::new(
        Opts::new("deckbench_routing_decisions_total", "Routing decisions per class"),
        &["class"],
    )?;

    let embedding_cache_total = CounterVec::new(
        Opts::new("deckbench_embedding_cache_total", "Embedding cache lookups"),
        &["result"],
    )?;

    registry.register(Box::new(tasks_total.clone()))?;
    registry.register(Box::new(task_duration.clone()))?;
    registry.register(Box::new(tasks_in_flight.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;
    registry.register(Box::new(llm_tokens_total.clone()))?;
    registry.register(Box::new(routing_total.clone()))?;
    registry.register(Box::new(embedding_cache_total.clone()))?;

    let _ = TASKS_TOTAL.set(tasks_total);
    let _ = TASK_DURATION.set(task_duration);
    let _ = TASKS_IN_FLIGHT.set(tasks_in_flight);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);
    let _ = LLM_TOKENS_TOTAL.set(llm_tokens_total);
    let _ = ROUTING_TOTAL.set(routing_total);
    let _ = EMBEDDING_CACHE_TOTAL.set(embedding_cache_total);
    let _ = REGISTRY.set(registry);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead when the registry is missing or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

/// Write the text exposition to `path`, for node-exporter style scraping.
pub fn write_metrics(path: &std::path::Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, export_metrics())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        let result = init_metrics();
        assert!(result.is_ok() || REGISTRY.get().is_some());
    }

    #[test]
    fn test_metrics_after_init() {
        let _ = init_metrics();

        if let Some(tasks) = TASKS_TOTAL.get() {
            tasks.with_label_values(&["basic", "success"]).inc();
        }

        let metrics = export_metrics();
        assert!(!metrics.starts_with("# Error"));
        assert!(metrics.contains("deckbench_tasks_total"));
    }

    #[test]
    fn test_write_metrics() {
        let _ = init_metrics();
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("deckbench.prom");

        write_metrics(&path).expect("write");
        let content = std::fs::read_to_string(&path).expect("read");
        assert!(!content.is_empty());
    }
}
