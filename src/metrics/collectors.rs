//! Custom metric collectors for deckbench operations.
//!
//! `MetricsCollector` wraps the raw Prometheus statics with typed recording
//! methods. Every method is a no-op until `init_metrics()` has run.

use super::prometheus::{
    EMBEDDING_CACHE_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL, LLM_TOKENS_TOTAL, ROUTING_TOTAL,
    TASKS_IN_FLIGHT, TASKS_TOTAL, TASK_DURATION,
};
use crate::runner::TokenUsage;

/// Metrics collector for recording benchmark operational metrics.
///
/// # Example
///
/// ```ignore
/// use deckbench::metrics::{MetricsCollector, init_metrics};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
/// collector.record_task("gpt-4o", "success", 12.5);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one finished task.
    ///
    /// `outcome` is the outcome label (`success`, `execution_failed`, ...).
    pub fn record_task(&self, configuration: &str, outcome: &str, duration_secs: f64) {
        if let Some(tasks_total) = TASKS_TOTAL.get() {
            tasks_total
                .with_label_values(&[configuration, outcome])
                .inc();
        }

        if let Some(task_duration) = TASK_DURATION.get() {
            task_duration
                .with_label_values(&[configuration])
                .observe(duration_secs);
        }

        tracing::trace!(
            configuration = configuration,
            outcome = outcome,
            duration_secs = duration_secs,
            "Recorded task metric"
        );
    }

    /// Record a chat-completion request. `tokens` is `None` when the request failed.
    pub fn record_llm_request(
        &self,
        model: &str,
        success: bool,
        latency_secs: f64,
        tokens: Option<TokenUsage>,
    ) {
        let status = if success { "success" } else { "failure" };

        if let Some(llm_requests) = LLM_REQUESTS_TOTAL.get() {
            llm_requests.with_label_values(&[model, status]).inc();
        }

        if let Some(llm_latency) = LLM_LATENCY.get() {
            llm_latency
                .with_label_values(&[model])
                .observe(latency_secs);
        }

        if let (Some(llm_tokens), Some(tokens)) = (LLM_TOKENS_TOTAL.get(), tokens) {
            llm_tokens
                .with_label_values(&[model, "prompt"])
                .inc_by(tokens.prompt_tokens as f64);
            llm_tokens
                .with_label_values(&[model, "completion"])
                .inc_by(tokens.completion_tokens as f64);
        }

        tracing::trace!(
            model = model,
            status = status,
            latency_secs = latency_secs,
            "Recorded LLM request metric"
        );
    }

    pub fn record_route(&self, class_id: usize) {
        if let Some(routing) = ROUTING_TOTAL.get() {
            routing
                .with_label_values(&[class_id.to_string().as_str()])
                .inc();
        }
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if let Some(cache) = EMBEDDING_CACHE_TOTAL.get() {
            let result = if hit { "hit" } else { "miss" };
            cache.with_label_values(&[result]).inc();
        }
    }

    pub fn inc_in_flight(&self) {
        if let Some(in_flight) = TASKS_IN_FLIGHT.get() {
            in_flight.inc();
        }
    }

    pub fn dec_in_flight(&self) {
        if let Some(in_flight) = TASKS_IN_FLIGHT.get() {
            in_flight.dec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{export_metrics, init_metrics};

    fn ensure_metrics_init() {
        let _ = init_metrics();
    }

    #[test]
    fn test_metrics_collector_new() {
        let collector = MetricsCollector::new();
        assert!(std::mem::size_of_val(&collector) == 0);
    }

    #[test]
    fn test_record_task() {
        ensure_metrics_init();
        let collector = MetricsCollector::new();

        collector.record_task("collector-test", "success", 12.5);
        collector.record_task("collector-test", "execution_failed", 3.0);

        let exported = export_metrics();
        assert!(exported.contains("configuration=\"collector-test\""));
    }

    #[test]
    fn test_record_llm_request() {
        ensure_metrics_init();
        let collector = MetricsCollector::new();

        collector.record_llm_request("gpt-4", true, 2.5, Some(TokenUsage::new(1000, 500, 1500)));
        collector.record_llm_request("claude-3", false, 5.0, None);
    }

    #[test]
    fn test_record_routing() {
        ensure_metrics_init();
        let collector = MetricsCollector::new();

        collector.record_route(2);
        collector.record_cache_lookup(true);
        collector.record_cache_lookup(false);
        collector.inc_in_flight();
        collector.dec_in_flight();

        assert!(export_metrics().contains("deckbench_routing_decisions_total"));
    }
}
