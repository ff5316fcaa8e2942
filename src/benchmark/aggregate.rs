//! Per-configuration aggregation.
//!
//! Every field updated by [`ConfigurationResult::record`] is an integer
//! running sum, so results may arrive in any order. Elapsed time is summed in
//! whole nanoseconds and only converted to seconds by
//! [`ConfigurationResult::finalize`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::{TaskResult, TokenUsage};

/// Aggregate metrics for one configuration, as persisted in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationResult {
    #[serde(default)]
    pub success_rate: f64,
    pub success_count: usize,
    pub total_tasks: usize,
    #[serde(default)]
    pub avg_time: f64,
    pub total_time: f64,
    pub token_usage: TokenUsage,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_length: Option<usize>,
    #[serde(default)]
    pub successful_indices: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_counts: Option<BTreeMap<usize, usize>>,
    /// Exact sum of task durations; not persisted.
    #[serde(skip)]
    elapsed: Duration,
}

impl PartialEq for ConfigurationResult {
    fn eq(&self, other: &Self) -> bool {
        self.success_rate == other.success_rate
            && self.success_count == other.success_count
            && self.total_tasks == other.total_tasks
            && self.avg_time == other.avg_time
            && self.total_time == other.total_time
            && self.token_usage == other.token_usage
            && self.errors == other.errors
            && self.prompt_length == other.prompt_length
            && self.successful_indices == other.successful_indices
            && self.routing_counts == other.routing_counts
    }
}

impl Default for ConfigurationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationResult {
    pub fn new() -> Self {
        Self {
            success_rate: 0.0,
            success_count: 0,
            total_tasks: 0,
            avg_time: 0.0,
            total_time: 0.0,
            token_usage: TokenUsage::default(),
            errors: Vec::new(),
            prompt_length: None,
            successful_indices: Vec::new(),
            routing_counts: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_prompt_length(mut self, length: Option<usize>) -> Self {
        self.prompt_length = length;
        self
    }

    /// Seed the routing histogram so every class appears, even at zero.
    pub fn with_routing_classes(mut self, classes: impl IntoIterator<Item = usize>) -> Self {
        self.routing_counts = Some(classes.into_iter().map(|c| (c, 0)).collect());
        self
    }

    pub fn record(&mut self, result: &TaskResult) {
        self.total_tasks += 1;
        let elapsed = Duration::try_from_secs_f64(result.elapsed_seconds).unwrap_or_default();
        self.elapsed = self.elapsed.saturating_add(elapsed);
        self.token_usage += result.tokens;

        if result.success() {
            self.success_count += 1;
            self.successful_indices.push(result.task_index);
        }
        if let Some(error) = result.error() {
            self.errors.push(error.to_string());
        }
    }

    pub fn record_route(&mut self, class_id: usize) {
        *self
            .routing_counts
            .get_or_insert_with(BTreeMap::new)
            .entry(class_id)
            .or_insert(0) += 1;
    }

    /// Compute derived fields once all tasks are in.
    pub fn finalize(mut self) -> Self {
        self.total_time = self.elapsed.as_secs_f64();
        if self.total_tasks > 0 {
            self.success_rate = self.success_count as f64 / self.total_tasks as f64;
            self.avg_time = self.total_time / self.total_tasks as f64;
        } else {
            self.success_rate = 0.0;
            self.avg_time = 0.0;
        }
        self.successful_indices.sort_unstable();
        self.errors.sort();
        self
    }
}
