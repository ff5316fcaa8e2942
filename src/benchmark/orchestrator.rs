//! Benchmark orchestrator.
//!
//! Runs configurations one after another. Within a configuration, tasks are
//! dispatched through a semaphore-bounded pool and folded into the
//! aggregate in completion order.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::aggregate::ConfigurationResult;
use super::config::{Configuration, PromptStrategy};
use super::report::Report;
use crate::corpus::Task;
use crate::error::BenchmarkError;
use crate::metrics::MetricsCollector;
use crate::routing::PromptRouter;
use crate::runner::{TaskResult, TaskRunner};

/// Default number of tasks in flight per configuration.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// One task's result plus the class it was routed to, if any.
struct Dispatched {
    result: TaskResult,
    route: Option<usize>,
}

/// Drives every configuration over the same task set.
pub struct BenchmarkOrchestrator {
    runner: Arc<TaskRunner>,
    router: Option<Arc<PromptRouter>>,
    concurrency: usize,
    metrics: MetricsCollector,
}

impl BenchmarkOrchestrator {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self {
            runner,
            router: None,
            concurrency: DEFAULT_CONCURRENCY,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_router(mut self, router: Arc<PromptRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Reject setups that cannot run before any task is dispatched.
    pub fn validate(&self, configurations: &[Configuration]) -> Result<(), BenchmarkError> {
        if self.concurrency == 0 {
            return Err(BenchmarkError::InvalidConcurrency);
        }
        let mut seen = HashSet::new();
        for config in configurations {
            if !seen.insert(config.name.as_str()) {
                return Err(BenchmarkError::DuplicateConfiguration(config.name.clone()));
            }
            if config.is_routed() && self.router.is_none() {
                return Err(BenchmarkError::RouterMissing(config.name.clone()));
            }
            config.validate()?;
        }
        Ok(())
    }

    /// Run every configuration against `tasks` and assemble the report.
    ///
    /// Only setup problems return `Err`; per-task failures are recorded in
    /// the configuration's aggregate.
    pub async fn run(
        &self,
        configurations: &[Configuration],
        tasks: &[Task],
    ) -> Result<Report, BenchmarkError> {
        self.validate(configurations)?;

        let mut report = Report::new(Utc::now());
        for config in configurations {
            let result = self.run_configuration(config, tasks).await;
            report.insert(config.name.clone(), result);
        }
        Ok(report)
    }

    /// Run one configuration to completion.
    pub async fn run_configuration(
        &self,
        config: &Configuration,
        tasks: &[Task],
    ) -> ConfigurationResult {
        info!(
            configuration = %config.name,
            model = %config.model,
            tasks = tasks.len(),
            concurrency = self.concurrency,
            "Running configuration"
        );
        let started = Instant::now();

        let mut aggregate = ConfigurationResult::new().with_prompt_length(config.prompt_length());
        if let (PromptStrategy::Routed, Some(router)) = (&config.prompt, &self.router) {
            aggregate = aggregate.with_routing_classes(router.classes());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut pending: FuturesUnordered<_> = tasks
            .iter()
            .map(|task| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return Dispatched {
                                result: TaskResult::infrastructure(task.index, e.to_string()),
                                route: None,
                            }
                        }
                    };
                    self.metrics.inc_in_flight();
                    let dispatched = AssertUnwindSafe(self.dispatch(config, task))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            warn!(task = task.index, "Task panicked");
                            Dispatched {
                                result: TaskResult::infrastructure(
                                    task.index,
                                    "task panicked during execution",
                                ),
                                route: None,
                            }
                        });
                    self.metrics.dec_in_flight();
                    dispatched
                }
            })
            .collect();

        while let Some(Dispatched { result, route }) = pending.next().await {
            info!(
                configuration = %config.name,
                task = result.task_index,
                outcome = %result.outcome,
                elapsed_secs = result.elapsed_seconds,
                "Task finished"
            );
            self.metrics
                .record_task(&config.name, result.outcome.label(), result.elapsed_seconds);
            if let Some(class_id) = route {
                aggregate.record_route(class_id);
            }
            aggregate.record(&result);
        }

        let aggregate = aggregate.finalize();
        info!(
            configuration = %config.name,
            success_count = aggregate.success_count,
            total_tasks = aggregate.total_tasks,
            success_rate = aggregate.success_rate,
            wall_secs = started.elapsed().as_secs_f64(),
            "Configuration complete"
        );
        aggregate
    }

    /// Resolve the prompt for one task and run it.
    async fn dispatch(&self, config: &Configuration, task: &Task) -> Dispatched {
        match &config.prompt {
            PromptStrategy::Fixed { variant } => Dispatched {
                result: self.runner.run(&config.model, variant.text(), task).await,
                route: None,
            },
            PromptStrategy::Custom { text } => Dispatched {
                result: self.runner.run(&config.model, text, task).await,
                route: None,
            },
            PromptStrategy::Routed => {
                let Some(router) = &self.router else {
                    return Dispatched {
                        result: TaskResult::infrastructure(task.index, "no prompt router configured"),
                        route: None,
                    };
                };
                match router.route(&task.text).await {
                    Ok(decision) => Dispatched {
                        result: self
                            .runner
                            .run(&config.model, decision.variant.text(), task)
                            .await,
                        route: Some(decision.class_id),
                    },
                    Err(e) => {
                        warn!(task = task.index, error = %e, "Routing failed");
                        Dispatched {
                            result: TaskResult::infrastructure(task.index, e.to_string()),
                            route: None,
                        }
                    }
                }
            }
        }
    }
}
