//! Per-task prompt routing: embed the task text, classify, pick a variant.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::classifier::RoutingClassifier;
use super::prompts::{PromptVariant, RoutingTable};
use crate::error::{ClassifierError, LlmError};
use crate::llm::{EmbeddingCache, EmbeddingProvider, EmbeddingRequest};
use crate::metrics::MetricsCollector;

/// Embedding model the shipped classifier was trained against.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/paraphrase-minilm-l6-v2";

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("Classification failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Class {0} has no prompt variant")]
    UnmappedClass(usize),
}

/// Result of routing one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub class_id: usize,
    pub variant: PromptVariant,
}

/// Chooses a system prompt for each task.
pub struct PromptRouter {
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_model: String,
    cache: EmbeddingCache,
    classifier: RoutingClassifier,
    table: RoutingTable,
    metrics: MetricsCollector,
}

impl PromptRouter {
    /// Fails when the classifier and table disagree on the number of classes.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_model: impl Into<String>,
        classifier: RoutingClassifier,
        table: RoutingTable,
    ) -> Result<Self, ClassifierError> {
        if classifier.num_classes() != table.len() {
            return Err(ClassifierError::ClassCountMismatch {
                classifier: classifier.num_classes(),
                table: table.len(),
            });
        }
        Ok(Self {
            embedder,
            embedding_model: embedding_model.into(),
            cache: EmbeddingCache::default(),
            classifier,
            table,
            metrics: MetricsCollector::new(),
        })
    }

    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// All class ids the router can emit.
    pub fn classes(&self) -> std::ops::Range<usize> {
        self.table.classes()
    }

    /// Embedding for `text`, memoized per distinct text.
    pub async fn embedding(&self, text: &str) -> Result<Vec<f64>, LlmError> {
        if let Some(cached) = self.cache.get(text) {
            self.metrics.record_cache_lookup(true);
            return Ok(cached);
        }
        self.metrics.record_cache_lookup(false);

        let embedding = self
            .embedder
            .embed(EmbeddingRequest::new(&self.embedding_model, text))
            .await?;
        self.cache.insert(text, embedding.clone());
        Ok(embedding)
    }

    pub async fn route(&self, text: &str) -> Result<RouteDecision, RoutingError> {
        let embedding = self.embedding(text).await?;
        let class_id = self.classifier.classify(&embedding)?;
        let variant = self
            .table
            .variant_for(class_id)
            .ok_or(RoutingError::UnmappedClass(class_id))?;

        debug!(class_id, variant = %variant, "Routed task");
        self.metrics.record_route(class_id);
        Ok(RouteDecision { class_id, variant })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::classifier::ClassifierArtifact;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds by keyword so routing is predictable.
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, request: EmbeddingRequest) -> Result<Vec<f64>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.input.contains("offline") {
                return Err(LlmError::RequestFailed("connection refused".to_string()));
            }
            let hot = ["intro", "simple", "table", "outline"]
                .iter()
                .position(|k| request.input.contains(k))
                .unwrap_or(0);
            let mut v = vec![0.0; 4];
            v[hot] = 1.0;
            Ok(v)
        }
    }

    fn router() -> (PromptRouter, Arc<KeywordEmbedder>) {
        let embedder = Arc::new(KeywordEmbedder {
            calls: AtomicUsize::new(0),
        });
        let classifier = RoutingClassifier::new(ClassifierArtifact {
            weights: (0..4)
                .map(|i| (0..4).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
                .collect(),
            bias: vec![0.0; 4],
        })
        .expect("classifier");
        let router = PromptRouter::new(
            embedder.clone(),
            DEFAULT_EMBEDDING_MODEL,
            classifier,
            RoutingTable::default(),
        )
        .expect("router");
        (router, embedder)
    }

    #[tokio::test]
    async fn test_route_maps_class_to_variant() {
        let (router, _) = router();
        let decision = router.route("a table of figures").await.expect("route");
        assert_eq!(
            decision,
            RouteDecision {
                class_id: 2,
                variant: PromptVariant::Detailed
            }
        );
        let decision = router.route("an outline").await.expect("route");
        assert_eq!(decision.variant, PromptVariant::Structured);
    }

    #[tokio::test]
    async fn test_embedding_is_memoized() {
        let (router, embedder) = router();
        router.route("simple deck").await.expect("route");
        router.route("simple deck").await.expect("route");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(router.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_not_cached() {
        let (router, embedder) = router();
        assert!(matches!(
            router.route("offline").await,
            Err(RoutingError::Embedding(_))
        ));
        assert!(router.route("offline").await.is_err());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert!(router.cache().is_empty());
    }

    #[test]
    fn test_class_count_mismatch() {
        let embedder = Arc::new(KeywordEmbedder {
            calls: AtomicUsize::new(0),
        });
        let classifier = RoutingClassifier::new(ClassifierArtifact {
            weights: vec![vec![1.0], vec![0.0]],
            bias: vec![0.0, 0.0],
        })
        .expect("classifier");
        let result = PromptRouter::new(embedder, "m", classifier, RoutingTable::default());
        assert!(matches!(
            result,
            Err(ClassifierError::ClassCountMismatch {
                classifier: 2,
                table: 4
            })
        ));
    }
}
