//! Prompt routing.
//!
//! Each task's text is embedded, scored by a linear classifier and mapped to
//! one of the built-in system prompt variants.

pub mod classifier;
pub mod prompts;
pub mod router;

pub use classifier::{ClassifierArtifact, RoutingClassifier};
pub use prompts::{PromptVariant, RoutingTable};
pub use router::{PromptRouter, RouteDecision, RoutingError, DEFAULT_EMBEDDING_MODEL};
