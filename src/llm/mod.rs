//! LLM integration for deckbench.
//!
//! Two backends are consumed: a chat-completion endpoint that produces the
//! slide-deck script, and an embedding endpoint that feeds the routing
//! classifier. Both sit behind traits so the benchmark engine can be driven
//! by mocks in tests.
//!
//! ```ignore
//! use deckbench::llm::{GenerationRequest, LlmProvider, Message, OpenRouterProvider};
//!
//! let provider = OpenRouterProvider::new(api_key)?;
//! let request = GenerationRequest::new(
//!     "openai/gpt-oss-20b:free",
//!     vec![Message::system(prompt), Message::user(task)],
//! );
//! let response = provider.generate(request).await?;
//! ```

pub mod cache;
pub mod providers;
pub mod types;

pub use cache::{CacheConfig, CacheStats, ContentHash, EmbeddingCache};
pub use providers::{OpenRouterProvider, OPENROUTER_BASE_URL};
pub use types::{
    Choice, EmbeddingProvider, EmbeddingRequest, GenerationRequest, GenerationResponse,
    LlmProvider, Message, Usage,
};
