//! Backend implementations of the LLM and embedding traits.

pub mod openrouter;

pub use openrouter::{OpenRouterProvider, OPENROUTER_BASE_URL};
