//! Generation, embedding and pairwise relevance back-ends.
//!
//! Retrieval code depends only on the [`LlmProvider`] and [`RelevanceScorer`] traits; the
//! concrete providers here are interchangeable behind [`any::AnyProvider`] and
//! [`any::AnyScorer`].

pub mod any;
pub mod error;
pub(crate) mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub(crate) mod retry;
pub mod scorer;

pub use error::LlmError;
pub use provider::LlmProvider;
pub use scorer::RelevanceScorer;
