//! Configuration loading, backend bootstrap and the assembled retrieval engine.

pub mod bootstrap;
pub mod config;
pub mod engine;

pub use config::Config;
pub use engine::{Answer, IngestSummary, NO_ANSWER, RagEngine};
