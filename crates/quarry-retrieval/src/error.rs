//! Error types for quarry-retrieval.

use quarry_llm::LlmError;
use quarry_memory::VectorStoreError;

/// Outcome of a parent/child ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub parents_stored: usize,
    pub children_indexed: usize,
    /// Parents that were stored but produced no children, so no query can reach them.
    pub childless_parents: Vec<String>,
}

impl IngestionReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.childless_parents.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Some parents produced no retrievable children. Everything else was stored.
    #[error(
        "ingestion incomplete: {} of {} parents produced no children",
        report.childless_parents.len(),
        report.parents_stored
    )]
    Ingestion { report: IngestionReport },

    /// A child references a parent that is not in the parent map.
    #[error("child references missing parent {parent_id}")]
    Consistency { parent_id: String },

    /// An indexed child has no `parent_id` at all.
    #[error("indexed child {child} carries no parent_id")]
    OrphanChild { child: String },

    #[error("parent {parent_id} still has {children} children")]
    ParentHasChildren { parent_id: String, children: usize },

    #[error("{backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("all {attempted} retriever calls failed")]
    AllBackendsFailed { attempted: usize },

    #[error("scorer returned {actual} scores for {expected} candidates")]
    ScoreCountMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

impl RetrievalError {
    /// A corrupted parent/child index. Fusion must surface these instead of dropping the member.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency { .. } | Self::OrphanChild { .. })
    }

    pub(crate) fn unavailable(backend: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
