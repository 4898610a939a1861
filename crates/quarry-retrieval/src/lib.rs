//! Hybrid retrieval core.
//!
//! Independent retrievers (dense [`vector::VectorRetriever`], lexical
//! [`keyword::Bm25Retriever`], hierarchical [`hierarchy::ParentDocumentStore`]) implement one
//! [`Retriever`] trait. [`ensemble::EnsembleRetriever`] fuses their ranked lists by weighted rank
//! position and deduplicates by content fingerprint, [`expander::QueryExpander`] widens recall
//! with generated query variants and [`rerank::Reranker`] re-scores the survivors with a pairwise
//! relevance model. [`pipeline::HybridPipeline`] chains the stages.

pub mod ensemble;
pub mod error;
pub mod expander;
pub mod hierarchy;
pub mod keyword;
pub mod multi_query;
pub mod pipeline;
pub mod rerank;
pub mod retriever;
pub mod vector;

pub use ensemble::{EnsembleRetriever, Fusion, ScoredDocument, fuse};
pub use error::{IngestionReport, Result, RetrievalError};
pub use expander::QueryExpander;
pub use hierarchy::{DeletePolicy, ParentDocumentStore, ParentRecord};
pub use keyword::Bm25Retriever;
pub use multi_query::MultiQueryRetriever;
pub use pipeline::{HybridPipeline, ScoreKind, SearchOutcome, format_as_context};
pub use rerank::Reranker;
pub use retriever::{QueryInput, Retriever};
pub use vector::VectorRetriever;
