//! Document model, content fingerprints, text splitting and vector storage.

pub mod document;
pub mod fingerprint;
pub mod in_memory_store;
pub mod vector_store;

pub use document::{Document, DocumentLoader, Metadata, Splitter, SplitterConfig, TextSplitter};
pub use fingerprint::Fingerprint;
pub use in_memory_store::InMemoryVectorStore;
pub use vector_store::{BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
