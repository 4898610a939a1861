use std::future::Future;
use std::pin::Pin;

use crate::document::Metadata;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("collection {0} not found")]
    MissingCollection(String),
    #[error("vector has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("vector store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Metadata,
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: Metadata,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Similarity index over embedded points. Object safe so retrievers can hold `Arc<dyn VectorStore>`.
pub trait VectorStore: Send + Sync {
    /// Create `collection` if missing. Fails if it exists with a different `vector_size`.
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    /// Insert or replace points by id.
    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Nearest points by similarity, best first.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Zero for a collection that does not exist.
    fn count(&self, collection: &str) -> BoxFuture<'_, Result<usize, VectorStoreError>>;
}
