//! Dense retrieval over a [`VectorStore`] collection.

use std::sync::Arc;

use quarry_llm::LlmProvider;
use quarry_memory::{BoxFuture, Document, Fingerprint, Metadata, VectorPoint, VectorStore};

use crate::error::{Result, RetrievalError};
use crate::retriever::Retriever;

const POINT_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x71, 0x75, 0x61, 0x72, // "quar"
    0x72, 0x79, 0x2d, 0x76, // "ry-v"
    0x65, 0x63, 0x74, 0x6f, // "ecto"
    0x72, 0x00, 0x00, 0x01, // "r\0\0\x01"
]);

/// Payload key holding the document text next to its metadata.
pub const CONTENT_KEY: &str = "page_content";

/// Metadata that, together with content, makes a point id unique.
const ID_KEYS: &[&str] = &["source", "parent_id", "start_index"];

/// Deterministic point id: re-adding the same chunk replaces it instead of duplicating it.
#[must_use]
pub fn point_id(document: &Document) -> String {
    let fingerprint = Fingerprint::of_document(document, ID_KEYS);
    uuid::Uuid::new_v5(&POINT_NAMESPACE, fingerprint.as_bytes()).to_string()
}

pub struct VectorRetriever<P: LlmProvider> {
    provider: Arc<P>,
    store: Arc<dyn VectorStore>,
    collection: String,
    min_score: Option<f32>,
}

impl<P: LlmProvider> std::fmt::Debug for VectorRetriever<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRetriever")
            .field("provider", &self.provider.name())
            .field("collection", &self.collection)
            .field("min_score", &self.min_score)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> VectorRetriever<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            provider,
            store,
            collection: collection.into(),
            min_score: None,
        }
    }

    /// Drop hits whose cosine similarity is below `min_score`.
    #[must_use]
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed and index `documents`, returning their point ids in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or the store rejects the points.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut points = Vec::with_capacity(documents.len());
        for document in documents {
            let vector = self.provider.embed(&document.content).await?;
            let id = point_id(&document);
            let mut payload: Metadata = document.metadata;
            payload.insert(CONTENT_KEY.into(), document.content.into());
            points.push(VectorPoint {
                id,
                vector,
                payload,
            });
        }

        let dims = points.first().map_or(0, |p| p.vector.len());
        self.store.ensure_collection(&self.collection, dims).await?;

        let ids = points.iter().map(|p| p.id.clone()).collect();
        self.store.upsert(&self.collection, points).await?;
        tracing::debug!(collection = %self.collection, "indexed vector points");
        Ok(ids)
    }

    /// Top `k` documents with their cosine similarity, best first. With a minimum score set,
    /// fewer than `k` may come back.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::BackendUnavailable`] if embedding the query or searching fails.
    pub async fn search_with_scores(&self, query: &str, k: usize) -> Result<Vec<(Document, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let exists = self
            .store
            .collection_exists(&self.collection)
            .await
            .map_err(|e| RetrievalError::unavailable("vector", e))?;
        if !exists {
            return Ok(Vec::new());
        }

        let vector = self
            .provider
            .embed(query)
            .await
            .map_err(|e| RetrievalError::unavailable("vector", e))?;
        let hits = self
            .store
            .search(&self.collection, vector, k)
            .await
            .map_err(|e| RetrievalError::unavailable("vector", e))?;

        let min_score = self.min_score.unwrap_or(f32::NEG_INFINITY);
        Ok(hits
            .into_iter()
            .filter(|hit| hit.score >= min_score)
            .map(|hit| {
                let mut metadata = hit.payload;
                let content = match metadata.remove(CONTENT_KEY) {
                    Some(serde_json::Value::String(s)) => s,
                    _ => String::new(),
                };
                (Document { content, metadata }, hit.score)
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns an error if the store fails to delete.
    pub async fn delete(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() || !self.store.collection_exists(&self.collection).await? {
            return Ok(());
        }
        self.store.delete_by_ids(&self.collection, ids).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.store.count(&self.collection).await?)
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

impl<P: LlmProvider> Retriever for VectorRetriever<P> {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "vector"
    }

    fn search<'a>(&'a self, query: &'a str, k: usize) -> BoxFuture<'a, Result<Vec<Document>>> {
        Box::pin(async move {
            let hits = self.search_with_scores(query, k).await?;
            Ok(hits.into_iter().map(|(document, _)| document).collect())
        })
    }
}
