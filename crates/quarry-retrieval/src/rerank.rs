//! Second-pass precision ranking with a pairwise relevance model.

use std::sync::Arc;

use quarry_llm::RelevanceScorer;
use quarry_memory::Document;

use crate::error::{Result, RetrievalError};

pub struct Reranker<S: RelevanceScorer> {
    scorer: Arc<S>,
}

impl<S: RelevanceScorer> std::fmt::Debug for Reranker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("scorer", &self.scorer.name())
            .finish()
    }
}

impl<S: RelevanceScorer> Reranker<S> {
    #[must_use]
    pub fn new(scorer: Arc<S>) -> Self {
        Self { scorer }
    }

    /// Score every candidate against `query` and keep the best `k`.
    ///
    /// NaN scores count as `0.0`. Equal scores keep input order. The result has exactly
    /// `min(k, candidates.len())` entries.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::BackendUnavailable`] if the scorer fails and
    /// [`RetrievalError::ScoreCountMismatch`] if it returns the wrong number of scores.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Document>,
        k: usize,
    ) -> Result<Vec<(Document, f32)>> {
        if k == 0 || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let pairs: Vec<(String, String)> = candidates
            .iter()
            .map(|d| (query.to_owned(), d.content.clone()))
            .collect();
        let scores = self
            .scorer
            .score_pairs(&pairs)
            .await
            .map_err(|e| RetrievalError::unavailable(self.scorer.name(), e))?;
        if scores.len() != candidates.len() {
            return Err(RetrievalError::ScoreCountMismatch {
                expected: candidates.len(),
                actual: scores.len(),
            });
        }

        let nan_count = scores.iter().filter(|s| s.is_nan()).count();
        if nan_count > 0 {
            tracing::debug!(nan_count, "clamping unusable relevance scores to 0");
        }

        let mut ranked: Vec<(Document, f32)> = candidates
            .into_iter()
            .zip(scores.into_iter().map(|s| if s.is_nan() { 0.0 } else { s }))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        Ok(ranked)
    }
}
