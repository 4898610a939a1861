use std::sync::Arc;

use quarry_llm::LlmProvider;
use quarry_memory::{BoxFuture, Document};

use crate::ensemble::{EnsembleRetriever, ScoredDocument};
use crate::error::Result;
use crate::expander::QueryExpander;
use crate::retriever::Retriever;

/// Expands the query, sends every variant to the ensemble and fuses all lists in one pass.
pub struct MultiQueryRetriever<P: LlmProvider> {
    expander: QueryExpander<P>,
    ensemble: Arc<EnsembleRetriever>,
    num_queries: usize,
}

impl<P: LlmProvider> std::fmt::Debug for MultiQueryRetriever<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiQueryRetriever")
            .field("expander", &self.expander)
            .field("ensemble", &self.ensemble)
            .field("num_queries", &self.num_queries)
            .finish()
    }
}

impl<P: LlmProvider> MultiQueryRetriever<P> {
    #[must_use]
    pub fn new(expander: QueryExpander<P>, ensemble: Arc<EnsembleRetriever>, num_queries: usize) -> Self {
        Self {
            expander,
            ensemble,
            num_queries,
        }
    }

    /// The query variants used for `query`, original first.
    pub async fn variants(&self, query: &str) -> Vec<String> {
        self.expander.expand(query, self.num_queries).await
    }

    /// # Errors
    ///
    /// Returns an error only if every retriever call for every variant fails.
    pub async fn search_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let variants = self.variants(query).await;
        tracing::debug!(variants = variants.len(), "multi-query search");
        self.ensemble.search_many(&variants, k).await
    }
}

impl<P: LlmProvider> Retriever for MultiQueryRetriever<P> {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "multi_query"
    }

    fn search<'a>(&'a self, query: &'a str, k: usize) -> BoxFuture<'a, Result<Vec<Document>>> {
        Box::pin(async move {
            let mut fused = self.search_scored(query, k).await?;
            fused.truncate(k);
            Ok(fused.into_iter().map(|s| s.document).collect())
        })
    }
}
