//! End-to-end hybrid search: expand, fuse, narrow, rerank.

use std::fmt::Write;
use std::sync::Arc;

use quarry_llm::{LlmProvider, RelevanceScorer};

use crate::ensemble::{EnsembleRetriever, ScoredDocument};
use crate::error::Result;
use crate::expander::QueryExpander;
use crate::rerank::Reranker;
use crate::retriever::QueryInput;

/// Which stage produced the final score of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    Fused,
    Reranked,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub variants: Vec<String>,
    pub results: Vec<ScoredDocument>,
    pub score_kind: ScoreKind,
}

pub struct HybridPipeline<P: LlmProvider, S: RelevanceScorer> {
    ensemble: Arc<EnsembleRetriever>,
    expander: Option<(QueryExpander<P>, usize)>,
    reranker: Option<Reranker<S>>,
    fetch_k: usize,
    top_k: usize,
}

impl<P: LlmProvider, S: RelevanceScorer> std::fmt::Debug for HybridPipeline<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridPipeline")
            .field("ensemble", &self.ensemble)
            .field("expansion", &self.expander.as_ref().map(|(_, n)| *n))
            .field("rerank", &self.reranker.is_some())
            .field("fetch_k", &self.fetch_k)
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl<P: LlmProvider, S: RelevanceScorer> HybridPipeline<P, S> {
    #[must_use]
    pub fn new(ensemble: Arc<EnsembleRetriever>) -> Self {
        Self {
            ensemble,
            expander: None,
            reranker: None,
            fetch_k: 10,
            top_k: 5,
        }
    }

    #[must_use]
    pub fn with_expander(mut self, expander: QueryExpander<P>, num_queries: usize) -> Self {
        self.expander = Some((expander, num_queries));
        self
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Reranker<S>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// `fetch_k` candidates per retriever call and after fusion; `top_k` final results.
    #[must_use]
    pub fn with_limits(mut self, fetch_k: usize, top_k: usize) -> Self {
        self.fetch_k = fetch_k.max(top_k);
        self.top_k = top_k;
        self
    }

    /// # Errors
    ///
    /// Returns an error if every retriever call fails.
    pub async fn run(&self, query: &QueryInput) -> Result<SearchOutcome> {
        let query = query.as_str();
        let variants = match &self.expander {
            Some((expander, n)) => expander.expand(query, *n).await,
            None => vec![query.to_owned()],
        };

        let mut fused = self.ensemble.search_many(&variants, self.fetch_k).await?;
        fused.truncate(self.fetch_k);

        let Some(reranker) = &self.reranker else {
            fused.truncate(self.top_k);
            return Ok(SearchOutcome {
                variants,
                results: fused,
                score_kind: ScoreKind::Fused,
            });
        };

        let candidates: Vec<_> = fused.iter().map(|s| s.document.clone()).collect();
        match reranker.rerank(query, candidates, self.top_k).await {
            Ok(ranked) => {
                let results = ranked
                    .into_iter()
                    .map(|(document, score)| {
                        let fingerprint = fused
                            .iter()
                            .find(|s| s.document == document)
                            .map_or_else(|| document.fingerprint(), |s| s.fingerprint);
                        ScoredDocument {
                            fingerprint,
                            document,
                            score,
                        }
                    })
                    .collect();
                Ok(SearchOutcome {
                    variants,
                    results,
                    score_kind: ScoreKind::Reranked,
                })
            }
            Err(e) => {
                tracing::warn!("reranking failed, keeping fused order: {e}");
                fused.truncate(self.top_k);
                Ok(SearchOutcome {
                    variants,
                    results: fused,
                    score_kind: ScoreKind::Fused,
                })
            }
        }
    }
}

/// Render results as numbered context blocks for a generation prompt.
#[must_use]
pub fn format_as_context(results: &[ScoredDocument]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        let source = result.document.source().unwrap_or("unknown");
        let _ = writeln!(out, "[{}] source: {source}", i + 1);
        out.push_str(result.document.content.trim());
        out.push_str("\n\n");
    }
    out.truncate(out.trim_end().len());
    out
}
