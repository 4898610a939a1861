//! Rank-based weighted fusion of several retrievers.
//!
//! Each retriever's list contributes `weight * (m - rank) / m` per document, where `m` is the
//! list length. Raw back-end scores are never compared, so cosine and BM25 lists mix freely.
//! Documents are deduplicated by [`Fingerprint`]; the first sighting keeps its metadata and
//! later duplicates only add score.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use quarry_memory::{BoxFuture, Document, Fingerprint};
use tracing::Instrument;

use crate::error::{Result, RetrievalError};
use crate::retriever::Retriever;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub fingerprint: Fingerprint,
    pub document: Document,
    pub score: f32,
}

/// Single-writer score accumulator.
#[derive(Debug, Default)]
pub struct Fusion {
    fingerprint_keys: Vec<String>,
    positions: HashMap<Fingerprint, usize>,
    entries: Vec<ScoredDocument>,
}

impl Fusion {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint documents over content plus these metadata keys instead of content alone.
    #[must_use]
    pub fn with_fingerprint_keys(keys: Vec<String>) -> Self {
        Self {
            fingerprint_keys: keys,
            ..Self::default()
        }
    }

    fn fingerprint(&self, document: &Document) -> Fingerprint {
        if self.fingerprint_keys.is_empty() {
            document.fingerprint()
        } else {
            let keys: Vec<&str> = self.fingerprint_keys.iter().map(String::as_str).collect();
            Fingerprint::of_document(document, &keys)
        }
    }

    /// Fold one retriever's ranked list into the totals.
    #[allow(clippy::cast_precision_loss)]
    pub fn add_ranked(&mut self, weight: f32, ranked: Vec<Document>) {
        let m = ranked.len();
        if m == 0 {
            return;
        }
        for (rank, document) in ranked.into_iter().enumerate() {
            let contribution = weight * (m - rank) as f32 / m as f32;
            let fingerprint = self.fingerprint(&document);
            match self.positions.entry(fingerprint) {
                Entry::Occupied(slot) => self.entries[*slot.get()].score += contribution,
                Entry::Vacant(slot) => {
                    slot.insert(self.entries.len());
                    self.entries.push(ScoredDocument {
                        fingerprint,
                        document,
                        score: contribution,
                    });
                }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descending by score; equal scores keep first-observed order.
    #[must_use]
    pub fn into_ranked(self) -> Vec<ScoredDocument> {
        let mut entries = self.entries;
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries
    }
}

/// Fuse already-collected `(weight, ranked list)` pairs in the given order.
#[must_use]
pub fn fuse(lists: impl IntoIterator<Item = (f32, Vec<Document>)>) -> Vec<ScoredDocument> {
    let mut fusion = Fusion::new();
    for (weight, ranked) in lists {
        fusion.add_ranked(weight, ranked);
    }
    fusion.into_ranked()
}

struct Member {
    retriever: Arc<dyn Retriever>,
    weight: f32,
}

/// Fans a query out to every member retriever concurrently and fuses the results.
///
/// Results are folded in a fixed order (query by query, members in construction order)
/// regardless of which call finished first, so the first-observed document for every
/// fingerprint is deterministic. A member that is unavailable or exceeds the timeout
/// contributes nothing, and the search fails only if every call fails. Errors for which
/// [`RetrievalError::is_fatal`] holds are returned as is.
pub struct EnsembleRetriever {
    members: Vec<Member>,
    timeout: Duration,
    fingerprint_keys: Vec<String>,
}

impl std::fmt::Debug for EnsembleRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleRetriever")
            .field(
                "members",
                &self
                    .members
                    .iter()
                    .map(|m| (m.retriever.name(), m.weight))
                    .collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl EnsembleRetriever {
    /// Uniform weights of `1/N`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidConfig`] if `retrievers` is empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(retrievers: Vec<Arc<dyn Retriever>>) -> Result<Self> {
        let weight = 1.0 / retrievers.len().max(1) as f32;
        let weights = vec![weight; retrievers.len()];
        Self::with_weights(retrievers, weights)
    }

    /// Explicit weights; they need not sum to one.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidConfig`] if there are no retrievers, the lengths differ
    /// or a weight is negative or not finite.
    pub fn with_weights(retrievers: Vec<Arc<dyn Retriever>>, weights: Vec<f32>) -> Result<Self> {
        if retrievers.is_empty() {
            return Err(RetrievalError::InvalidConfig(
                "ensemble needs at least one retriever".into(),
            ));
        }
        if retrievers.len() != weights.len() {
            return Err(RetrievalError::InvalidConfig(format!(
                "{} retrievers but {} weights",
                retrievers.len(),
                weights.len()
            )));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(RetrievalError::InvalidConfig(format!(
                "retriever weight must be finite and non-negative, got {bad}"
            )));
        }

        Ok(Self {
            members: retrievers
                .into_iter()
                .zip(weights)
                .map(|(retriever, weight)| Member { retriever, weight })
                .collect(),
            timeout: Duration::from_secs(30),
            fingerprint_keys: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_fingerprint_keys(mut self, keys: Vec<String>) -> Self {
        self.fingerprint_keys = keys;
        self
    }

    #[must_use]
    pub fn weights(&self) -> Vec<f32> {
        self.members.iter().map(|m| m.weight).collect()
    }

    /// Full fused list for one query; callers truncate.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::AllBackendsFailed`] if every member fails.
    pub async fn search_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        self.search_many(&[query.to_owned()], k).await
    }

    /// Full fused list over several query variants, each sent to every member.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::AllBackendsFailed`] if every call fails, or the first fatal
    /// member error in member order.
    pub async fn search_many(&self, queries: &[String], k: usize) -> Result<Vec<ScoredDocument>> {
        let timeout = self.timeout;
        let calls = queries.iter().flat_map(|query| {
            self.members.iter().map(move |member| {
                let backend = member.retriever.name().to_owned();
                let span = tracing::info_span!("retriever", backend = %backend, query = %query);
                async move {
                    let outcome =
                        match tokio::time::timeout(timeout, member.retriever.search(query, k)).await
                        {
                            Ok(outcome) => outcome,
                            Err(_) => Err(RetrievalError::unavailable(
                                backend.as_str(),
                                format!("timed out after {}s", timeout.as_secs_f32()),
                            )),
                        };
                    (member.weight, backend, outcome)
                }
                .instrument(span)
            })
        });
        let results = join_all(calls).await;

        let attempted = results.len();
        let mut failed = 0;
        let mut fusion = Fusion::with_fingerprint_keys(self.fingerprint_keys.clone());
        for (weight, backend, outcome) in results {
            match outcome {
                Ok(documents) => fusion.add_ranked(weight, documents),
                Err(e) if e.is_fatal() => {
                    tracing::error!(backend = %backend, "retriever index is inconsistent: {e}");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(backend = %backend, "retriever failed, contributing nothing: {e}");
                    failed += 1;
                }
            }
        }

        if attempted > 0 && failed == attempted {
            return Err(RetrievalError::AllBackendsFailed { attempted });
        }
        tracing::debug!(attempted, failed, candidates = fusion.len(), "fused retriever results");
        Ok(fusion.into_ranked())
    }
}

impl Retriever for EnsembleRetriever {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ensemble"
    }

    fn search<'a>(&'a self, query: &'a str, k: usize) -> BoxFuture<'a, Result<Vec<Document>>> {
        Box::pin(async move {
            let mut fused = self.search_scored(query, k).await?;
            fused.truncate(k);
            Ok(fused.into_iter().map(|s| s.document).collect())
        })
    }
}
