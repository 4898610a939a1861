//! Pairwise (query, text) relevance models used for reranking.

use std::fmt::{self, Write};
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};
use crate::retry::{RetryPolicy, send_with_retry};

const RETRY: RetryPolicy = RetryPolicy::new(2);

const LLM_RANKER_PROMPT: &str = "You are an expert relevance ranker. Given a query and a list of \
numbered documents, judge how relevant each document is for answering the query. \
Answer with valid JSON only: a list of objects with two fields, \"index\" (the document \
number) and \"score\" (from 0.0 to 100.0, higher means more relevant).";

/// Scores `(query, text)` pairs.
///
/// Implementations must return exactly one score per input pair, in input order. A score may
/// be `NaN` when the model produced no usable value for that pair; callers decide how to treat
/// it.
pub trait RelevanceScorer: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the scoring back-end is unreachable or its response is unusable.
    fn score_pairs(
        &self,
        pairs: &[(String, String)],
    ) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn name(&self) -> &str;
}

/// Group pair indices by query, preserving first-seen query order.
fn group_by_query(pairs: &[(String, String)]) -> Vec<(&str, Vec<usize>)> {
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    for (i, (query, _)) in pairs.iter().enumerate() {
        match groups.iter_mut().find(|(q, _)| *q == query.as_str()) {
            Some((_, idx)) => idx.push(i),
            None => groups.push((query.as_str(), vec![i])),
        }
    }
    groups
}

/// Cross-encoder served over HTTP with a text-embeddings-inference compatible `/rerank`
/// endpoint.
#[derive(Clone)]
pub struct TeiScorer {
    client: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for TeiScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeiScorer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: Vec<&'a str>,
    raw_scores: bool,
}

#[derive(Deserialize)]
struct RerankHit {
    index: usize,
    #[serde(default)]
    score: Option<f32>,
}

impl TeiScorer {
    #[must_use]
    pub fn new(mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            base_url,
        }
    }

    async fn score_group(&self, query: &str, texts: Vec<&str>) -> Result<Vec<f32>, LlmError> {
        let count = texts.len();
        let body = RerankRequest {
            query,
            texts,
            raw_scores: false,
        };
        let url = format!("{}/rerank", self.base_url);

        let response =
            send_with_retry("tei", RETRY, || self.client.post(&url).json(&body).send())
                .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;
        if !status.is_success() {
            tracing::error!("rerank endpoint error {status}: {text}");
            return Err(LlmError::Other(format!(
                "rerank request failed (status {status})"
            )));
        }

        let hits: Vec<RerankHit> = serde_json::from_str(&text)?;
        let mut scores = vec![f32::NAN; count];
        for hit in hits {
            if let Some(slot) = scores.get_mut(hit.index) {
                *slot = hit.score.unwrap_or(f32::NAN);
            }
        }
        Ok(scores)
    }
}

impl RelevanceScorer for TeiScorer {
    async fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, LlmError> {
        let mut scores = vec![f32::NAN; pairs.len()];
        for (query, indices) in group_by_query(pairs) {
            let texts = indices.iter().map(|&i| pairs[i].1.as_str()).collect();
            let group_scores = self.score_group(query, texts).await?;
            for (&i, score) in indices.iter().zip(group_scores) {
                scores[i] = score;
            }
        }
        Ok(scores)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "tei"
    }
}

/// Uses a chat model as a listwise relevance judge.
#[derive(Debug, Clone)]
pub struct LlmScorer<P> {
    provider: P,
}

#[derive(Deserialize)]
struct JudgedScore {
    index: usize,
    #[serde(default)]
    score: serde_json::Value,
}

impl<P: LlmProvider> LlmScorer<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    async fn score_group(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, LlmError> {
        let mut docs = String::new();
        for (i, text) in texts.iter().enumerate() {
            let _ = write!(docs, "Document {i}: {text}\n\n");
        }
        let messages = [
            Message::system(LLM_RANKER_PROMPT),
            Message::user(format!("Query: {query}\n\nDocs:\n{docs}")),
        ];
        let response = self.provider.chat(&messages).await?;
        parse_judged_scores(&response, texts.len())
    }
}

impl<P: LlmProvider> RelevanceScorer for LlmScorer<P> {
    async fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, LlmError> {
        let mut scores = vec![f32::NAN; pairs.len()];
        for (query, indices) in group_by_query(pairs) {
            let texts: Vec<&str> = indices.iter().map(|&i| pairs[i].1.as_str()).collect();
            let group_scores = self.score_group(query, &texts).await?;
            for (&i, score) in indices.iter().zip(group_scores) {
                scores[i] = score;
            }
        }
        Ok(scores)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Extract the JSON list from a model answer and map it onto `count` slots.
///
/// Entries whose score is not a number (or that are missing) become `NaN`.
fn parse_judged_scores(response: &str, count: usize) -> Result<Vec<f32>, LlmError> {
    let start = response.find('[');
    let end = response.rfind(']');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(LlmError::ScoreParse("no JSON list in response".into()));
    };
    if end < start {
        return Err(LlmError::ScoreParse("malformed JSON list".into()));
    }

    let judged: Vec<JudgedScore> = serde_json::from_str(&response[start..=end])
        .map_err(|e| LlmError::ScoreParse(e.to_string()))?;

    let mut scores = vec![f32::NAN; count];
    for entry in judged {
        let Some(slot) = scores.get_mut(entry.index) else {
            continue;
        };
        #[allow(clippy::cast_possible_truncation)]
        let value = match &entry.score {
            serde_json::Value::Number(n) => n.as_f64().map_or(f32::NAN, |v| v as f32),
            serde_json::Value::String(s) => s.trim().parse::<f32>().unwrap_or(f32::NAN),
            _ => f32::NAN,
        };
        *slot = value;
    }
    Ok(scores)
}
