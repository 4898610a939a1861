//! Test-only mock provider and scorer.

use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};
use crate::scorer::RelevanceScorer;

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    /// Dimension of the hashed bag-of-words embedding; `0` disables embeddings.
    pub embedding_dims: usize,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding_dims: 64,
            fail_chat: false,
            fail_embed: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Messages received by `chat`, in call order.
    #[must_use]
    pub fn recorded_prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

/// Deterministic bag-of-words embedding: each lowercase alphanumeric token is hashed into one
/// of `dims` buckets.
#[must_use]
pub fn hashed_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    if dims == 0 {
        return vector;
    }
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let hash = token
            .to_lowercase()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            });
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (hash % dims as u64) as usize;
        vector[bucket] += 1.0;
    }
    vector
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|e| LlmError::Other(e.to_string()))?;
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.fail_embed {
            return Err(LlmError::Other("mock embed error".into()));
        }
        if self.embedding_dims == 0 {
            return Err(LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        Ok(hashed_embedding(text, self.embedding_dims))
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_dims > 0
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

/// Scorer returning either a fixed score list or the token overlap between query and text.
#[derive(Debug, Clone, Default)]
pub struct MockScorer {
    pub fixed: Option<Vec<f32>>,
    pub fail: bool,
}

impl MockScorer {
    #[must_use]
    pub fn with_scores(scores: Vec<f32>) -> Self {
        Self {
            fixed: Some(scores),
            fail: false,
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fixed: None,
            fail: true,
        }
    }
}

fn overlap(query: &str, text: &str) -> f32 {
    let tokens = |s: &str| -> std::collections::HashSet<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    };
    let q = tokens(query);
    let t = tokens(text);
    #[allow(clippy::cast_precision_loss)]
    let shared = q.intersection(&t).count() as f32;
    shared
}

impl RelevanceScorer for MockScorer {
    async fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, LlmError> {
        if self.fail {
            return Err(LlmError::Unavailable);
        }
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.clone());
        }
        Ok(pairs.iter().map(|(q, t)| overlap(q, t)).collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_then_default() {
        let p = MockProvider::with_responses(vec!["first".into()]);
        assert_eq!(p.chat(&[Message::user("a")]).await.unwrap(), "first");
        assert_eq!(p.chat(&[Message::user("b")]).await.unwrap(), "mock response");
        assert_eq!(p.recorded_prompts().len(), 2);
    }

    #[tokio::test]
    async fn failing_provider_errors() {
        let p = MockProvider::failing();
        assert!(p.chat(&[Message::user("a")]).await.is_err());
        assert!(p.embed("a").await.is_err());
    }

    #[test]
    fn hashed_embedding_is_deterministic_and_case_insensitive() {
        let a = hashed_embedding("Rust borrow checker", 32);
        let b = hashed_embedding("rust BORROW checker", 32);
        assert_eq!(a, b);
        assert!((a.iter().sum::<f32>() - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn hashed_embedding_zero_dims() {
        assert!(hashed_embedding("anything", 0).is_empty());
    }

    #[tokio::test]
    async fn mock_scorer_overlap() {
        let s = MockScorer::default();
        let scores = s
            .score_pairs(&[
                ("red apple".into(), "an apple that is red".into()),
                ("red apple".into(), "green pear".into()),
            ])
            .await
            .unwrap();
        assert!((scores[0] - 2.0).abs() < f32::EPSILON);
        assert!(scores[1].abs() < f32::EPSILON);
    }
}
