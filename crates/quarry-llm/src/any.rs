#[cfg(feature = "mock")]
use crate::mock::{MockProvider, MockScorer};
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};
use crate::scorer::{LlmScorer, RelevanceScorer, TeiScorer};

macro_rules! each_provider {
    ($value:expr, |$p:ident| $call:expr) => {
        match $value {
            AnyProvider::Ollama($p) => $call,
            AnyProvider::OpenAi($p) => $call,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $call,
        }
    };
}

macro_rules! each_scorer {
    ($value:expr, |$s:ident| $call:expr) => {
        match $value {
            AnyScorer::Llm($s) => $call,
            AnyScorer::Tei($s) => $call,
            #[cfg(feature = "mock")]
            AnyScorer::Mock($s) => $call,
        }
    };
}

/// Generation back-end selected at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        each_provider!(self, |p| p.chat(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        each_provider!(self, |p| p.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        each_provider!(self, |p| p.supports_embeddings())
    }

    fn name(&self) -> &str {
        each_provider!(self, |p| p.name())
    }
}

/// Reranking back-end selected at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyScorer {
    Llm(LlmScorer<AnyProvider>),
    Tei(TeiScorer),
    #[cfg(feature = "mock")]
    Mock(MockScorer),
}

impl RelevanceScorer for AnyScorer {
    async fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, LlmError> {
        each_scorer!(self, |s| s.score_pairs(pairs).await)
    }

    fn name(&self) -> &str {
        each_scorer!(self, |s| s.name())
    }
}
