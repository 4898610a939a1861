//! Backend construction from [`Config`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use quarry_llm::any::{AnyProvider, AnyScorer};
use quarry_llm::ollama::OllamaProvider;
use quarry_llm::openai::OpenAiProvider;
use quarry_llm::scorer::{LlmScorer, TeiScorer};

use crate::config::{Config, ProviderKind, ScorerKind};

/// Priority: explicit path > `QUARRY_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("QUARRY_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// # Errors
///
/// Returns an error if the selected provider is missing required settings or is not compiled in.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            llm.embedding_model.clone(),
        ))),
        ProviderKind::OpenAi => {
            let api_key = llm
                .api_key
                .clone()
                .context("QUARRY_LLM_API_KEY is required for the openai provider")?;
            let provider = OpenAiProvider::new(
                api_key,
                llm.base_url.clone(),
                llm.model.clone(),
                Some(llm.embedding_model.clone()),
            )
            .with_temperature(llm.temperature);
            Ok(AnyProvider::OpenAi(provider))
        }
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyProvider::Mock(quarry_llm::mock::MockProvider::default())),
        #[cfg(not(feature = "mock"))]
        ProviderKind::Mock => anyhow::bail!("mock provider requires the `mock` feature"),
    }
}

/// # Errors
///
/// Returns an error if the selected scorer is not compiled in.
pub fn create_scorer(config: &Config, provider: &AnyProvider) -> anyhow::Result<AnyScorer> {
    match config.rerank.scorer {
        ScorerKind::Llm => Ok(AnyScorer::Llm(LlmScorer::new(provider.clone()))),
        ScorerKind::Tei => Ok(AnyScorer::Tei(TeiScorer::new(config.rerank.tei_url.clone()))),
        #[cfg(feature = "mock")]
        ScorerKind::Mock => Ok(AnyScorer::Mock(quarry_llm::mock::MockScorer::default())),
        #[cfg(not(feature = "mock"))]
        ScorerKind::Mock => anyhow::bail!("mock scorer requires the `mock` feature"),
    }
}

pub async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    } else {
        tracing::debug!(
            provider = quarry_llm::LlmProvider::name(provider),
            "no health check for provider"
        );
    }
}
