use serde::{Deserialize, Serialize};

/// Generation and embedding backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Mock,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pairwise relevance backend used by the reranker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    Llm,
    Tei,
    Mock,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub splitter: ChunkConfig,
    pub hierarchy: HierarchyConfig,
    pub retrieval: RetrievalConfig,
    pub expansion: ExpansionConfig,
    pub rerank: RerankConfig,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
    /// Read from `QUARRY_LLM_API_KEY` only.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: "http://localhost:11434".into(),
            model: "qwen3:8b".into(),
            embedding_model: "bge-m3".into(),
            temperature: 0.0,
            api_key: None,
        }
    }
}

/// Character-based chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub enabled: bool,
    /// Children fetched per query before mapping back to parents.
    pub child_k: usize,
    pub parent: ChunkConfig,
    pub child: ChunkConfig,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            child_k: 10,
            parent: ChunkConfig {
                chunk_size: 2000,
                chunk_overlap: 200,
            },
            child: ChunkConfig {
                chunk_size: 400,
                chunk_overlap: 50,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub fetch_k: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    /// `0.0` leaves the parent/child store out of the ensemble.
    pub hierarchical_weight: f32,
    pub backend_timeout_secs: u64,
    /// Cosine cut-off for flat vector hits. Unset keeps every hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            fetch_k: 10,
            vector_weight: 0.5,
            keyword_weight: 0.5,
            hierarchical_weight: 0.0,
            backend_timeout_secs: 30,
            min_score: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub enabled: bool,
    pub num_queries: usize,
    pub timeout_secs: u64,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            num_queries: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    pub scorer: ScorerKind,
    pub tei_url: String,
    pub top_k: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scorer: ScorerKind::Llm,
            tei_url: "http://localhost:8080".into(),
            top_k: 3,
        }
    }
}
