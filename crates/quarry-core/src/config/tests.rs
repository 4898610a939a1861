use std::io::Write;
use std::path::Path;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 11] = [
    "QUARRY_LLM_PROVIDER",
    "QUARRY_LLM_BASE_URL",
    "QUARRY_LLM_MODEL",
    "QUARRY_LLM_EMBEDDING_MODEL",
    "QUARRY_LLM_API_KEY",
    "QUARRY_RETRIEVAL_TOP_K",
    "QUARRY_RETRIEVAL_FETCH_K",
    "QUARRY_RETRIEVAL_MIN_SCORE",
    "QUARRY_EXPANSION_ENABLED",
    "QUARRY_RERANK_ENABLED",
    "QUARRY_RERANK_TEI_URL",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.llm.base_url, "http://localhost:11434");
    assert_eq!(config.llm.embedding_model, "bge-m3");
    assert_eq!(config.splitter.chunk_size, 1000);
    assert_eq!(config.splitter.chunk_overlap, 200);
    assert!(config.hierarchy.enabled);
    assert_eq!(config.hierarchy.parent.chunk_size, 2000);
    assert_eq!(config.hierarchy.child.chunk_size, 400);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.retrieval.fetch_k, 10);
    assert_eq!(config.retrieval.min_score, None);
    assert!(!config.expansion.enabled);
    assert_eq!(config.expansion.num_queries, 5);
    assert!(!config.rerank.enabled);
    assert_eq!(config.rerank.scorer, ScorerKind::Llm);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/quarry.toml")).unwrap();
    assert_eq!(config.llm.model, "qwen3:8b");
    assert_eq!(config.retrieval.top_k, 5);
}

#[test]
#[serial]
fn partial_file_keeps_other_defaults() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[llm]
provider = "openai"
model = "deepseek-chat"

[retrieval]
top_k = 8
hierarchical_weight = 0.2

[hierarchy.child]
chunk_size = 300

[rerank]
enabled = true
scorer = "tei"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.model, "deepseek-chat");
    assert_eq!(config.llm.base_url, "http://localhost:11434");
    assert_eq!(config.retrieval.top_k, 8);
    assert_eq!(config.retrieval.fetch_k, 10);
    assert!((config.retrieval.hierarchical_weight - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.hierarchy.child.chunk_size, 300);
    assert_eq!(config.hierarchy.parent.chunk_size, 2000);
    assert!(config.rerank.enabled);
    assert_eq!(config.rerank.scorer, ScorerKind::Tei);
}

#[test]
#[serial]
fn malformed_file_is_an_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[retrieval]\ntop_k = \"many\"\n").unwrap();
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn api_key_never_read_from_file() {
    let config: Config = toml::from_str("[llm]\napi_key = \"sk-leaked\"\n").unwrap();
    assert!(config.llm.api_key.is_none());
}

#[test]
fn api_key_never_serialized() {
    let mut config = Config::default();
    config.llm.api_key = Some("sk-secret".into());
    let rendered = toml::to_string(&config).unwrap();
    assert!(!rendered.contains("sk-secret"));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    unsafe {
        std::env::set_var("QUARRY_LLM_PROVIDER", "openai");
        std::env::set_var("QUARRY_LLM_MODEL", "gpt-4o-mini");
        std::env::set_var("QUARRY_LLM_API_KEY", "sk-test");
        std::env::set_var("QUARRY_RETRIEVAL_TOP_K", "7");
        std::env::set_var("QUARRY_EXPANSION_ENABLED", "true");
        std::env::set_var("QUARRY_RERANK_TEI_URL", "http://tei:80");
    }

    let config = Config::load(Path::new("/nonexistent/quarry.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.retrieval.top_k, 7);
    assert!(config.expansion.enabled);
    assert_eq!(config.rerank.tei_url, "http://tei:80");
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("QUARRY_LLM_PROVIDER", "claude");
        std::env::set_var("QUARRY_RETRIEVAL_FETCH_K", "-3");
        std::env::set_var("QUARRY_RERANK_ENABLED", "maybe");
    }

    let config = Config::load(Path::new("/nonexistent/quarry.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.retrieval.fetch_k, 10);
    assert!(!config.rerank.enabled);
}

#[test]
fn validate_rejects_overlap_not_below_size() {
    let mut config = Config::default();
    config.splitter.chunk_overlap = config.splitter.chunk_size;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("splitter.chunk_overlap"));
}

#[test]
fn validate_rejects_zero_chunk_size() {
    let mut config = Config::default();
    config.hierarchy.child = ChunkConfig {
        chunk_size: 0,
        chunk_overlap: 0,
    };
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_child_not_smaller_than_parent() {
    let mut config = Config::default();
    config.hierarchy.child.chunk_size = config.hierarchy.parent.chunk_size;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("hierarchy.child.chunk_size"));
}

#[test]
fn validate_rejects_bad_weights() {
    let mut config = Config::default();
    config.retrieval.keyword_weight = -0.1;
    assert!(config.validate().is_err());

    config.retrieval.keyword_weight = f32::NAN;
    assert!(config.validate().is_err());

    config.retrieval.vector_weight = 0.0;
    config.retrieval.keyword_weight = 0.0;
    config.retrieval.hierarchical_weight = 0.0;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("at least one retrieval weight"));
}

#[test]
fn validate_rejects_zero_top_k() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());
}

#[test]
fn provider_kind_display() {
    assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    assert_eq!(ProviderKind::Mock.as_str(), "mock");
}

#[test]
#[serial]
fn min_score_from_file_and_env() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[retrieval]\nmin_score = 0.7").unwrap();
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.retrieval.min_score, Some(0.7));

    unsafe { std::env::set_var("QUARRY_RETRIEVAL_MIN_SCORE", "0.25") };
    let config = Config::load(file.path()).unwrap();
    clear_env();
    assert_eq!(config.retrieval.min_score, Some(0.25));
}

#[test]
fn validate_rejects_min_score_outside_cosine_range() {
    let mut config = Config::default();
    config.retrieval.min_score = Some(1.5);
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("retrieval.min_score"));

    config.retrieval.min_score = Some(f32::NAN);
    assert!(config.validate().is_err());

    config.retrieval.min_score = Some(0.7);
    assert!(config.validate().is_ok());
}
