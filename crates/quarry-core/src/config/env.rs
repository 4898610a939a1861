use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid QUARRY_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_API_KEY")
            && !v.is_empty()
        {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("QUARRY_RETRIEVAL_TOP_K") {
            match v.parse::<usize>() {
                Ok(k) => self.retrieval.top_k = k,
                Err(_) => tracing::warn!("ignoring invalid QUARRY_RETRIEVAL_TOP_K value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("QUARRY_RETRIEVAL_FETCH_K") {
            match v.parse::<usize>() {
                Ok(k) => self.retrieval.fetch_k = k,
                Err(_) => tracing::warn!("ignoring invalid QUARRY_RETRIEVAL_FETCH_K value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("QUARRY_RETRIEVAL_MIN_SCORE") {
            match v.parse::<f32>() {
                Ok(score) => self.retrieval.min_score = Some(score),
                Err(_) => tracing::warn!("ignoring invalid QUARRY_RETRIEVAL_MIN_SCORE value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("QUARRY_EXPANSION_ENABLED") {
            match v.parse::<bool>() {
                Ok(enabled) => self.expansion.enabled = enabled,
                Err(_) => tracing::warn!("ignoring invalid QUARRY_EXPANSION_ENABLED value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("QUARRY_RERANK_ENABLED") {
            match v.parse::<bool>() {
                Ok(enabled) => self.rerank.enabled = enabled,
                Err(_) => tracing::warn!("ignoring invalid QUARRY_RERANK_ENABLED value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("QUARRY_RERANK_TEI_URL") {
            self.rerank.tei_url = v;
        }
    }
}
