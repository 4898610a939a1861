mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the retrieval stack cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        check_chunks("splitter", self.splitter)?;
        check_chunks("hierarchy.parent", self.hierarchy.parent)?;
        check_chunks("hierarchy.child", self.hierarchy.child)?;
        if self.hierarchy.child.chunk_size >= self.hierarchy.parent.chunk_size {
            bail!(
                "hierarchy.child.chunk_size ({}) must be smaller than hierarchy.parent.chunk_size ({})",
                self.hierarchy.child.chunk_size,
                self.hierarchy.parent.chunk_size
            );
        }

        let weights = [
            ("retrieval.vector_weight", self.retrieval.vector_weight),
            ("retrieval.keyword_weight", self.retrieval.keyword_weight),
            ("retrieval.hierarchical_weight", self.retrieval.hierarchical_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                bail!("{name} must be finite and non-negative, got {weight}");
            }
        }
        if weights.iter().all(|(_, w)| *w <= 0.0) {
            bail!("at least one retrieval weight must be positive");
        }

        if let Some(min) = self.retrieval.min_score
            && !(-1.0..=1.0).contains(&min)
        {
            bail!("retrieval.min_score must be a cosine similarity in [-1, 1], got {min}");
        }

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if self.rerank.enabled && self.rerank.top_k == 0 {
            bail!("rerank.top_k must be at least 1");
        }
        Ok(())
    }
}

fn check_chunks(section: &str, chunks: ChunkConfig) -> anyhow::Result<()> {
    if chunks.chunk_size == 0 {
        bail!("{section}.chunk_size must be at least 1");
    }
    if chunks.chunk_overlap >= chunks.chunk_size {
        bail!(
            "{section}.chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunks.chunk_overlap,
            chunks.chunk_size
        );
    }
    Ok(())
}
