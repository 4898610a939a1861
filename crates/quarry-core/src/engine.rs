//! The assembled retrieval stack: indexes, ensemble, expansion, reranking and grounded answers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use quarry_llm::LlmProvider;
use quarry_llm::any::{AnyProvider, AnyScorer};
use quarry_memory::document::{DocumentError, TextLoader};
use quarry_memory::{
    Document, DocumentLoader, InMemoryVectorStore, Splitter, SplitterConfig, TextSplitter,
    VectorStore,
};
use quarry_retrieval::{
    Bm25Retriever, EnsembleRetriever, HybridPipeline, ParentDocumentStore, QueryExpander,
    QueryInput, Reranker, Retriever, SearchOutcome, VectorRetriever, format_as_context,
};

use crate::bootstrap::{create_provider, create_scorer};
use crate::config::{ChunkConfig, Config};

pub const NO_ANSWER: &str = "I cannot answer this based on the provided documents.";

const ANSWER_PROMPT: &str = "\
Answer the question using only the numbered context passages below. If the passages do not \
contain the answer, reply exactly: \"I cannot answer this based on the provided documents.\"

Context:
{context}

Question: {question}
Answer:";

#[must_use]
pub fn answer_prompt(context: &str, question: &str) -> String {
    ANSWER_PROMPT
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Counts from one [`RagEngine::ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents: usize,
    pub chunks: usize,
    pub parents: usize,
    pub children: usize,
}

#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub outcome: SearchOutcome,
}

pub struct RagEngine {
    provider: Arc<AnyProvider>,
    splitter: TextSplitter,
    chunks: Arc<VectorRetriever<AnyProvider>>,
    keyword: Arc<Bm25Retriever>,
    hierarchy: Option<Arc<ParentDocumentStore<AnyProvider>>>,
    expander: QueryExpander<AnyProvider>,
    num_queries: usize,
    pipeline: HybridPipeline<AnyProvider, AnyScorer>,
}

impl std::fmt::Debug for RagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("provider", &self.provider.name())
            .field("hierarchy", &self.hierarchy.is_some())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

fn splitter(chunks: ChunkConfig) -> TextSplitter {
    TextSplitter::new(SplitterConfig::new(chunks.chunk_size, chunks.chunk_overlap))
}

impl RagEngine {
    /// Validate `config`, build its backends and assemble the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a backend cannot be created.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let provider = create_provider(config)?;
        let scorer = if config.rerank.enabled {
            Some(create_scorer(config, &provider)?)
        } else {
            None
        };
        Self::with_backends(config, provider, scorer)
    }

    /// Assemble the engine around already constructed backends.
    ///
    /// Retrievers with a zero weight are left out of the ensemble. Reranking runs only when a
    /// scorer is given.
    ///
    /// # Errors
    ///
    /// Returns an error if no retriever ends up in the ensemble.
    pub fn with_backends(
        config: &Config,
        provider: AnyProvider,
        scorer: Option<AnyScorer>,
    ) -> anyhow::Result<Self> {
        let provider = Arc::new(provider);
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

        let mut flat = VectorRetriever::new(Arc::clone(&provider), Arc::clone(&store), "chunks");
        if let Some(min_score) = config.retrieval.min_score {
            flat = flat.with_min_score(min_score);
        }
        let chunks = Arc::new(flat);
        let keyword = Arc::new(Bm25Retriever::new()?);
        let hierarchy = config.hierarchy.enabled.then(|| {
            Arc::new(
                ParentDocumentStore::new(
                    Box::new(splitter(config.hierarchy.parent)),
                    Box::new(splitter(config.hierarchy.child)),
                    VectorRetriever::new(Arc::clone(&provider), store, "children"),
                )
                .with_child_k(config.hierarchy.child_k),
            )
        });

        let retrieval = &config.retrieval;
        let mut members: Vec<Arc<dyn Retriever>> = Vec::new();
        let mut weights = Vec::new();
        if retrieval.vector_weight > 0.0 {
            members.push(Arc::clone(&chunks) as Arc<dyn Retriever>);
            weights.push(retrieval.vector_weight);
        }
        if retrieval.keyword_weight > 0.0 {
            members.push(Arc::clone(&keyword) as Arc<dyn Retriever>);
            weights.push(retrieval.keyword_weight);
        }
        if let Some(store) = &hierarchy
            && retrieval.hierarchical_weight > 0.0
        {
            members.push(Arc::clone(store) as Arc<dyn Retriever>);
            weights.push(retrieval.hierarchical_weight);
        }

        let ensemble = EnsembleRetriever::with_weights(members, weights)
            .context("failed to assemble the retriever ensemble")?
            .with_timeout(Duration::from_secs(retrieval.backend_timeout_secs));
        tracing::debug!(weights = ?ensemble.weights(), "ensemble ready");

        let expansion_timeout = Duration::from_secs(config.expansion.timeout_secs);
        let expander =
            || QueryExpander::new(Arc::clone(&provider)).with_timeout(expansion_timeout);

        let mut pipeline = HybridPipeline::new(Arc::new(ensemble));
        if config.expansion.enabled {
            pipeline = pipeline.with_expander(expander(), config.expansion.num_queries);
        }
        pipeline = match scorer {
            Some(scorer) => pipeline
                .with_reranker(Reranker::new(Arc::new(scorer)))
                .with_limits(retrieval.fetch_k, config.rerank.top_k),
            None => pipeline.with_limits(retrieval.fetch_k, retrieval.top_k),
        };

        Ok(Self {
            expander: expander(),
            num_queries: config.expansion.num_queries,
            provider,
            splitter: splitter(config.splitter),
            chunks,
            keyword,
            hierarchy,
            pipeline,
        })
    }

    #[must_use]
    pub fn provider(&self) -> &AnyProvider {
        &self.provider
    }

    /// Read every file with the text loader.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first file that cannot be loaded. Empty files are skipped.
    pub async fn load_files(paths: &[impl AsRef<Path>]) -> anyhow::Result<Vec<Document>> {
        let loader = TextLoader::default();
        let mut documents = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match loader.load(path).await {
                Ok(loaded) => documents.extend(loaded),
                Err(DocumentError::Empty { path }) => {
                    tracing::warn!(path = %path.display(), "skipping empty file");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to load {}", path.display()));
                }
            }
        }
        Ok(documents)
    }

    /// Index `documents` as flat chunks for vector and keyword search and, when enabled, as
    /// parent/child chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or indexing fails, or if the parent/child store reports an
    /// incomplete ingestion.
    pub async fn ingest(&self, documents: &[Document]) -> anyhow::Result<IngestSummary> {
        let chunks = self.splitter.split_documents(documents);
        let mut summary = IngestSummary {
            documents: documents.len(),
            chunks: chunks.len(),
            ..IngestSummary::default()
        };

        self.chunks
            .add_documents(chunks.clone())
            .await
            .context("failed to index chunks")?;
        self.keyword.add_documents(chunks)?;

        if let Some(hierarchy) = &self.hierarchy {
            let report = hierarchy.add_documents(documents).await?;
            summary.parents = report.parents_stored;
            summary.children = report.children_indexed;
        }

        tracing::info!(
            documents = summary.documents,
            chunks = summary.chunks,
            parents = summary.parents,
            children = summary.children,
            "ingested documents"
        );
        Ok(summary)
    }

    /// # Errors
    ///
    /// Returns an error if every retriever fails.
    pub async fn search(&self, query: &QueryInput) -> anyhow::Result<SearchOutcome> {
        Ok(self.pipeline.run(query).await?)
    }

    /// Raw child chunk matches with their similarity, for inspecting the parent/child store.
    ///
    /// # Errors
    ///
    /// Returns an error if the hierarchy is disabled or the child search fails.
    pub async fn children(&self, query: &str, k: usize) -> anyhow::Result<Vec<(Document, f32)>> {
        let Some(hierarchy) = &self.hierarchy else {
            anyhow::bail!("parent/child retrieval is disabled in the configuration");
        };
        Ok(hierarchy.retrieve_raw_children(query, k).await?)
    }

    /// Query variants, original first. Works whether or not expansion is enabled for search.
    pub async fn expand(&self, query: &str) -> Vec<String> {
        self.expander.expand(query, self.num_queries).await
    }

    /// Search, then answer from the retrieved passages only.
    ///
    /// With no passages the fixed refusal is returned without calling the model.
    ///
    /// # Errors
    ///
    /// Returns an error if search or generation fails.
    pub async fn answer(&self, query: &QueryInput) -> anyhow::Result<Answer> {
        let outcome = self.search(query).await?;
        if outcome.results.is_empty() {
            return Ok(Answer {
                text: NO_ANSWER.to_owned(),
                outcome,
            });
        }

        let prompt = answer_prompt(&format_as_context(&outcome.results), query.as_str());
        let text = self
            .provider
            .generate(&prompt)
            .await
            .context("answer generation failed")?;
        Ok(Answer {
            text: text.trim().to_owned(),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use quarry_llm::mock::{MockProvider, MockScorer};
    use quarry_retrieval::ScoreKind;

    use super::*;

    const NOTES: &str = "\
Ownership is the set of rules that govern how a Rust program manages memory. Each value has \
exactly one owner, and the value is dropped when the owner goes out of scope.

References let code use a value without taking ownership of it. The borrow checker makes \
sure that references never outlive the data they point to.

Traits describe shared behavior. Generic functions use trait bounds to accept any type \
that implements the required behavior.";

    fn notes() -> Document {
        Document::new(NOTES).with_metadata("source", "notes.md")
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.splitter = ChunkConfig {
            chunk_size: 200,
            chunk_overlap: 40,
        };
        config.hierarchy.parent = ChunkConfig {
            chunk_size: 260,
            chunk_overlap: 0,
        };
        config.hierarchy.child = ChunkConfig {
            chunk_size: 80,
            chunk_overlap: 10,
        };
        config.retrieval.hierarchical_weight = 0.2;
        config.retrieval.top_k = 2;
        config
    }

    fn engine(config: &Config, provider: MockProvider) -> RagEngine {
        RagEngine::with_backends(config, AnyProvider::Mock(provider), None).unwrap()
    }

    #[tokio::test]
    async fn ingest_fills_every_index() {
        let engine = engine(&config(), MockProvider::default());
        let summary = engine.ingest(&[notes()]).await.unwrap();
        assert_eq!(summary.documents, 1);
        assert!(summary.chunks >= 3);
        assert!(summary.parents >= 2);
        assert!(summary.children > summary.parents);
        assert_eq!(engine.keyword.len(), summary.chunks);
    }

    #[tokio::test]
    async fn search_ranks_matching_paragraph_first() {
        let engine = engine(&config(), MockProvider::default());
        engine.ingest(&[notes()]).await.unwrap();

        let outcome = engine.search(&"borrow checker".into()).await.unwrap();
        assert_eq!(outcome.score_kind, ScoreKind::Fused);
        assert!(outcome.results.len() <= 2);
        assert!(outcome.results[0].document.content.contains("borrow checker"));
    }

    #[tokio::test]
    async fn reranker_sets_final_count() {
        let mut config = config();
        config.rerank.top_k = 1;
        let engine = RagEngine::with_backends(
            &config,
            AnyProvider::Mock(MockProvider::default()),
            Some(AnyScorer::Mock(MockScorer::default())),
        )
        .unwrap();
        engine.ingest(&[notes()]).await.unwrap();

        let outcome = engine.search(&"trait bounds".into()).await.unwrap();
        assert_eq!(outcome.score_kind, ScoreKind::Reranked);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].document.content.contains("trait bounds"));
    }

    #[tokio::test]
    async fn children_need_the_hierarchy() {
        let engine = engine(&config(), MockProvider::default());
        engine.ingest(&[notes()]).await.unwrap();
        let children = engine.children("value owner", 3).await.unwrap();
        assert_eq!(children.len(), 3);

        let mut flat = config();
        flat.hierarchy.enabled = false;
        flat.retrieval.hierarchical_weight = 0.0;
        let engine = self::engine(&flat, MockProvider::default());
        assert!(engine.children("value owner", 3).await.is_err());
    }

    #[tokio::test]
    async fn zero_weights_leave_members_out() {
        let mut config = config();
        config.retrieval.vector_weight = 0.0;
        config.retrieval.hierarchical_weight = 0.0;
        let engine = engine(&config, MockProvider::default());
        engine.ingest(&[notes()]).await.unwrap();

        // Keyword search alone returns nothing for a query with no shared terms.
        let outcome = engine.search(&"zebra".into()).await.unwrap();
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn empty_ensemble_is_rejected() {
        let mut config = config();
        config.hierarchy.enabled = false;
        config.retrieval.vector_weight = 0.0;
        config.retrieval.keyword_weight = 0.0;
        let result =
            RagEngine::with_backends(&config, AnyProvider::Mock(MockProvider::default()), None);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn expand_uses_configured_count() {
        let mut config = config();
        config.expansion.num_queries = 3;
        let provider = MockProvider::with_responses(vec!["first variant\nsecond variant".into()]);
        let engine = engine(&config, provider);
        assert_eq!(
            engine.expand("original").await,
            vec!["original", "first variant", "second variant"]
        );
    }

    #[tokio::test]
    async fn answer_is_grounded_in_context() {
        let provider = MockProvider::with_responses(vec![" Each value has one owner. ".into()]);
        let engine = engine(&config(), provider.clone());
        engine.ingest(&[notes()]).await.unwrap();

        let answer = engine
            .answer(&QueryInput::parse(r#"{"question": "who owns a value"}"#))
            .await
            .unwrap();
        assert_eq!(answer.text, "Each value has one owner.");
        assert!(!answer.outcome.results.is_empty());

        let prompts = provider.recorded_prompts();
        let prompt = &prompts.last().unwrap()[0].content;
        assert!(prompt.contains("[1] source: notes.md"));
        assert!(prompt.contains("Question: who owns a value"));
        assert!(prompt.contains(NO_ANSWER));
    }

    #[tokio::test]
    async fn empty_index_refuses_without_calling_the_model() {
        let provider = MockProvider::default();
        let engine = engine(&config(), provider.clone());

        let answer = engine.answer(&"anything at all".into()).await.unwrap();
        assert_eq!(answer.text, NO_ANSWER);
        assert!(provider.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn load_files_reads_text_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("guide.md");
        let txt = dir.path().join("notes.txt");
        std::fs::write(&md, "# Guide\n\nSome text.").unwrap();
        std::fs::write(&txt, "plain notes").unwrap();

        let docs = RagEngine::load_files(&[md, txt]).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].meta_str("content_type"), Some("text/markdown"));
        assert!(docs[1].source().unwrap().ends_with("notes.txt"));

        let missing = RagEngine::load_files(&[dir.path().join("gone.md")]).await;
        assert!(missing.unwrap_err().to_string().contains("gone.md"));
    }

    #[tokio::test]
    async fn load_files_skips_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let blank = dir.path().join("blank.txt");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&blank, "\n\n").unwrap();
        std::fs::write(&notes, "lifetimes").unwrap();

        let docs = RagEngine::load_files(&[blank, notes]).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "lifetimes");
    }
}
