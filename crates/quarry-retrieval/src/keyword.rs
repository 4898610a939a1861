//! BM25 lexical retrieval over an in-RAM tantivy index.

use std::sync::Mutex;

use quarry_memory::{BoxFuture, Document, Metadata};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, STORED, STRING, Schema, TEXT, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term, doc};

use crate::error::{Result, RetrievalError};
use crate::retriever::Retriever;

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Debug, Clone, Copy)]
struct Fields {
    fingerprint: Field,
    content: Field,
    metadata: Field,
}

fn schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let fields = Fields {
        fingerprint: builder.add_text_field("fingerprint", STRING),
        content: builder.add_text_field("content", TEXT | STORED),
        metadata: builder.add_text_field("metadata", STORED),
    };
    (builder.build(), fields)
}

fn unavailable(e: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::unavailable("bm25", e)
}

/// Keyword retriever scored with tantivy's BM25. Documents sharing no query term are never
/// returned.
///
/// Content is tokenized with tantivy's default analyzer (split on non-alphanumerics,
/// lowercased). Documents are keyed by content fingerprint, so re-adding the same text
/// replaces the stored metadata instead of indexing a second copy.
pub struct Bm25Retriever {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

impl std::fmt::Debug for Bm25Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25Retriever")
            .field("documents", &self.len())
            .finish_non_exhaustive()
    }
}

impl Bm25Retriever {
    /// # Errors
    ///
    /// Returns [`RetrievalError::BackendUnavailable`] if tantivy cannot set up the index.
    pub fn new() -> Result<Self> {
        let (schema, fields) = schema();
        let index = Index::create_in_ram(schema);
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(unavailable)?;
        let writer = index.writer(WRITER_HEAP_BYTES).map_err(unavailable)?;
        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    /// Index documents and make them searchable before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer lock is poisoned or the commit fails.
    pub fn add_documents(&self, documents: impl IntoIterator<Item = Document>) -> Result<()> {
        let mut writer = self.writer.lock().map_err(unavailable)?;
        let mut added = 0usize;
        for document in documents {
            let fingerprint = document.fingerprint().to_hex();
            let metadata = serde_json::to_string(&document.metadata).map_err(unavailable)?;
            writer.delete_term(Term::from_field_text(self.fields.fingerprint, &fingerprint));
            writer
                .add_document(doc!(
                    self.fields.fingerprint => fingerprint,
                    self.fields.content => document.content,
                    self.fields.metadata => metadata,
                ))
                .map_err(unavailable)?;
            added += 1;
        }
        writer.commit().map_err(unavailable)?;
        self.reader.reload().map_err(unavailable)?;
        tracing::debug!(added, total = self.len(), "bm25 index committed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`RetrievalError::BackendUnavailable`] if the index cannot be searched.
    pub fn search_with_scores(&self, query: &str, k: usize) -> Result<Vec<(Document, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let parser = QueryParser::for_index(&self.index, vec![self.fields.content]);
        let (parsed, skipped) = parser.parse_query_lenient(query);
        if !skipped.is_empty() {
            tracing::debug!(query, skipped = skipped.len(), "ignored unparsable query parts");
        }

        let searcher = self.reader.searcher();
        let top = searcher
            .search(&parsed, &TopDocs::with_limit(k))
            .map_err(unavailable)?;

        top.into_iter()
            .map(|(score, address)| {
                let stored: TantivyDocument = searcher.doc(address).map_err(unavailable)?;
                Ok((self.to_document(&stored)?, score))
            })
            .collect()
    }

    fn to_document(&self, stored: &TantivyDocument) -> Result<Document> {
        let text = |field| {
            stored
                .get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
        };
        let metadata: Metadata = match text(self.fields.metadata) {
            "" => Metadata::new(),
            raw => serde_json::from_str(raw).map_err(unavailable)?,
        };
        Ok(Document {
            content: text(self.fields.content).to_owned(),
            metadata,
        })
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from(self.reader.searcher().num_docs()).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Retriever for Bm25Retriever {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "bm25"
    }

    fn search<'a>(&'a self, query: &'a str, k: usize) -> BoxFuture<'a, Result<Vec<Document>>> {
        Box::pin(async move {
            let hits = self.search_with_scores(query, k)?;
            Ok(hits.into_iter().map(|(document, _)| document).collect())
        })
    }
}
