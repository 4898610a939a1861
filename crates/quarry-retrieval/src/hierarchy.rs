//! Two-tier chunk store: small child chunks are indexed, their larger parents are returned.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use quarry_llm::LlmProvider;
use quarry_memory::{BoxFuture, Document, Fingerprint, Metadata, Splitter};

use crate::error::{IngestionReport, Result, RetrievalError};
use crate::retriever::Retriever;
use crate::vector::VectorRetriever;

/// Child metadata key pointing at the owning parent.
pub const PARENT_ID_KEY: &str = "parent_id";
/// Metadata key carrying a parent's own id when it is handed out as a [`Document`].
pub const DOC_ID_KEY: &str = "doc_id";

#[derive(Debug, Clone, PartialEq)]
pub struct ParentRecord {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl ParentRecord {
    #[must_use]
    pub fn into_document(self) -> Document {
        let mut metadata = self.metadata;
        metadata.insert(DOC_ID_KEY.into(), self.id.into());
        Document {
            content: self.content,
            metadata,
        }
    }
}

/// What to do when deleting a parent whose children are still indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse; nothing is deleted.
    Reject,
    /// Delete the children first, then the parent.
    Cascade,
}

/// Parent id derived from parent content and source, so re-ingesting a document overwrites
/// its parents instead of duplicating them.
#[must_use]
pub fn parent_id(parent: &Document) -> String {
    let mut hex = Fingerprint::of_document(parent, &["source"]).to_hex();
    hex.truncate(32);
    format!("parent_{hex}")
}

#[derive(Default)]
struct ParentMap {
    parents: HashMap<String, ParentRecord>,
    /// Point ids of each parent's children in the child index.
    children_of: HashMap<String, Vec<String>>,
}

pub struct ParentDocumentStore<P: LlmProvider> {
    parent_splitter: Box<dyn Splitter>,
    child_splitter: Box<dyn Splitter>,
    children: VectorRetriever<P>,
    state: RwLock<ParentMap>,
    child_k: usize,
}

impl<P: LlmProvider> std::fmt::Debug for ParentDocumentStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentDocumentStore")
            .field("children", &self.children)
            .field("child_k", &self.child_k)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> ParentDocumentStore<P> {
    #[must_use]
    pub fn new(
        parent_splitter: Box<dyn Splitter>,
        child_splitter: Box<dyn Splitter>,
        children: VectorRetriever<P>,
    ) -> Self {
        Self {
            parent_splitter,
            child_splitter,
            children,
            state: RwLock::new(ParentMap::default()),
            child_k: 10,
        }
    }

    /// Number of children fetched per query when used as a [`Retriever`].
    #[must_use]
    pub fn with_child_k(mut self, child_k: usize) -> Self {
        self.child_k = child_k.max(1);
        self
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, ParentMap>> {
        self.state
            .read()
            .map_err(|e| RetrievalError::unavailable("parent store", e))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, ParentMap>> {
        self.state
            .write()
            .map_err(|e| RetrievalError::unavailable("parent store", e))
    }

    /// Split `documents` into parents and children, store the parents and index the children.
    ///
    /// A parent whose id already exists is overwritten and its previous children are removed
    /// from the index. Identical parents within one call are stored once, and
    /// `parents_stored` counts distinct ids. Every parent is stored before any of its
    /// children is indexed.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Ingestion`] with the full report if any parent produced no
    /// children; all other parents are still ingested. Embedding or index failures abort the
    /// pass.
    pub async fn add_documents(&self, documents: &[Document]) -> Result<IngestionReport> {
        let parents = self.parent_splitter.split_documents(documents);
        let mut report = IngestionReport::default();
        let mut seen = HashSet::new();

        for parent in parents {
            let id = parent_id(&parent);
            if !seen.insert(id.clone()) {
                tracing::debug!(parent_id = %id, "identical parent already stored in this pass");
                continue;
            }
            let children: Vec<Document> = self
                .child_splitter
                .split_documents(std::slice::from_ref(&parent))
                .into_iter()
                .map(|child| child.with_metadata(PARENT_ID_KEY, id.clone()))
                .collect();

            let stale = {
                let mut state = self.write_state()?;
                state.parents.insert(
                    id.clone(),
                    ParentRecord {
                        id: id.clone(),
                        content: parent.content,
                        metadata: parent.metadata,
                    },
                );
                state.children_of.insert(id.clone(), Vec::new())
            };
            report.parents_stored += 1;

            if let Some(stale) = stale.filter(|ids| !ids.is_empty()) {
                tracing::debug!(parent_id = %id, count = stale.len(), "replacing children");
                self.children.delete(stale).await?;
            }

            if children.is_empty() {
                tracing::warn!(parent_id = %id, "parent produced no children and is unreachable");
                report.childless_parents.push(id);
                continue;
            }

            let child_ids = self.children.add_documents(children).await?;
            report.children_indexed += child_ids.len();
            self.write_state()?.children_of.insert(id, child_ids);
        }

        tracing::info!(
            parents = report.parents_stored,
            children = report.children_indexed,
            "hierarchical ingestion done"
        );

        if report.is_complete() {
            Ok(report)
        } else {
            Err(RetrievalError::Ingestion { report })
        }
    }

    /// Child-level matches with scores, without parent resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the child index cannot be searched.
    pub async fn retrieve_raw_children(&self, query: &str, k: usize) -> Result<Vec<(Document, f32)>> {
        self.children.search_with_scores(query, k).await
    }

    /// Parents of the top `k` matching children, ordered by their best child.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Consistency`] if a matched child points at a missing parent and
    /// [`RetrievalError::OrphanChild`] if it carries no parent id.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ParentRecord>> {
        let hits = self.children.search_with_scores(query, k).await?;

        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for (child, _) in &hits {
            let Some(id) = child.meta_str(PARENT_ID_KEY) else {
                return Err(RetrievalError::OrphanChild {
                    child: child.fingerprint().short(),
                });
            };
            if seen.insert(id.to_owned()) {
                ordered.push(id.to_owned());
            }
        }

        let state = self.read_state()?;
        ordered
            .into_iter()
            .map(|id| {
                state
                    .parents
                    .get(&id)
                    .cloned()
                    .ok_or(RetrievalError::Consistency { parent_id: id })
            })
            .collect()
    }

    /// Delete parents by id. Unknown ids are ignored. Returns how many parents were removed.
    ///
    /// # Errors
    ///
    /// With [`DeletePolicy::Reject`], returns [`RetrievalError::ParentHasChildren`] before
    /// deleting anything if any listed parent still has children.
    pub async fn delete_parents(&self, ids: &[String], policy: DeletePolicy) -> Result<usize> {
        let child_ids: Vec<String> = {
            let state = self.read_state()?;
            let mut child_ids = Vec::new();
            for id in ids {
                let children = state.children_of.get(id).map_or(0, Vec::len);
                if children > 0 && policy == DeletePolicy::Reject {
                    return Err(RetrievalError::ParentHasChildren {
                        parent_id: id.clone(),
                        children,
                    });
                }
                if let Some(owned) = state.children_of.get(id) {
                    child_ids.extend(owned.iter().cloned());
                }
            }
            child_ids
        };

        self.children.delete(child_ids).await?;

        let mut state = self.write_state()?;
        let mut removed = 0;
        for id in ids {
            state.children_of.remove(id);
            if state.parents.remove(id).is_some() {
                removed += 1;
            }
        }
        tracing::debug!(removed, ?policy, "deleted parents");
        Ok(removed)
    }

    #[must_use]
    pub fn get_parent(&self, id: &str) -> Option<ParentRecord> {
        self.read_state().ok()?.parents.get(id).cloned()
    }

    #[must_use]
    pub fn parent_count(&self) -> usize {
        self.read_state().map_or(0, |s| s.parents.len())
    }

    /// Ids of the children indexed for `parent`.
    #[must_use]
    pub fn children_of(&self, parent: &str) -> Vec<String> {
        self.read_state()
            .ok()
            .and_then(|s| s.children_of.get(parent).cloned())
            .unwrap_or_default()
    }
}

impl<P: LlmProvider> Retriever for ParentDocumentStore<P> {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "hierarchical"
    }

    fn search<'a>(&'a self, query: &'a str, k: usize) -> BoxFuture<'a, Result<Vec<Document>>> {
        Box::pin(async move {
            let mut parents = self.retrieve(query, self.child_k.max(k)).await?;
            parents.truncate(k);
            Ok(parents.into_iter().map(ParentRecord::into_document).collect())
        })
    }
}
