use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::document::Metadata;
use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

type Collections = HashMap<String, Collection>;

struct Entry {
    vector: Vec<f32>,
    payload: Metadata,
}

struct Collection {
    dims: usize,
    // Keyed by id so ties in similarity come back in id order.
    entries: BTreeMap<String, Entry>,
}

impl Collection {
    fn check(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() == self.dims {
            Ok(())
        } else {
            Err(VectorStoreError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            })
        }
    }

    fn nearest(&self, query: &[f32], limit: usize) -> Vec<ScoredVectorPoint> {
        let mut scored: Vec<ScoredVectorPoint> = self
            .entries
            .iter()
            .map(|(id, entry)| ScoredVectorPoint {
                id: id.clone(),
                score: cosine_similarity(query, &entry.vector),
                payload: entry.payload.clone(),
            })
            .collect();
        // Stable sort keeps id order among equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

/// Exhaustive cosine search held in process memory.
///
/// Good for a few thousand chunks. Nothing is persisted.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<Collections>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, VectorStoreError> {
        self.collections.read().map_err(|_| VectorStoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, VectorStoreError> {
        self.collections.write().map_err(|_| VectorStoreError::Poisoned)
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .read()
            .map(|cols| cols.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("InMemoryVectorStore")
            .field("collections", &names)
            .finish()
    }
}

/// Zero when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (dot, na, nb) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });
    let denom = na.sqrt() * nb.sqrt();
    if denom > 0.0 { dot / denom } else { 0.0 }
}

fn missing(name: &str) -> VectorStoreError {
    VectorStoreError::MissingCollection(name.to_owned())
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let mut cols = self.write()?;
            let col = cols.entry(name).or_insert_with(|| Collection {
                dims: vector_size,
                entries: BTreeMap::new(),
            });
            if col.dims == vector_size {
                Ok(())
            } else {
                Err(VectorStoreError::DimensionMismatch {
                    expected: col.dims,
                    actual: vector_size,
                })
            }
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move { Ok(self.read()?.contains_key(&name)) })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let mut cols = self.write()?;
            let col = cols.get_mut(&name).ok_or_else(|| missing(&name))?;
            // Validate the whole batch before touching the collection.
            points.iter().try_for_each(|p| col.check(&p.vector))?;
            col.entries.extend(points.into_iter().map(|p| {
                (
                    p.id,
                    Entry {
                        vector: p.vector,
                        payload: p.payload,
                    },
                )
            }));
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            let cols = self.read()?;
            let col = cols.get(&name).ok_or_else(|| missing(&name))?;
            col.check(&vector)?;
            Ok(col.nearest(&vector, limit))
        })
    }

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let mut cols = self.write()?;
            let col = cols.get_mut(&name).ok_or_else(|| missing(&name))?;
            col.entries.retain(|id, _| !ids.contains(id));
            Ok(())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        let name = collection.to_owned();
        Box::pin(async move { Ok(self.read()?.get(&name).map_or(0, |c| c.entries.len())) })
    }
}
