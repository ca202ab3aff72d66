//! In-memory [`VectorStore`] for tests and embedding-less runs.
//!
//! Collections are `Vec`s in insertion order behind a `std::sync::RwLock`.
//! Critical sections never span an `.await`. Queries are brute-force cosine
//! similarity over the whole collection.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::ensure_dims;
use crate::error::Error;

use super::{rank, MetadataFilter, VectorMatch, VectorRecord, VectorStore};

struct Collection {
    dims: usize,
    records: Vec<VectorRecord>,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `collection` (0 when it does not exist).
    pub fn len(&self, collection: &str) -> Result<usize> {
        Ok(self
            .read()?
            .get(collection)
            .map(|c| c.records.len())
            .unwrap_or(0))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| anyhow!("vector store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| anyhow!("vector store lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()> {
        let mut collections = self.write()?;
        match collections.get(name) {
            Some(existing) if existing.dims != dims => Err(Error::DimensionMismatch {
                collection: name.to_string(),
                expected: existing.dims,
                actual: dims,
            }
            .into()),
            Some(_) => Ok(()),
            None => {
                collections.insert(
                    name.to_string(),
                    Collection {
                        dims,
                        records: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn collection_dims(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.read()?.get(name).map(|c| c.dims))
    }

    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<()> {
        let mut collections = self.write()?;
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                dims: record.embedding.len(),
                records: Vec::new(),
            });
        ensure_dims(collection, entry.dims, &record.embedding)?;

        match entry
            .records
            .iter_mut()
            .find(|r| r.chunk_id == record.chunk_id)
        {
            Some(slot) => *slot = record,
            None => entry.records.push(record),
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        let collections = self.read()?;
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        ensure_dims(collection, entry.dims, query)?;
        Ok(rank(query, &entry.records, top_k, filter))
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<usize> {
        let mut collections = self.write()?;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = entry.records.len();
        entry.records.retain(|r| r.document_id != document_id);
        Ok(before - entry.records.len())
    }
}
