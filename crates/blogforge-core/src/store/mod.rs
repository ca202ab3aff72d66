//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the seam between the retrieval pipeline and
//! whatever holds embeddings. Records live in named collections, and every
//! record in a collection has the collection's dimensionality.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! [`memory::InMemoryVectorStore`] lives here; the durable SQLite store is
//! in the `blogforge` app crate.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::embedding::cosine_similarity;

/// Exact-equality metadata filter (`key == value` for every entry).
pub type MetadataFilter = serde_json::Map<String, Value>;

/// One embedded chunk as stored in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    #[serde(default)]
    pub metadata: Value,
}

/// A query hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub chunk_id: String,
    pub document_id: String,
    /// Cosine similarity to the query vector.
    pub score: f64,
    pub text: String,
    pub metadata: Value,
}

/// Collection-scoped vector storage.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_collection`](VectorStore::create_collection) | Declare a collection and its dims |
/// | [`collection_dims`](VectorStore::collection_dims) | Look up a collection's dims |
/// | [`upsert`](VectorStore::upsert) | Insert or replace one record |
/// | [`query`](VectorStore::query) | Top-k cosine search with a metadata filter |
/// | [`delete_document`](VectorStore::delete_document) | Drop every record of a document |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create `name` with `dims`. Idempotent when the dims agree; a
    /// different dims is a `DimensionMismatch`.
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()>;

    async fn collection_dims(&self, name: &str) -> Result<Option<usize>>;

    /// Insert a record, or replace the one with the same chunk id in place.
    ///
    /// A missing collection is created with the record's dimensionality.
    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<()>;

    async fn upsert_batch(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        for record in records {
            self.upsert(collection, record).await?;
        }
        Ok(())
    }

    /// At most `top_k` matches, best first; ties keep insertion order.
    ///
    /// A missing collection yields no matches. A query vector of the wrong
    /// length is a `DimensionMismatch`.
    async fn query(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>>;

    /// Remove all records of `document_id`, returning how many went away.
    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<usize>;
}

/// Whether `metadata` satisfies every entry of `filter`.
pub fn matches_filter(metadata: &Value, filter: Option<&MetadataFilter>) -> bool {
    match filter {
        None => true,
        Some(filter) => filter
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected)),
    }
}

/// Brute-force ranking over records given in insertion order.
///
/// Sorting is stable, so equal scores keep the order they arrived in.
pub fn rank<'a, I>(
    query: &[f32],
    records: I,
    top_k: usize,
    filter: Option<&MetadataFilter>,
) -> Vec<VectorMatch>
where
    I: IntoIterator<Item = &'a VectorRecord>,
{
    if top_k == 0 {
        return Vec::new();
    }

    let mut matches: Vec<VectorMatch> = records
        .into_iter()
        .filter(|r| matches_filter(&r.metadata, filter))
        .map(|r| VectorMatch {
            chunk_id: r.chunk_id.clone(),
            document_id: r.document_id.clone(),
            score: cosine_similarity(query, &r.embedding),
            text: r.text.clone(),
            metadata: r.metadata.clone(),
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(top_k);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, embedding: Vec<f32>, metadata: Value) -> VectorRecord {
        VectorRecord {
            chunk_id: id.into(),
            document_id: "doc".into(),
            embedding,
            text: id.into(),
            metadata,
        }
    }

    #[test]
    fn test_filter_requires_every_key() {
        let meta = json!({"owner": "ana", "lang": "en"});
        let mut filter = MetadataFilter::new();
        filter.insert("owner".into(), json!("ana"));
        assert!(matches_filter(&meta, Some(&filter)));
        filter.insert("lang".into(), json!("de"));
        assert!(!matches_filter(&meta, Some(&filter)));
        assert!(matches_filter(&meta, None));
    }

    #[test]
    fn test_rank_stable_ties() {
        let records = vec![
            record("first", vec![1.0, 0.0], json!({})),
            record("best", vec![0.0, 1.0], json!({})),
            record("second", vec![2.0, 0.0], json!({})),
        ];
        let hits = rank(&[0.0, 1.0], &records, 3, None);
        let ids: Vec<_> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["best", "first", "second"]);

        assert!(rank(&[0.0, 1.0], &records, 0, None).is_empty());
    }
}
