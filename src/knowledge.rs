//! Knowledge-base ingestion and semantic search.
//!
//! Upload pipeline:
//!
//! ```text
//! validate → chunk (max_chunk_size / overlap) → embed → persist document + chunks
//!          → upsert vectors into the target collection
//! ```
//!
//! If the vector upsert fails the document rows are removed again, so a
//! document is either fully searchable or absent.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;

use blogforge_core::chunk::chunk_text;
use blogforge_core::completion::CompletionClient;
use blogforge_core::error::Error;
use blogforge_core::models::{format_ts_iso, KnowledgeDocument};
use blogforge_core::store::{MetadataFilter, VectorMatch, VectorRecord, VectorStore};
use blogforge_core::validate;

use crate::config::ChunkingConfig;
use crate::repository::{self, DocumentSummary};

pub const DEFAULT_OWNER: &str = "anonymous";

pub fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

fn default_document_type() -> String {
    "general".to_string()
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default = "default_document_type")]
    pub document_type: String,
    /// Target collection; the configured default when omitted.
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_owner")]
    pub owner: String,
}

impl UploadRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source_url: None,
            document_type: default_document_type(),
            collection: None,
            metadata: serde_json::Map::new(),
            owner: default_owner(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate::text_len("title", &self.title, 3, Some(500))?;
        validate::text_len("content", &self.content, 10, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub document_id: String,
    pub title: String,
    pub collection: String,
    pub chunks_created: usize,
    pub dims: usize,
    pub chunk_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            document_type: None,
            collection: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate::text_len("query", &self.query, 3, Some(500))?;
        validate::range("top_k", self.top_k, 1, 20)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub collection: String,
    pub results: Vec<VectorMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub document_id: String,
    pub vectors_removed: usize,
}

pub struct KnowledgeService {
    pool: SqlitePool,
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingConfig,
    default_collection: String,
}

impl KnowledgeService {
    pub fn new(
        pool: SqlitePool,
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingConfig,
        default_collection: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            client,
            store,
            chunking,
            default_collection: default_collection.into(),
        }
    }

    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReport> {
        request.validate()?;

        let collection = request
            .collection
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.default_collection.clone());
        let dims = self.client.embedding_dims();
        self.store.create_collection(&collection, dims).await?;

        let document_id = uuid::Uuid::new_v4().to_string();
        let chunks = chunk_text(
            &document_id,
            &request.content,
            self.chunking.max_chunk_size,
            self.chunking.overlap,
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.client.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::TransientProvider(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            ))
            .into());
        }

        let content_hash = hex::encode(Sha256::digest(request.content.as_bytes()));
        let doc = KnowledgeDocument {
            id: document_id.clone(),
            owner: request.owner.clone(),
            title: request.title.trim().to_string(),
            content: request.content.clone(),
            source_url: request.source_url.clone(),
            document_type: request.document_type.clone(),
            collection: collection.clone(),
            metadata: serde_json::Value::Object(request.metadata.clone()),
            chunks,
            created_at: format_ts_iso(chrono::Utc::now().timestamp()),
        };
        repository::insert_document(&self.pool, &doc, &content_hash).await?;

        let records: Vec<VectorRecord> = doc
            .chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let mut metadata = request.metadata.clone();
                metadata.insert("title".into(), doc.title.clone().into());
                metadata.insert("document_type".into(), doc.document_type.clone().into());
                metadata.insert("owner".into(), doc.owner.clone().into());
                metadata.insert("chunk_index".into(), chunk.chunk_index.into());
                if let Some(url) = &doc.source_url {
                    metadata.insert("source_url".into(), url.clone().into());
                }
                VectorRecord {
                    chunk_id: chunk.id.clone(),
                    document_id: doc.id.clone(),
                    embedding,
                    text: chunk.text.clone(),
                    metadata: serde_json::Value::Object(metadata),
                }
            })
            .collect();

        if let Err(e) = self.store.upsert_batch(&collection, records).await {
            tracing::warn!(document = %doc.id, error = %e, "vector upsert failed, removing document");
            repository::delete_document(&self.pool, &doc.id).await?;
            return Err(e);
        }

        tracing::info!(
            document = %doc.id,
            collection = %collection,
            chunks = doc.chunks.len(),
            "knowledge document uploaded"
        );

        Ok(UploadReport {
            document_id: doc.id.clone(),
            title: doc.title.clone(),
            collection,
            chunks_created: doc.chunks.len(),
            dims,
            chunk_ids: doc.chunks.iter().map(|c| c.id.clone()).collect(),
        })
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        request.validate()?;

        let collection = request
            .collection
            .clone()
            .unwrap_or_else(|| self.default_collection.clone());
        let query_vec = self.client.embed_one(&request.query).await?;

        let filter = request.document_type.as_ref().map(|t| {
            let mut f = MetadataFilter::new();
            f.insert("document_type".into(), t.clone().into());
            f
        });

        let results = self
            .store
            .query(&collection, &query_vec, request.top_k, filter.as_ref())
            .await?;

        tracing::debug!(query = %request.query, hits = results.len(), "knowledge search");
        Ok(SearchResponse {
            query: request.query.clone(),
            collection,
            results,
        })
    }

    pub async fn get(&self, id: &str) -> Result<KnowledgeDocument> {
        repository::get_document(&self.pool, id)
            .await?
            .ok_or_else(|| Error::not_found("document", id).into())
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteReport> {
        let doc = self.get(id).await?;
        let vectors_removed = self.store.delete_document(&doc.collection, id).await?;
        repository::delete_document(&self.pool, id).await?;
        tracing::info!(document = id, vectors_removed, "knowledge document deleted");
        Ok(DeleteReport {
            document_id: id.to_string(),
            vectors_removed,
        })
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<DocumentSummary>> {
        repository::list_documents(&self.pool, owner).await
    }
}
