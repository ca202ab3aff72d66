//! SQLite-backed [`VectorStore`].
//!
//! Collections live in `vector_collections`, records in `vector_records`
//! with embeddings as little-endian f32 BLOBs. `seq` preserves insertion
//! order; an upsert that hits an existing `(collection, chunk_id)` updates
//! the row in place, so its position is kept. Queries are brute-force
//! cosine similarity over the collection, ranked by the shared core helper.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use blogforge_core::embedding::{blob_to_vec, ensure_dims, vec_to_blob};
use blogforge_core::error::Error;
use blogforge_core::store::{rank, MetadataFilter, VectorMatch, VectorRecord, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Dims of `name`, creating the collection with `dims` when missing.
    async fn ensure_collection(
        tx: &mut Transaction<'_, Sqlite>,
        name: &str,
        dims: usize,
    ) -> Result<usize> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM vector_collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&mut **tx)
                .await?;

        match existing {
            Some(d) => Ok(d as usize),
            None => {
                sqlx::query("INSERT INTO vector_collections (name, dims, created_at) VALUES (?, ?, ?)")
                    .bind(name)
                    .bind(dims as i64)
                    .bind(chrono::Utc::now().timestamp())
                    .execute(&mut **tx)
                    .await?;
                tracing::info!(collection = name, dims, "created vector collection");
                Ok(dims)
            }
        }
    }

    async fn write_record(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        record: &VectorRecord,
    ) -> Result<()> {
        let metadata_json = serde_json::to_string(&record.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO vector_records (collection, chunk_id, document_id, text, metadata_json, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, chunk_id) DO UPDATE SET
                document_id = excluded.document_id,
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding
            "#,
        )
        .bind(collection)
        .bind(&record.chunk_id)
        .bind(&record.document_id)
        .bind(&record.text)
        .bind(&metadata_json)
        .bind(vec_to_blob(&record.embedding))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<VectorRecord> {
    let chunk_id: String = row.get("chunk_id");
    let blob: Vec<u8> = row.get("embedding");
    let metadata_json: String = row.get("metadata_json");
    Ok(VectorRecord {
        embedding: blob_to_vec(&blob).with_context(|| format!("chunk {}", chunk_id))?,
        metadata: serde_json::from_str(&metadata_json)
            .with_context(|| format!("Corrupt metadata_json for chunk {}", chunk_id))?,
        document_id: row.get("document_id"),
        text: row.get("text"),
        chunk_id,
    })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let actual = Self::ensure_collection(&mut tx, name, dims).await?;
        if actual != dims {
            return Err(Error::DimensionMismatch {
                collection: name.to_string(),
                expected: actual,
                actual: dims,
            }
            .into());
        }
        tx.commit().await?;
        Ok(())
    }

    async fn collection_dims(&self, name: &str) -> Result<Option<usize>> {
        let dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM vector_collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(dims.map(|d| d as usize))
    }

    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<()> {
        self.upsert_batch(collection, vec![record]).await
    }

    /// All-or-nothing: one bad vector rolls the whole batch back.
    async fn upsert_batch(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        let dims = Self::ensure_collection(&mut tx, collection, first.embedding.len()).await?;
        for record in &records {
            ensure_dims(collection, dims, &record.embedding)?;
            Self::write_record(&mut tx, collection, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        let Some(dims) = self.collection_dims(collection).await? else {
            return Ok(Vec::new());
        };
        ensure_dims(collection, dims, query)?;

        let rows = sqlx::query(
            "SELECT chunk_id, document_id, text, metadata_json, embedding FROM vector_records WHERE collection = ? ORDER BY seq ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>>>()?;
        Ok(rank(query, &records, top_k, filter))
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM vector_records WHERE collection = ? AND document_id = ?")
            .bind(collection)
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}
