//! Relational persistence for documents, research sessions and generated
//! content.
//!
//! Timestamps are stored as unix seconds and surfaced as ISO 8601 strings.
//! Lookups by id return `Ok(None)` when nothing matches; services turn that
//! into [`Error::NotFound`](blogforge_core::error::Error::NotFound).

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use blogforge_core::models::{
    format_ts_iso, Chunk, ContentRecord, Depth, Finding, KnowledgeDocument, ResearchResult,
};

fn parse_ts_iso(ts: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|_| chrono::Utc::now().timestamp())
}

/// Listing row for a knowledge document (no body, no chunks).
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub document_type: String,
    pub collection: String,
    pub source_url: Option<String>,
    pub chunk_count: i64,
    pub created_at: String,
}

// ============ Knowledge documents ============

/// Insert a document and its chunks in one transaction.
pub async fn insert_document(
    pool: &SqlitePool,
    doc: &KnowledgeDocument,
    content_hash: &str,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO knowledge_documents
            (id, owner, title, content, source_url, document_type, collection, metadata_json, content_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.owner)
    .bind(&doc.title)
    .bind(&doc.content)
    .bind(&doc.source_url)
    .bind(&doc.document_type)
    .bind(&doc.collection)
    .bind(serde_json::to_string(&doc.metadata)?)
    .bind(content_hash)
    .bind(parse_ts_iso(&doc.created_at))
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to insert document {}", doc.id))?;

    for chunk in &doc.chunks {
        sqlx::query(
            r#"
            INSERT INTO knowledge_chunks (id, document_id, chunk_index, text, start_offset, end_offset, hash)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(chunk.start as i64)
        .bind(chunk.end as i64)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Fetch a document with its chunks in index order.
pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<KnowledgeDocument>> {
    let row = sqlx::query(
        "SELECT id, owner, title, content, source_url, document_type, collection, metadata_json, created_at FROM knowledge_documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let chunk_rows = sqlx::query(
        "SELECT id, document_id, chunk_index, text, start_offset, end_offset, hash FROM knowledge_chunks WHERE document_id = ? ORDER BY chunk_index ASC",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let chunks = chunk_rows
        .iter()
        .map(|r| Chunk {
            id: r.get("id"),
            document_id: r.get("document_id"),
            chunk_index: r.get("chunk_index"),
            text: r.get("text"),
            start: r.get::<i64, _>("start_offset") as usize,
            end: r.get::<i64, _>("end_offset") as usize,
            hash: r.get("hash"),
        })
        .collect();

    let metadata_json: String = row.get("metadata_json");
    let created_at: i64 = row.get("created_at");

    Ok(Some(KnowledgeDocument {
        id: row.get("id"),
        owner: row.get("owner"),
        title: row.get("title"),
        content: row.get("content"),
        source_url: row.get("source_url"),
        document_type: row.get("document_type"),
        collection: row.get("collection"),
        metadata: serde_json::from_str(&metadata_json)
            .with_context(|| format!("Corrupt metadata_json for document {}", id))?,
        chunks,
        created_at: format_ts_iso(created_at),
    }))
}

/// Documents owned by `owner`, newest first.
pub async fn list_documents(pool: &SqlitePool, owner: &str) -> Result<Vec<DocumentSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT d.id, d.owner, d.title, d.document_type, d.collection, d.source_url, d.created_at,
               (SELECT COUNT(*) FROM knowledge_chunks c WHERE c.document_id = d.id) AS chunk_count
        FROM knowledge_documents d
        WHERE d.owner = ?
        ORDER BY d.created_at DESC, d.id ASC
        "#,
    )
    .bind(owner)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| DocumentSummary {
            id: row.get("id"),
            owner: row.get("owner"),
            title: row.get("title"),
            document_type: row.get("document_type"),
            collection: row.get("collection"),
            source_url: row.get("source_url"),
            chunk_count: row.get("chunk_count"),
            created_at: format_ts_iso(row.get("created_at")),
        })
        .collect())
}

/// Delete a document; chunks go with it (`ON DELETE CASCADE`).
/// Returns whether a row was removed.
pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM knowledge_documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============ Research sessions ============

pub async fn save_research(pool: &SqlitePool, owner: &str, result: &ResearchResult) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO research_sessions (id, owner, topic, niche, depth, findings_json, sources_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&result.id)
    .bind(owner)
    .bind(&result.topic)
    .bind(&result.niche)
    .bind(result.depth.to_string())
    .bind(serde_json::to_string(&result.findings)?)
    .bind(serde_json::to_string(&result.sources)?)
    .bind(parse_ts_iso(&result.created_at))
    .execute(pool)
    .await
    .with_context(|| format!("Failed to save research session {}", result.id))?;
    Ok(())
}

pub async fn get_research(pool: &SqlitePool, id: &str) -> Result<Option<ResearchResult>> {
    let row = sqlx::query(
        "SELECT id, topic, niche, depth, findings_json, sources_json, created_at FROM research_sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let depth: String = row.get("depth");
    let findings_json: String = row.get("findings_json");
    let sources_json: String = row.get("sources_json");
    let findings: Vec<Finding> =
        serde_json::from_str(&findings_json).context("Corrupt findings_json")?;

    Ok(Some(ResearchResult {
        id: row.get("id"),
        topic: row.get("topic"),
        niche: row.get("niche"),
        depth: depth
            .parse::<Depth>()
            .map_err(|e| anyhow!("Corrupt depth for research session {}: {}", id, e))?,
        findings,
        sources: serde_json::from_str(&sources_json).context("Corrupt sources_json")?,
        created_at: format_ts_iso(row.get("created_at")),
    }))
}

// ============ Content records ============

pub async fn save_content(pool: &SqlitePool, record: &ContentRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO content_records (id, owner, kind, topic, title, body_json, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            body_json = excluded.body_json,
            status = excluded.status
        "#,
    )
    .bind(&record.id)
    .bind(&record.owner)
    .bind(record.kind.as_str())
    .bind(&record.topic)
    .bind(&record.title)
    .bind(serde_json::to_string(&record.body)?)
    .bind(&record.status)
    .bind(parse_ts_iso(&record.created_at))
    .execute(pool)
    .await
    .with_context(|| format!("Failed to save content record {}", record.id))?;
    Ok(())
}

fn row_to_content(row: &SqliteRow) -> Result<ContentRecord> {
    let kind: String = row.get("kind");
    let body_json: String = row.get("body_json");
    Ok(ContentRecord {
        id: row.get("id"),
        owner: row.get("owner"),
        kind: kind.parse()?,
        topic: row.get("topic"),
        title: row.get("title"),
        body: serde_json::from_str(&body_json).context("Corrupt body_json")?,
        status: row.get("status"),
        created_at: format_ts_iso(row.get("created_at")),
    })
}

pub async fn get_content(pool: &SqlitePool, id: &str) -> Result<Option<ContentRecord>> {
    let row = sqlx::query(
        "SELECT id, owner, kind, topic, title, body_json, status, created_at FROM content_records WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_content).transpose()
}

/// Content owned by `owner`, newest first.
pub async fn list_content(pool: &SqlitePool, owner: &str) -> Result<Vec<ContentRecord>> {
    let rows = sqlx::query(
        "SELECT id, owner, kind, topic, title, body_json, status, created_at FROM content_records WHERE owner = ? ORDER BY created_at DESC, id ASC",
    )
    .bind(owner)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_content).collect()
}
