//! Idempotent schema setup.
//!
//! | Table | Holds |
//! |-------|-------|
//! | `knowledge_documents` | Uploaded knowledge-base documents |
//! | `knowledge_chunks` | Their chunks with char offsets and hashes |
//! | `research_sessions` | Persisted research results |
//! | `content_records` | Generated outlines, drafts, explanations, SEO reports, workflow runs |
//! | `vector_collections` | Collection name → dimensionality |
//! | `vector_records` | Embeddings as little-endian f32 BLOBs |

use anyhow::Result;
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_documents (
        id TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        source_url TEXT,
        document_type TEXT NOT NULL DEFAULT 'general',
        collection TEXT NOT NULL,
        metadata_json TEXT NOT NULL DEFAULT '{}',
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_knowledge_documents_owner ON knowledge_documents(owner, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        start_offset INTEGER NOT NULL,
        end_offset INTEGER NOT NULL,
        hash TEXT NOT NULL,
        UNIQUE(document_id, chunk_index),
        FOREIGN KEY (document_id) REFERENCES knowledge_documents(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS research_sessions (
        id TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        topic TEXT NOT NULL,
        niche TEXT,
        depth TEXT NOT NULL,
        findings_json TEXT NOT NULL,
        sources_json TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_research_sessions_owner ON research_sessions(owner, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS content_records (
        id TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        kind TEXT NOT NULL,
        topic TEXT NOT NULL,
        title TEXT NOT NULL,
        body_json TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_content_records_owner ON content_records(owner, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS vector_collections (
        name TEXT PRIMARY KEY,
        dims INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vector_records (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        chunk_id TEXT NOT NULL,
        document_id TEXT NOT NULL,
        text TEXT NOT NULL,
        metadata_json TEXT NOT NULL DEFAULT '{}',
        embedding BLOB NOT NULL,
        UNIQUE(collection, chunk_id),
        FOREIGN KEY (collection) REFERENCES vector_collections(name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_vector_records_document ON vector_records(collection, document_id)",
];

/// Create every table and index that does not exist yet.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!("database schema is up to date");
    Ok(())
}
