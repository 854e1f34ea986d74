//! libSQL storage layer for the SiteAssist index.
//!
//! The [`Storage`] struct wraps a libSQL database holding the two-table
//! index: `documents` keyed by URL fingerprint and `chunks` keyed by
//! `(doc_id, chunk_index)`. Opening the database applies pending schema
//! migrations, which doubles as the `install`/schema-repair admin action.

mod migrations;

use std::path::Path;

use libsql::{Connection, Database, params};
use siteassist_shared::{ChunkRecord, DocStatus, DocumentRecord, Result, SiteAssistError};

/// A chunk candidate for retrieval scoring, joined with its document.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    /// Chunk text content.
    pub content: String,
    /// Raw stored embedding (JSON array). Parsed defensively by the caller;
    /// malformed vectors are skipped, not fatal.
    pub embedding_json: String,
    /// Owning document URL.
    pub url: String,
    /// Owning document title.
    pub title: String,
    /// Owning document priority flag.
    pub priority: bool,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SiteAssistError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SiteAssistError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Document operations
    // -----------------------------------------------------------------------

    /// Look up a document by its URL fingerprint.
    pub async fn find_document(&self, url_hash: &str) -> Result<Option<DocumentRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, url_hash, title, content_hash, last_crawled, priority, status, error
                 FROM documents WHERE url_hash = ?1",
                params![url_hash],
            )
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(SiteAssistError::Storage(e.to_string())),
        }
    }

    /// Insert a new document row.
    pub async fn insert_document(&self, doc: &DocumentRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO documents (id, url, url_hash, title, content_hash, last_crawled, priority, status, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    doc.id.as_str(),
                    doc.url.as_str(),
                    doc.url_hash.as_str(),
                    doc.title.as_str(),
                    doc.content_hash.as_str(),
                    doc.last_crawled.to_rfc3339(),
                    doc.priority as i64,
                    doc.status.as_str(),
                    doc.error.as_deref(),
                ],
            )
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Overwrite a document's crawl fields in place (re-crawl of an existing
    /// URL updates the same row rather than creating a duplicate).
    pub async fn update_document(&self, doc: &DocumentRecord) -> Result<()> {
        self.conn
            .execute(
                "UPDATE documents SET title = ?1, content_hash = ?2, last_crawled = ?3,
                        priority = ?4, status = ?5, error = ?6
                 WHERE id = ?7",
                params![
                    doc.title.as_str(),
                    doc.content_hash.as_str(),
                    doc.last_crawled.to_rfc3339(),
                    doc.priority as i64,
                    doc.status.as_str(),
                    doc.error.as_deref(),
                    doc.id.as_str(),
                ],
            )
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Count all documents.
    pub async fn count_documents(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM documents").await
    }

    // -----------------------------------------------------------------------
    // Chunk operations
    // -----------------------------------------------------------------------

    /// Delete all chunks belonging to a document (full replacement on re-crawl).
    pub async fn delete_chunks_for_document(&self, doc_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Insert a single chunk row.
    pub async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<()> {
        let embedding_json = match &chunk.embedding {
            Some(vec) => Some(
                serde_json::to_string(vec)
                    .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
            ),
            None => None,
        };

        self.conn
            .execute(
                "INSERT INTO chunks (id, doc_id, chunk_index, content, embedding, tokens, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    chunk.id.as_str(),
                    chunk.doc_id.as_str(),
                    chunk.chunk_index as i64,
                    chunk.content.as_str(),
                    embedding_json.as_deref(),
                    chunk.tokens as i64,
                    chunk.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Count all chunks across the corpus (checked against the global cap).
    pub async fn count_chunks(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM chunks").await
    }

    /// Count chunks still awaiting an embedding.
    pub async fn count_pending_chunks(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM chunks WHERE embedding IS NULL OR embedding = ''")
            .await
    }

    /// Select up to `limit` chunks whose embedding is absent.
    /// Returns `(chunk_id, content)` pairs in insertion order.
    pub async fn pending_chunks(&self, limit: usize) -> Result<Vec<(String, String)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, content FROM chunks
                 WHERE embedding IS NULL OR embedding = ''
                 ORDER BY created_at, chunk_index
                 LIMIT ?1",
                params![limit.max(1) as i64],
            )
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push((
                row.get::<String>(0)
                    .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
                row.get::<String>(1)
                    .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
            ));
        }
        Ok(results)
    }

    /// Store a computed embedding vector for a chunk.
    pub async fn set_chunk_embedding(&self, chunk_id: &str, embedding: &[f32]) -> Result<()> {
        let json = serde_json::to_string(embedding)
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
        self.conn
            .execute(
                "UPDATE chunks SET embedding = ?1 WHERE id = ?2",
                params![json.as_str(), chunk_id],
            )
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Load all embedded chunks joined with their documents, up to `limit`.
    /// This is the retrieval candidate set — a full linear scan bounded by
    /// the global chunk cap.
    pub async fn embedded_chunks(&self, limit: usize) -> Result<Vec<EmbeddedChunk>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.content, c.embedding, d.url, d.title, d.priority
                 FROM chunks c
                 INNER JOIN documents d ON d.id = c.doc_id
                 WHERE c.embedding IS NOT NULL AND c.embedding <> ''
                 LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(EmbeddedChunk {
                content: row
                    .get::<String>(0)
                    .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
                embedding_json: row
                    .get::<String>(1)
                    .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
                url: row
                    .get::<String>(2)
                    .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
                title: row.get::<String>(3).unwrap_or_default(),
                priority: row.get::<i64>(4).unwrap_or(0) != 0,
            });
        }
        Ok(results)
    }

    /// List a document's chunks in ordinal order.
    pub async fn chunks_for_document(&self, doc_id: &str) -> Result<Vec<ChunkRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, doc_id, chunk_index, content, embedding, tokens, created_at
                 FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index",
                params![doc_id],
            )
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_chunk(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Bulk operations
    // -----------------------------------------------------------------------

    /// Drop all documents and chunks (the operator `purge` action).
    pub async fn purge_all(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM chunks", params![])
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
        self.conn
            .execute("DELETE FROM documents", params![])
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(SiteAssistError::Storage(e.to_string())),
        }
    }
}

/// Convert a database row to a [`DocumentRecord`].
fn row_to_document(row: &libsql::Row) -> Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row
            .get::<String>(0)
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
        url: row
            .get::<String>(1)
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
        url_hash: row
            .get::<String>(2)
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
        title: row.get::<String>(3).unwrap_or_default(),
        content_hash: row.get::<String>(4).unwrap_or_default(),
        last_crawled: parse_timestamp(row, 5)?,
        priority: row.get::<i64>(6).unwrap_or(0) != 0,
        status: DocStatus::from_str_lossy(&row.get::<String>(7).unwrap_or_default()),
        error: row.get::<String>(8).ok().filter(|s| !s.is_empty()),
    })
}

/// Convert a database row to a [`ChunkRecord`].
fn row_to_chunk(row: &libsql::Row) -> Result<ChunkRecord> {
    let embedding = row
        .get::<String>(4)
        .ok()
        .filter(|s| !s.is_empty())
        .and_then(|json| serde_json::from_str::<Vec<f32>>(&json).ok());

    Ok(ChunkRecord {
        id: row
            .get::<String>(0)
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
        doc_id: row
            .get::<String>(1)
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
        chunk_index: row.get::<i64>(2).unwrap_or(0) as u32,
        content: row
            .get::<String>(3)
            .map_err(|e| SiteAssistError::Storage(e.to_string()))?,
        embedding,
        tokens: row.get::<i64>(5).unwrap_or(0) as u32,
        created_at: parse_timestamp(row, 6)?,
    })
}

fn parse_timestamp(row: &libsql::Row, idx: i32) -> Result<chrono::DateTime<chrono::Utc>> {
    let s: String = row
        .get(idx)
        .map_err(|e| SiteAssistError::Storage(e.to_string()))?;
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| SiteAssistError::Storage(format!("invalid date: {e}")))
}
