//! SQLite-backed vector store.
//!
//! Documents and chunks live in two tables; each chunk row carries a
//! denormalized copy of its document's permission set. All multi-row
//! mutations run inside a transaction so a document is never observable
//! half-replaced.

use crate::store::{cosine_similarity, rank, DocFilter, VectorStore};
use crate::types::{Chunk, Document, DocumentMeta, ScoredChunk, SourceType, StoreStats};
use atrium_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    source_type  TEXT NOT NULL,
    owner        TEXT NOT NULL,
    text         TEXT NOT NULL,
    ingested_at  TEXT NOT NULL,
    permissions  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id              TEXT PRIMARY KEY,
    document_id     TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    seq             INTEGER NOT NULL,
    text            TEXT NOT NULL,
    start_offset    INTEGER NOT NULL,
    end_offset      INTEGER NOT NULL,
    embedding       BLOB,
    embedding_model TEXT NOT NULL,
    permissions     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
";

/// Durable store backed by a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> AppError {
    AppError::Store(e.to_string())
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let blob: Option<Vec<u8>> = row.get("embedding")?;
    Ok(Chunk {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        seq: row.get("seq")?,
        text: row.get("text")?,
        start_offset: row.get::<_, i64>("start_offset")? as usize,
        end_offset: row.get::<_, i64>("end_offset")? as usize,
        embedding: blob.map(|b| blob_to_embedding(&b)),
        embedding_model: row.get("embedding_model")?,
    })
}

/// Raw document row before the stored text columns are decoded.
struct MetaRow {
    id: String,
    title: String,
    source: String,
    owner: String,
    ingested_at: String,
    permissions: String,
    chunk_count: u32,
}

fn meta_from_row(row: &Row<'_>) -> rusqlite::Result<MetaRow> {
    Ok(MetaRow {
        id: row.get("id")?,
        title: row.get("title")?,
        source: row.get("source_type")?,
        owner: row.get("owner")?,
        ingested_at: row.get("ingested_at")?,
        permissions: row.get("permissions")?,
        chunk_count: row.get("chunk_count")?,
    })
}

fn decode_meta(row: MetaRow) -> AppResult<DocumentMeta> {
    Ok(DocumentMeta {
        id: row.id,
        title: row.title,
        source: SourceType::parse(&row.source)
            .ok_or_else(|| AppError::Store(format!("unknown source type '{}'", row.source)))?,
        owner: row.owner,
        ingested_at: parse_timestamp(&row.ingested_at)?,
        permissions: serde_json::from_str(&row.permissions)?,
        chunk_count: row.chunk_count,
    })
}

fn parse_timestamp(s: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Store(format!("invalid timestamp '{}': {}", s, e)))
}

const META_QUERY: &str = "SELECT d.id, d.title, d.source_type, d.owner, d.ingested_at, \
     d.permissions, \
     (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id) AS chunk_count \
     FROM documents d";

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Store("connection lock poisoned".to_string()))
    }

    fn insert_chunk_rows(
        tx: &rusqlite::Transaction<'_>,
        chunks: &[Chunk],
        permissions_json: &str,
    ) -> AppResult<()> {
        let mut stmt = tx
            .prepare(
                "INSERT OR REPLACE INTO chunks \
                 (id, document_id, seq, text, start_offset, end_offset, \
                  embedding, embedding_model, permissions) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .map_err(db_err)?;

        for chunk in chunks {
            stmt.execute(params![
                chunk.id,
                chunk.document_id,
                chunk.seq,
                chunk.text,
                chunk.start_offset as i64,
                chunk.end_offset as i64,
                chunk.embedding.as_deref().map(embedding_to_blob),
                chunk.embedding_model,
                permissions_json,
            ])
            .map_err(db_err)?;
        }
        Ok(())
    }
}

impl VectorStore for SqliteStore {
    fn replace_document(&self, document: &Document, chunks: Vec<Chunk>) -> AppResult<()> {
        let permissions_json = serde_json::to_string(&document.permissions)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute("DELETE FROM chunks WHERE document_id = ?1", [&document.id])
            .map_err(db_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO documents \
             (id, title, source_type, owner, text, ingested_at, permissions) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document.id,
                document.title,
                document.source.as_str(),
                document.owner,
                document.text,
                document.ingested_at.to_rfc3339(),
                permissions_json,
            ],
        )
        .map_err(db_err)?;

        Self::insert_chunk_rows(&tx, &chunks, &permissions_json)?;

        tx.commit().map_err(db_err)?;

        tracing::debug!(
            "Stored document '{}' with {} chunks",
            document.id,
            chunks.len()
        );
        Ok(())
    }

    fn upsert_chunk(&self, chunk: Chunk) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let permissions_json: String = tx
            .query_row(
                "SELECT permissions FROM documents WHERE id = ?1",
                [&chunk.document_id],
                |row| row.get(0),
            )
            .map_err(|_| AppError::Store(format!("unknown document '{}'", chunk.document_id)))?;

        Self::insert_chunk_rows(&tx, std::slice::from_ref(&chunk), &permissions_json)?;
        tx.commit().map_err(db_err)
    }

    fn get_document(&self, document_id: &str) -> AppResult<Option<DocumentMeta>> {
        let conn = self.lock()?;
        let query = format!("{} WHERE d.id = ?1", META_QUERY);
        let row = conn
            .query_row(&query, [document_id], meta_from_row)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(db_err(other)),
            })?;

        row.map(decode_meta).transpose()
    }

    fn document_chunks(&self, document_id: &str) -> AppResult<Vec<Chunk>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM chunks WHERE document_id = ?1 ORDER BY seq")
            .map_err(db_err)?;

        let rows = stmt
            .query_map([document_id], chunk_from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn search(&self, query: &[f32], k: usize, filter: &DocFilter) -> AppResult<Vec<ScoredChunk>> {
        if filter.is_empty_selection() {
            return Ok(vec![]);
        }

        let conn = self.lock()?;

        // The filter narrows the candidate rows themselves; ranking and
        // truncation happen only over admitted chunks.
        let candidates: Vec<Chunk> = match filter {
            DocFilter::All => {
                let mut stmt = conn
                    .prepare("SELECT * FROM chunks WHERE embedding IS NOT NULL")
                    .map_err(db_err)?;
                let rows = stmt.query_map([], chunk_from_row).map_err(db_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
            }
            DocFilter::Only(ids) => {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "SELECT * FROM chunks WHERE embedding IS NOT NULL \
                     AND document_id IN ({})",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql).map_err(db_err)?;
                let rows = stmt
                    .query_map(params_from_iter(ids.iter()), chunk_from_row)
                    .map_err(db_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
            }
        };

        let scored = candidates
            .into_iter()
            .filter_map(|chunk| {
                let embedding = chunk.embedding.as_deref()?;
                Some(ScoredChunk {
                    score: cosine_similarity(query, embedding),
                    chunk,
                })
            })
            .collect();

        Ok(rank(scored, k))
    }

    fn delete_document(&self, document_id: &str) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute("DELETE FROM chunks WHERE document_id = ?1", [document_id])
            .map_err(db_err)?;
        let removed = tx
            .execute("DELETE FROM documents WHERE id = ?1", [document_id])
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        if removed > 0 {
            tracing::debug!("Deleted document '{}'", document_id);
        }
        Ok(())
    }

    fn set_permissions(&self, document_id: &str, permissions: &[String]) -> AppResult<()> {
        let permissions_json = serde_json::to_string(permissions)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let updated = tx
            .execute(
                "UPDATE documents SET permissions = ?1 WHERE id = ?2",
                params![permissions_json, document_id],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(AppError::Store(format!(
                "unknown document '{}'",
                document_id
            )));
        }

        tx.execute(
            "UPDATE chunks SET permissions = ?1 WHERE document_id = ?2",
            params![permissions_json, document_id],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)
    }

    fn list_documents(&self) -> AppResult<Vec<DocumentMeta>> {
        let conn = self.lock()?;
        let query = format!("{} ORDER BY d.id", META_QUERY);
        let mut stmt = conn.prepare(&query).map_err(db_err)?;

        let rows = stmt.query_map([], meta_from_row).map_err(db_err)?;
        rows.map(|r| decode_meta(r.map_err(db_err)?)).collect()
    }

    fn stats(&self) -> AppResult<StoreStats> {
        let conn = self.lock()?;
        let documents: u32 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(db_err)?;
        let chunks: u32 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(StoreStats { documents, chunks })
    }
}
