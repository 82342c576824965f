//! In-memory vector store.
//!
//! Each document lives in one immutable `Arc` entry; mutations build a new
//! entry and swap it in under the write lock, so searches running on a
//! snapshot never observe a half-replaced document.

use crate::store::{cosine_similarity, rank, DocFilter, VectorStore};
use crate::types::{Chunk, Document, DocumentId, DocumentMeta, ScoredChunk, StoreStats};
use atrium_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct DocEntry {
    document: Document,
    chunks: Vec<Chunk>,
}

impl DocEntry {
    fn meta(&self) -> DocumentMeta {
        DocumentMeta {
            id: self.document.id.clone(),
            title: self.document.title.clone(),
            source: self.document.source,
            owner: self.document.owner.clone(),
            ingested_at: self.document.ingested_at,
            permissions: self.document.permissions.clone(),
            chunk_count: self.chunks.len() as u32,
        }
    }
}

/// Volatile store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<DocumentId, Arc<DocEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_entries(&self) -> AppResult<std::sync::RwLockReadGuard<'_, HashMap<DocumentId, Arc<DocEntry>>>> {
        self.entries
            .read()
            .map_err(|_| AppError::Store("store lock poisoned".to_string()))
    }

    fn write_entries(&self) -> AppResult<std::sync::RwLockWriteGuard<'_, HashMap<DocumentId, Arc<DocEntry>>>> {
        self.entries
            .write()
            .map_err(|_| AppError::Store("store lock poisoned".to_string()))
    }
}

impl VectorStore for MemoryStore {
    fn replace_document(&self, document: &Document, chunks: Vec<Chunk>) -> AppResult<()> {
        let entry = Arc::new(DocEntry {
            document: document.clone(),
            chunks,
        });

        let mut entries = self.write_entries()?;
        entries.insert(document.id.clone(), entry);
        Ok(())
    }

    fn upsert_chunk(&self, chunk: Chunk) -> AppResult<()> {
        let mut entries = self.write_entries()?;
        let entry = entries.get(&chunk.document_id).ok_or_else(|| {
            AppError::Store(format!("unknown document '{}'", chunk.document_id))
        })?;

        let mut chunks = entry.chunks.clone();
        match chunks.iter_mut().find(|c| c.id == chunk.id) {
            Some(existing) => *existing = chunk.clone(),
            None => {
                chunks.push(chunk.clone());
                chunks.sort_by_key(|c| c.seq);
            }
        }

        let next = Arc::new(DocEntry {
            document: entry.document.clone(),
            chunks,
        });
        entries.insert(chunk.document_id.clone(), next);
        Ok(())
    }

    fn get_document(&self, document_id: &str) -> AppResult<Option<DocumentMeta>> {
        Ok(self.read_entries()?.get(document_id).map(|e| e.meta()))
    }

    fn document_chunks(&self, document_id: &str) -> AppResult<Vec<Chunk>> {
        Ok(self
            .read_entries()?
            .get(document_id)
            .map(|e| e.chunks.clone())
            .unwrap_or_default())
    }

    fn search(&self, query: &[f32], k: usize, filter: &DocFilter) -> AppResult<Vec<ScoredChunk>> {
        if filter.is_empty_selection() {
            return Ok(vec![]);
        }

        // Snapshot the admitted entries, then score outside the lock
        let snapshot: Vec<Arc<DocEntry>> = {
            let entries = self.read_entries()?;
            entries
                .iter()
                .filter(|(id, _)| filter.allows(id))
                .map(|(_, entry)| Arc::clone(entry))
                .collect()
        };

        let mut candidates = Vec::new();
        for entry in &snapshot {
            for chunk in &entry.chunks {
                if let Some(embedding) = &chunk.embedding {
                    candidates.push(ScoredChunk {
                        score: cosine_similarity(query, embedding),
                        chunk: chunk.clone(),
                    });
                }
            }
        }

        Ok(rank(candidates, k))
    }

    fn delete_document(&self, document_id: &str) -> AppResult<()> {
        self.write_entries()?.remove(document_id);
        Ok(())
    }

    fn set_permissions(&self, document_id: &str, permissions: &[String]) -> AppResult<()> {
        let mut entries = self.write_entries()?;
        let entry = entries
            .get(document_id)
            .ok_or_else(|| AppError::Store(format!("unknown document '{}'", document_id)))?;

        let mut document = entry.document.clone();
        document.permissions = permissions.to_vec();

        let next = Arc::new(DocEntry {
            document,
            chunks: entry.chunks.clone(),
        });
        entries.insert(document_id.to_string(), next);
        Ok(())
    }

    fn list_documents(&self) -> AppResult<Vec<DocumentMeta>> {
        let entries = self.read_entries()?;
        let mut metas: Vec<DocumentMeta> = entries.values().map(|e| e.meta()).collect();
        metas.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(metas)
    }

    fn stats(&self) -> AppResult<StoreStats> {
        let entries = self.read_entries()?;
        Ok(StoreStats {
            documents: entries.len() as u32,
            chunks: entries.values().map(|e| e.chunks.len() as u32).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceType;
    use chrono::Utc;

    fn document(id: &str, permissions: &[&str]) -> Document {
        Document {
            id: id.to_string(),
            title: format!("Title of {}", id),
            source: SourceType::Upload,
            text: String::new(),
            owner: "owner".to_string(),
            ingested_at: Utc::now(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn chunk(document_id: &str, seq: u32, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: Chunk::make_id(document_id, seq),
            document_id: document_id.to_string(),
            seq,
            text: format!("chunk {} of {}", seq, document_id),
            start_offset: 0,
            end_offset: 0,
            embedding: Some(embedding),
            embedding_model: "trigram-v1".to_string(),
        }
    }

    #[test]
    fn test_replace_and_list() {
        let store = MemoryStore::new();
        store
            .replace_document(&document("d1", &["alice"]), vec![chunk("d1", 0, vec![1.0])])
            .unwrap();

        let docs = store.list_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].chunk_count, 1);
        assert_eq!(docs[0].permissions, vec!["alice"]);
    }

    #[test]
    fn test_replace_swaps_chunks_atomically() {
        let store = MemoryStore::new();
        store
            .replace_document(
                &document("d1", &[]),
                vec![chunk("d1", 0, vec![1.0]), chunk("d1", 1, vec![1.0])],
            )
            .unwrap();
        store
            .replace_document(&document("d1", &[]), vec![chunk("d1", 0, vec![0.5])])
            .unwrap();

        let chunks = store.document_chunks("d1").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].embedding, Some(vec![0.5]));
    }

    #[test]
    fn test_upsert_chunk_is_idempotent() {
        let store = MemoryStore::new();
        store
            .replace_document(&document("d1", &[]), vec![chunk("d1", 0, vec![1.0])])
            .unwrap();

        store.upsert_chunk(chunk("d1", 0, vec![2.0])).unwrap();
        store.upsert_chunk(chunk("d1", 0, vec![2.0])).unwrap();

        let chunks = store.document_chunks("d1").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].embedding, Some(vec![2.0]));
    }

    #[test]
    fn test_upsert_chunk_unknown_document() {
        let store = MemoryStore::new();
        assert!(store.upsert_chunk(chunk("ghost", 0, vec![1.0])).is_err());
    }

    #[test]
    fn test_search_respects_filter() {
        let store = MemoryStore::new();
        store
            .replace_document(&document("d1", &[]), vec![chunk("d1", 0, vec![1.0, 0.0])])
            .unwrap();
        store
            .replace_document(&document("d2", &[]), vec![chunk("d2", 0, vec![1.0, 0.0])])
            .unwrap();

        let only_d2 = DocFilter::Only(["d2".to_string()].into_iter().collect());
        let results = store.search(&[1.0, 0.0], 10, &only_d2).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, "d2");
    }

    #[test]
    fn test_search_empty_selection_returns_nothing() {
        let store = MemoryStore::new();
        store
            .replace_document(&document("d1", &[]), vec![chunk("d1", 0, vec![1.0])])
            .unwrap();

        let results = store
            .search(&[1.0], 10, &DocFilter::Only(Default::default()))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_filter_beats_large_k() {
        // A huge k must not leak chunks excluded by the filter
        let store = MemoryStore::new();
        store
            .replace_document(&document("mine", &[]), vec![chunk("mine", 0, vec![0.1, 0.9])])
            .unwrap();
        store
            .replace_document(
                &document("secret", &[]),
                vec![chunk("secret", 0, vec![1.0, 0.0])],
            )
            .unwrap();

        let mine = DocFilter::Only(["mine".to_string()].into_iter().collect());
        let results = store.search(&[1.0, 0.0], 1000, &mine).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, "mine");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store
            .replace_document(&document("d1", &[]), vec![chunk("d1", 0, vec![1.0])])
            .unwrap();

        store.delete_document("d1").unwrap();
        store.delete_document("d1").unwrap();

        assert!(store.get_document("d1").unwrap().is_none());
        assert_eq!(store.stats().unwrap().documents, 0);
    }

    #[test]
    fn test_set_permissions() {
        let store = MemoryStore::new();
        store
            .replace_document(&document("d1", &["alice"]), vec![chunk("d1", 0, vec![1.0])])
            .unwrap();

        store
            .set_permissions("d1", &["alice".to_string(), "bob".to_string()])
            .unwrap();

        let meta = store.get_document("d1").unwrap().unwrap();
        assert_eq!(meta.permissions, vec!["alice", "bob"]);

        assert!(store.set_permissions("ghost", &[]).is_err());
    }
}
