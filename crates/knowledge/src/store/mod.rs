//! Vector storage backends.
//!
//! Both backends do brute-force cosine search over candidate chunks. The
//! access filter is applied to the candidate set itself, before ranking
//! and truncation to k, so a caller can never widen their visibility by
//! asking for a larger k.

pub mod memory;
pub mod sqlite;

use crate::types::{Chunk, Document, DocumentId, DocumentMeta, ScoredChunk, StoreStats};
use atrium_core::AppResult;
use std::cmp::Ordering;
use std::collections::HashSet;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Restricts a search to a set of documents.
#[derive(Debug, Clone)]
pub enum DocFilter {
    /// No restriction (administrative search)
    All,

    /// Only chunks belonging to these documents
    Only(HashSet<DocumentId>),
}

impl DocFilter {
    pub fn allows(&self, document_id: &str) -> bool {
        match self {
            DocFilter::All => true,
            DocFilter::Only(ids) => ids.contains(document_id),
        }
    }

    /// True when the filter admits no documents at all.
    pub fn is_empty_selection(&self) -> bool {
        matches!(self, DocFilter::Only(ids) if ids.is_empty())
    }
}

/// Trait for vector store backends.
///
/// Mutations affecting one document are atomic: a concurrent search sees
/// the document's chunks entirely before or entirely after the change.
pub trait VectorStore: Send + Sync {
    /// Insert a document with its chunks, replacing any existing document
    /// under the same id in a single atomic step.
    fn replace_document(&self, document: &Document, chunks: Vec<Chunk>) -> AppResult<()>;

    /// Insert or overwrite a single chunk of an existing document.
    fn upsert_chunk(&self, chunk: Chunk) -> AppResult<()>;

    /// Metadata for one document, or `None` if absent.
    fn get_document(&self, document_id: &str) -> AppResult<Option<DocumentMeta>>;

    /// All chunks of a document in sequence order.
    fn document_chunks(&self, document_id: &str) -> AppResult<Vec<Chunk>>;

    /// Top-k chunks by cosine similarity among documents the filter admits.
    fn search(&self, query: &[f32], k: usize, filter: &DocFilter) -> AppResult<Vec<ScoredChunk>>;

    /// Remove a document and all of its chunks. Deleting an absent
    /// document is a no-op.
    fn delete_document(&self, document_id: &str) -> AppResult<()>;

    /// Replace a document's permission set, keeping its chunks' denormalized
    /// copies in sync.
    fn set_permissions(&self, document_id: &str, permissions: &[String]) -> AppResult<()>;

    /// Metadata for every stored document.
    fn list_documents(&self) -> AppResult<Vec<DocumentMeta>>;

    /// Document and chunk counts.
    fn stats(&self) -> AppResult<StoreStats>;
}

/// Cosine similarity between two vectors. Zero for mismatched lengths or
/// zero-norm inputs.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Rank scored candidates: descending score, ties broken by chunk id so
/// results are deterministic, truncated to k.
pub(crate) fn rank(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    candidates.truncate(k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            seq: 0,
            text: String::new(),
            start_offset: 0,
            end_offset: 0,
            embedding: None,
            embedding_model: "trigram-v1".to_string(),
        }
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_rank_ties_break_by_chunk_id() {
        let candidates = vec![
            ScoredChunk {
                chunk: chunk("doc#0002"),
                score: 0.5,
            },
            ScoredChunk {
                chunk: chunk("doc#0001"),
                score: 0.5,
            },
            ScoredChunk {
                chunk: chunk("doc#0003"),
                score: 0.9,
            },
        ];

        let ranked = rank(candidates, 2);
        assert_eq!(ranked[0].chunk.id, "doc#0003");
        assert_eq!(ranked[1].chunk.id, "doc#0001");
    }

    #[test]
    fn test_doc_filter() {
        let only: DocFilter = DocFilter::Only(["d1".to_string()].into_iter().collect());
        assert!(only.allows("d1"));
        assert!(!only.allows("d2"));
        assert!(!only.is_empty_selection());

        assert!(DocFilter::All.allows("anything"));
        assert!(DocFilter::Only(HashSet::new()).is_empty_selection());
    }
}
