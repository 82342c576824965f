//! Access-controlled retrieval and generation.
//!
//! Documents come in through ingestion (fetch, extract, chunk, embed) and
//! land in a vector store; queries go out through permissioned retrieval,
//! persona selection, and grounded completion. The `Assistant` facade ties
//! the pieces together.

pub mod access;
pub mod assistant;
pub mod chunker;
pub mod conversation;
pub mod embeddings;
pub mod generate;
pub mod ingest;
pub mod retriever;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use access::{allowed_document_ids, InMemoryUserDirectory, UserStore};
pub use assistant::Assistant;
pub use conversation::ConversationStore;
pub use embeddings::{create_provider, EmbeddingProvider, TrigramProvider};
pub use generate::{GeneratorSettings, ResponseGenerator};
pub use ingest::{FileFetcher, HttpFetcher, PlainTextExtractor, TextExtractor};
pub use retriever::Retriever;
pub use store::{DocFilter, MemoryStore, SqliteStore, VectorStore};
pub use types::{
    Answer, Chunk, Conversation, Document, DocumentMeta, IngestReceipt, IngestRequest,
    IngestSource, Role, ScoredChunk, SourceType, StoreStats, Turn, User,
};
