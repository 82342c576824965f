//! Assistant facade.
//!
//! Wires acquisition, chunking, embedding, storage, retrieval, and
//! generation behind one entry point. The CLI and tests talk to this type
//! only.

use crate::access::UserStore;
use crate::chunker::chunk_text;
use crate::conversation::ConversationStore;
use crate::embeddings::EmbeddingProvider;
use crate::generate::{GeneratorSettings, ResponseGenerator};
use crate::ingest::{FileFetcher, TextExtractor};
use crate::retriever::Retriever;
use crate::store::VectorStore;
use crate::types::{
    Answer, Chunk, Document, IngestReceipt, IngestRequest, IngestSource, ScoredChunk, SourceType,
    StoreStats, Turn,
};
use atrium_core::{AppConfig, AppResult};
use atrium_llm::{with_backoff, BackoffPolicy, LlmClient};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// The access-controlled retrieval-and-generation pipeline.
pub struct Assistant {
    config: AppConfig,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    fetcher: Arc<dyn FileFetcher>,
    extractor: Arc<dyn TextExtractor>,
    conversations: Arc<ConversationStore>,
    retriever: Arc<Retriever>,
    generator: ResponseGenerator,
    backoff: BackoffPolicy,
}

impl Assistant {
    /// Assemble an assistant from its components.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn VectorStore>,
        users: Arc<dyn UserStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn LlmClient>,
        conversations: Arc<ConversationStore>,
        fetcher: Arc<dyn FileFetcher>,
        extractor: Arc<dyn TextExtractor>,
    ) -> AppResult<Self> {
        config.validate()?;

        let backoff = BackoffPolicy::with_max_retries(config.max_retries);
        let retriever = Arc::new(Retriever::new(
            Arc::clone(&store),
            users,
            Arc::clone(&embedder),
            backoff,
        ));

        let settings = GeneratorSettings {
            model: config.completion_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_k: config.top_k,
            history_window: config.history_window,
            max_context_chars: config.max_context_chars,
        };
        let generator = ResponseGenerator::new(
            Arc::clone(&retriever),
            completion,
            Arc::clone(&conversations),
            settings,
            backoff,
        );

        Ok(Self {
            config,
            store,
            embedder,
            fetcher,
            extractor,
            conversations,
            retriever,
            generator,
            backoff,
        })
    }

    /// Ingest one document: acquire text, chunk, embed, and store.
    ///
    /// All-or-nothing: the store is only touched once every chunk has an
    /// embedding, and re-ingesting an existing id swaps its chunks in one
    /// atomic step.
    pub async fn ingest(&self, request: IngestRequest) -> AppResult<IngestReceipt> {
        let (text, source) = self.resolve_text(&request.source).await?;

        let document_id = match (&request.document_id, &request.source) {
            (Some(id), _) => id.clone(),
            // URL-sourced documents default to the URL as their id so
            // re-fetching the same page replaces rather than duplicates
            (None, IngestSource::Url(url)) => url.clone(),
            (None, _) => Uuid::new_v4().to_string(),
        };

        let spans = chunk_text(&text, self.config.chunk_size, self.config.chunk_overlap)?;

        let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
        let embeddings = with_backoff(self.backoff, "chunk embedding", || {
            self.embedder.embed_batch(&texts)
        })
        .await?;

        let mut permissions = request.permissions.clone();
        if !permissions.iter().any(|p| p == &request.owner) {
            permissions.push(request.owner.clone());
        }

        let document = Document {
            id: document_id.clone(),
            title: request.title.clone(),
            source,
            text: text.clone(),
            owner: request.owner.clone(),
            ingested_at: Utc::now(),
            permissions,
        };

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .zip(embeddings)
            .map(|(span, embedding)| Chunk {
                id: Chunk::make_id(&document_id, span.seq),
                document_id: document_id.clone(),
                seq: span.seq,
                text: span.text,
                start_offset: span.start_offset,
                end_offset: span.end_offset,
                embedding: Some(embedding),
                embedding_model: self.embedder.model_name().to_string(),
            })
            .collect();

        let chunk_count = chunks.len() as u32;
        self.store.replace_document(&document, chunks)?;

        tracing::info!(
            "Ingested '{}' ({} bytes, {} chunks)",
            document_id,
            text.len(),
            chunk_count
        );

        Ok(IngestReceipt {
            document_id,
            chunk_count,
            byte_count: text.len() as u64,
        })
    }

    async fn resolve_text(&self, source: &IngestSource) -> AppResult<(String, SourceType)> {
        match source {
            IngestSource::Url(url) => {
                let (bytes, mime) = self.fetcher.fetch(url).await?;
                Ok((self.extractor.extract_text(&bytes, &mime)?, SourceType::Url))
            }
            IngestSource::Bytes { data, mime } => Ok((
                self.extractor.extract_text(data, mime)?,
                SourceType::Upload,
            )),
            IngestSource::Text(text) => Ok((text.clone(), SourceType::Upload)),
        }
    }

    /// Top-k visible chunks for a user's query.
    pub async fn retrieve(
        &self,
        user_id: &str,
        query: &str,
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        self.retriever.retrieve(user_id, query, k).await
    }

    /// Answer a query within a conversation.
    pub async fn generate(
        &self,
        user_id: &str,
        conversation_id: &str,
        query: &str,
    ) -> AppResult<Answer> {
        self.generator.generate(user_id, conversation_id, query).await
    }

    /// Remove a document and its chunks. No-op for unknown ids.
    pub fn delete_document(&self, document_id: &str) -> AppResult<()> {
        self.store.delete_document(document_id)
    }

    /// Add an identity to a document's permission set.
    pub fn grant(&self, document_id: &str, identity: &str) -> AppResult<()> {
        let meta = self.store.get_document(document_id)?.ok_or_else(|| {
            atrium_core::AppError::Store(format!("unknown document '{}'", document_id))
        })?;

        let mut permissions = meta.permissions;
        if !permissions.iter().any(|p| p == identity) {
            permissions.push(identity.to_string());
            self.store.set_permissions(document_id, &permissions)?;
        }
        Ok(())
    }

    /// Remove an identity from a document's permission set.
    pub fn revoke(&self, document_id: &str, identity: &str) -> AppResult<()> {
        let meta = self.store.get_document(document_id)?.ok_or_else(|| {
            atrium_core::AppError::Store(format!("unknown document '{}'", document_id))
        })?;

        let mut permissions = meta.permissions;
        let before = permissions.len();
        permissions.retain(|p| p != identity);
        if permissions.len() != before {
            self.store.set_permissions(document_id, &permissions)?;
        }
        Ok(())
    }

    /// Snapshot of a conversation's turns.
    pub fn history(&self, conversation_id: &str) -> AppResult<Vec<Turn>> {
        self.conversations.history(conversation_id)
    }

    /// Serialize a conversation to pretty JSON.
    pub fn export_conversation(&self, conversation_id: &str) -> AppResult<String> {
        self.conversations.export_json(conversation_id)
    }

    /// Document and chunk counts.
    pub fn stats(&self) -> AppResult<StoreStats> {
        self.store.stats()
    }

    /// Metadata for every stored document.
    pub fn list_documents(&self) -> AppResult<Vec<crate::types::DocumentMeta>> {
        self.store.list_documents()
    }
}
