//! Permissioned retrieval.

use crate::access::{allowed_document_ids, UserStore};
use crate::embeddings::EmbeddingProvider;
use crate::store::{DocFilter, VectorStore};
use crate::types::ScoredChunk;
use atrium_core::AppResult;
use atrium_llm::{with_backoff, BackoffPolicy};
use std::sync::Arc;

/// Retrieves the top-k visible chunks for a user's query.
///
/// Access is resolved before the query is embedded: a user with nothing
/// to see costs no embedding call and no vector search.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    users: Arc<dyn UserStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    backoff: BackoffPolicy,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        users: Arc<dyn UserStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            store,
            users,
            embedder,
            backoff,
        }
    }

    /// Top-k chunks for the query among documents the user may see.
    ///
    /// Returns an empty list for a user with no visible documents; callers
    /// cannot tell that apart from a query with no matches.
    pub async fn retrieve(
        &self,
        user_id: &str,
        query: &str,
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        let allowed = allowed_document_ids(self.users.as_ref(), self.store.as_ref(), user_id)?;

        if allowed.is_empty() {
            tracing::debug!("No visible documents for '{}', skipping search", user_id);
            return Ok(vec![]);
        }

        let embedding = with_backoff(self.backoff, "query embedding", || {
            self.embedder.embed(query)
        })
        .await?;

        let results = self
            .store
            .search(&embedding, k, &DocFilter::Only(allowed))?;

        tracing::debug!(
            "Retrieved {} chunks for '{}' (k = {})",
            results.len(),
            user_id,
            k
        );
        Ok(results)
    }
}
