//! Embedding providers.
//!
//! Provider-agnostic embedding generation behind a single trait. The
//! trigram provider is deterministic and local; the remote provider talks
//! to an HTTP embedding service.

pub mod remote;
pub mod trigram;

use atrium_core::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use remote::RemoteProvider;
pub use trigram::TrigramProvider;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "trigram", "remote")
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::EmbeddingUnavailable("no embedding returned".to_string()))
    }
}

/// Create an embedding provider by name.
pub fn create_provider(
    provider: &str,
    model: &str,
    dimensions: usize,
    endpoint: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider {
        "trigram" => Ok(Arc::new(TrigramProvider::new(dimensions))),

        "remote" => {
            let endpoint = endpoint.ok_or_else(|| {
                AppError::InvalidConfiguration(
                    "remote embedding provider requires an endpoint".to_string(),
                )
            })?;
            Ok(Arc::new(RemoteProvider::new(
                endpoint, model, dimensions, timeout,
            )?))
        }

        _ => Err(AppError::InvalidConfiguration(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, remote",
            provider
        ))),
    }
}

/// Wrapper that counts embedding calls.
///
/// Used by tests to assert that access short-circuits skip the embedding
/// service entirely.
pub struct CountingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of embed_batch calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for CountingProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let provider =
            create_provider("trigram", "trigram-v1", 384, None, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_unknown_provider() {
        match create_provider("unknown", "m", 384, None, Duration::from_secs(5)) {
            Err(err) => assert!(err.to_string().contains("Unknown embedding provider")),
            Ok(_) => panic!("unknown provider must be rejected"),
        }
    }

    #[test]
    fn test_remote_requires_endpoint() {
        let result = create_provider("remote", "m", 384, None, Duration::from_secs(5));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_counting_provider_counts() {
        let counting = CountingProvider::new(Arc::new(TrigramProvider::new(64)));
        assert_eq!(counting.call_count(), 0);

        counting.embed("one").await.unwrap();
        counting
            .embed_batch(&["two".to_string(), "three".to_string()])
            .await
            .unwrap();

        assert_eq!(counting.call_count(), 2);
    }
}
