//! Document acquisition: fetching bytes and extracting text.

use atrium_core::{AppError, AppResult};
use std::time::Duration;

/// Trait for turning raw document bytes into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract text from bytes with the given MIME type.
    fn extract_text(&self, bytes: &[u8], mime: &str) -> AppResult<String>;
}

/// Extractor for plain-text formats.
///
/// Binary formats (PDF, Word) are rejected with `UnsupportedFormat`; their
/// conversion runs upstream of ingestion.
pub struct PlainTextExtractor;

const TEXT_MIMES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/html",
    "text/csv",
    "application/json",
];

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, bytes: &[u8], mime: &str) -> AppResult<String> {
        let base = mime.split(';').next().unwrap_or(mime).trim();

        if !TEXT_MIMES.contains(&base) {
            return Err(AppError::UnsupportedFormat(format!(
                "cannot extract text from '{}'",
                base
            )));
        }

        String::from_utf8(bytes.to_vec())
            .map_err(|_| AppError::UnsupportedFormat(format!("'{}' payload is not UTF-8", base)))
    }
}

/// Trait for fetching document bytes from a source reference.
#[async_trait::async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch the bytes behind a reference (e.g. a URL) along with the
    /// reported MIME type.
    async fn fetch(&self, reference: &str) -> AppResult<(Vec<u8>, String)>;
}

/// Fetcher for HTTP(S) URLs.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl FileFetcher for HttpFetcher {
    async fn fetch(&self, reference: &str) -> AppResult<(Vec<u8>, String)> {
        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to fetch '{}': {}", reference, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!(
                "'{}' returned {}",
                reference, status
            )));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/plain")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to read body of '{}': {}", reference, e)))?;

        Ok((bytes.to_vec(), mime))
    }
}
