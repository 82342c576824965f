//! Scripted completion provider for tests and offline development.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use atrium_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the mock should do for a single call.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this text.
    Reply(String),
    /// Fail with a timeout.
    Timeout,
    /// Fail with a rate-limit error.
    RateLimited,
    /// Fail with a service-unavailable error.
    Unavailable,
}

/// Scripted completion client.
///
/// Plays back a queue of behaviors; once the queue is exhausted it echoes
/// the prompt. Records how many times `complete` was called so tests can
/// assert on call counts.
pub struct MockClient {
    script: Mutex<VecDeque<MockBehavior>>,
    calls: AtomicUsize,
}

impl MockClient {
    /// Create a mock that echoes every prompt.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that plays back the given behaviors in order.
    pub fn with_script(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            script: Mutex::new(behaviors.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always replies with the same text.
    ///
    /// A single remaining scripted behavior repeats forever.
    pub fn always(reply: impl Into<String>) -> Self {
        Self::with_script(vec![MockBehavior::Reply(reply.into())])
    }

    /// Create a mock that always times out.
    pub fn always_timeout() -> Self {
        Self::with_script(vec![MockBehavior::Timeout])
    }

    /// Number of times `complete` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let behavior = {
            let mut script = self.script.lock().unwrap();
            match script.len() {
                0 => None,
                // A single remaining behavior repeats forever so "always_*"
                // constructors keep their promise across retries
                1 => script.front().cloned(),
                _ => script.pop_front(),
            }
        };

        match behavior {
            Some(MockBehavior::Reply(text)) => Ok(LlmResponse {
                content: text,
                model: request.model.clone(),
                usage: LlmUsage::new(0, 0),
            }),
            Some(MockBehavior::Timeout) => Err(AppError::Timeout(
                "mock completion timed out".to_string(),
            )),
            Some(MockBehavior::RateLimited) => Err(AppError::RateLimited(
                "mock completion rate limited".to_string(),
            )),
            Some(MockBehavior::Unavailable) => Err(AppError::ServiceUnavailable(
                "mock completion unavailable".to_string(),
            )),
            None => Ok(LlmResponse {
                content: request.prompt.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(0, 0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_by_default() {
        let mock = MockClient::new();
        let response = mock
            .complete(&LlmRequest::new("hello", "test-model"))
            .await
            .unwrap();
        assert_eq!(response.content, "hello");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_plays_script_in_order() {
        let mock = MockClient::with_script(vec![
            MockBehavior::RateLimited,
            MockBehavior::Reply("ok".to_string()),
        ]);

        let first = mock.complete(&LlmRequest::new("q", "m")).await;
        assert!(matches!(first, Err(AppError::RateLimited(_))));

        let second = mock.complete(&LlmRequest::new("q", "m")).await.unwrap();
        assert_eq!(second.content, "ok");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_always_timeout_repeats() {
        let mock = MockClient::always_timeout();
        for _ in 0..3 {
            let result = mock.complete(&LlmRequest::new("q", "m")).await;
            assert!(matches!(result, Err(AppError::Timeout(_))));
        }
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_always_reply_repeats() {
        let mock = MockClient::always("canned");
        for _ in 0..2 {
            let response = mock.complete(&LlmRequest::new("q", "m")).await.unwrap();
            assert_eq!(response.content, "canned");
        }
    }
}
