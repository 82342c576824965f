//! Completion provider factory.
//!
//! Resolves a provider name from configuration to a concrete client.

use crate::client::LlmClient;
use crate::providers::{GroqClient, MockClient};
use atrium_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create a completion client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("groq", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required for hosted providers)
/// * `timeout` - Per-request timeout
///
/// # Errors
/// Returns `InvalidConfiguration` if the provider is unknown or a required
/// API key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "groq" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::InvalidConfiguration("groq provider requires an API key".to_string())
            })?;

            let client = match endpoint {
                Some(url) => GroqClient::with_base_url(url, api_key, timeout)?,
                None => GroqClient::new(api_key, timeout)?,
            };
            Ok(Arc::new(client))
        }
        "mock" => Ok(Arc::new(MockClient::new())),
        _ => Err(AppError::InvalidConfiguration(format!(
            "Unknown completion provider: {}",
            provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_groq_client() {
        let client = create_client("groq", None, Some("key"), Duration::from_secs(5));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().provider_name(), "groq");
    }

    #[test]
    fn test_groq_requires_api_key() {
        let result = create_client("groq", None, None, Duration::from_secs(5));
        assert!(matches!(result, Err(AppError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_create_mock_client() {
        let client = create_client("mock", None, None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.provider_name(), "mock");
    }

    #[test]
    fn test_unknown_provider() {
        let result = create_client("unknown", None, None, Duration::from_secs(5));
        assert!(matches!(result, Err(AppError::InvalidConfiguration(_))));
    }
}
