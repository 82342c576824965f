//! Configuration management for the Atrium assistant.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.atrium/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with persistent state stored
//! under `.atrium/`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
///
/// This struct holds every knob the pipeline consults: chunking parameters,
/// retrieval depth, provider selection, and external-call timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .atrium/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks, in characters
    pub chunk_overlap: usize,

    /// Number of chunks to retrieve per query
    pub top_k: usize,

    /// Number of trailing conversation turns included in prompts
    pub history_window: usize,

    /// Character budget for retrieved context in prompts
    pub max_context_chars: usize,

    /// Completion provider (e.g., "groq", "mock")
    pub completion_provider: String,

    /// Completion model identifier
    pub completion_model: String,

    /// Optional custom completion endpoint
    pub completion_endpoint: Option<String>,

    /// Maximum tokens to generate per completion
    pub max_tokens: u32,

    /// Sampling temperature for completions
    pub temperature: f32,

    /// Embedding provider (e.g., "trigram", "remote")
    pub embedding_provider: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Embedding vector dimension
    pub embedding_dim: usize,

    /// Endpoint for the remote embedding provider
    pub embedding_endpoint: Option<String>,

    /// Timeout for each external call, in seconds
    pub request_timeout_secs: u64,

    /// Maximum retries for transient external-service faults
    pub max_retries: u32,

    /// API key for the completion provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    chunking: Option<ChunkingConfig>,
    retrieval: Option<RetrievalConfig>,
    completion: Option<CompletionConfig>,
    embedding: Option<EmbeddingFileConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkingConfig {
    size: Option<usize>,
    overlap: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RetrievalConfig {
    #[serde(rename = "topK")]
    top_k: Option<usize>,
    #[serde(rename = "historyWindow")]
    history_window: Option<usize>,
    #[serde(rename = "maxContextChars")]
    max_context_chars: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CompletionConfig {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    #[serde(rename = "maxTokens")]
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    #[serde(rename = "timeoutSecs")]
    timeout_secs: Option<u64>,
    #[serde(rename = "maxRetries")]
    max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddingFileConfig {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            chunk_size: 512,
            chunk_overlap: 64,
            top_k: 5,
            history_window: 6,
            max_context_chars: 4000,
            completion_provider: "groq".to_string(),
            completion_model: "llama3-8b-8192".to_string(),
            completion_endpoint: None,
            max_tokens: 500,
            temperature: 0.7,
            embedding_provider: "trigram".to_string(),
            embedding_model: "trigram-v1".to_string(),
            embedding_dim: 384,
            embedding_endpoint: None,
            request_timeout_secs: 30,
            max_retries: 3,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config file, and environment.
    ///
    /// Environment variables:
    /// - `ATRIUM_WORKSPACE`: Override workspace path
    /// - `ATRIUM_CONFIG`: Path to config file
    /// - `ATRIUM_PROVIDER`: Completion provider
    /// - `ATRIUM_MODEL`: Completion model identifier
    /// - `ATRIUM_API_KEY`: API key for the completion provider
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("ATRIUM_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("ATRIUM_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::InvalidConfiguration(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".atrium/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ATRIUM_PROVIDER") {
            config.completion_provider = provider;
        }

        if let Ok(model) = std::env::var("ATRIUM_MODEL") {
            config.completion_model = model;
        }

        if let Ok(key) = std::env::var("ATRIUM_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::InvalidConfiguration(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::InvalidConfiguration(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(chunking) = config_file.chunking {
            if let Some(size) = chunking.size {
                result.chunk_size = size;
            }
            if let Some(overlap) = chunking.overlap {
                result.chunk_overlap = overlap;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            if let Some(top_k) = retrieval.top_k {
                result.top_k = top_k;
            }
            if let Some(window) = retrieval.history_window {
                result.history_window = window;
            }
            if let Some(budget) = retrieval.max_context_chars {
                result.max_context_chars = budget;
            }
        }

        if let Some(completion) = config_file.completion {
            if let Some(provider) = completion.provider {
                result.completion_provider = provider;
            }
            if let Some(model) = completion.model {
                result.completion_model = model;
            }
            if completion.endpoint.is_some() {
                result.completion_endpoint = completion.endpoint;
            }
            if let Some(max_tokens) = completion.max_tokens {
                result.max_tokens = max_tokens;
            }
            if let Some(temperature) = completion.temperature {
                result.temperature = temperature;
            }
            if let Some(timeout) = completion.timeout_secs {
                result.request_timeout_secs = timeout;
            }
            if let Some(retries) = completion.max_retries {
                result.max_retries = retries;
            }
        }

        if let Some(embedding) = config_file.embedding {
            if let Some(provider) = embedding.provider {
                result.embedding_provider = provider;
            }
            if let Some(model) = embedding.model {
                result.embedding_model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                result.embedding_dim = dimensions;
            }
            if embedding.endpoint.is_some() {
                result.embedding_endpoint = embedding.endpoint;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and config files.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.completion_provider = provider;
        }

        if let Some(model) = model {
            self.completion_model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .atrium directory.
    pub fn atrium_dir(&self) -> PathBuf {
        self.workspace.join(".atrium")
    }

    /// Get the path to the SQLite vector index.
    pub fn index_path(&self) -> PathBuf {
        self.atrium_dir().join("index.db")
    }

    /// Ensure the .atrium directory exists.
    pub fn ensure_atrium_dir(&self) -> AppResult<()> {
        let atrium_dir = self.atrium_dir();
        if !atrium_dir.exists() {
            std::fs::create_dir_all(&atrium_dir).map_err(|e| {
                AppError::InvalidConfiguration(format!(
                    "Failed to create .atrium directory: {}",
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Validate configuration before any pipeline work starts.
    ///
    /// Chunking parameters are also validated at the chunker boundary;
    /// checking here surfaces bad config before documents are touched.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::InvalidConfiguration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.chunk_size <= self.chunk_overlap {
            return Err(AppError::InvalidConfiguration(format!(
                "chunk_size ({}) must be greater than chunk_overlap ({})",
                self.chunk_size, self.chunk_overlap
            )));
        }

        if self.top_k == 0 {
            return Err(AppError::InvalidConfiguration(
                "top_k must be greater than zero".to_string(),
            ));
        }

        if self.embedding_dim == 0 {
            return Err(AppError::InvalidConfiguration(
                "embedding_dim must be greater than zero".to_string(),
            ));
        }

        let known_providers = ["groq", "mock"];
        if !known_providers.contains(&self.completion_provider.as_str()) {
            return Err(AppError::InvalidConfiguration(format!(
                "Unknown completion provider: {}. Supported: {}",
                self.completion_provider,
                known_providers.join(", ")
            )));
        }

        if self.completion_provider == "groq" && self.api_key.is_none() {
            return Err(AppError::InvalidConfiguration(
                "groq provider requires ATRIUM_API_KEY".to_string(),
            ));
        }

        if self.embedding_provider == "remote" && self.embedding_endpoint.is_none() {
            return Err(AppError::InvalidConfiguration(
                "remote embedding provider requires embedding.endpoint".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 64);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.completion_provider, "groq");
        assert!(!config.verbose);
    }

    #[test]
    fn test_atrium_dir() {
        let config = AppConfig::default();
        let dir = config.atrium_dir();
        assert!(dir.ends_with(".atrium"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("mock".to_string()),
            Some("test-model".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.completion_provider, "mock");
        assert_eq!(overridden.completion_model, "test-model");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_rejects_overlap_ge_size() {
        let mut config = AppConfig::default();
        config.completion_provider = "mock".to_string();
        config.chunk_size = 64;
        config.chunk_overlap = 64;
        assert!(matches!(
            config.validate(),
            Err(AppError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        config.completion_provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_mock_needs_no_key() {
        let mut config = AppConfig::default();
        config.completion_provider = "mock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_yaml_overrides() {
        let dir = std::env::temp_dir().join(format!("atrium-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        std::fs::write(
            &path,
            "chunking:\n  size: 256\n  overlap: 32\nretrieval:\n  topK: 3\n\
             embedding:\n  provider: remote\n  endpoint: http://localhost:11434\n",
        )
        .unwrap();

        let mut config = AppConfig::default();
        let merged = config.merge_yaml(&path).unwrap();
        assert_eq!(merged.chunk_size, 256);
        assert_eq!(merged.chunk_overlap, 32);
        assert_eq!(merged.top_k, 3);
        assert_eq!(merged.embedding_provider, "remote");
        assert_eq!(
            merged.embedding_endpoint.as_deref(),
            Some("http://localhost:11434")
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_remote_embedding_needs_endpoint() {
        let mut config = AppConfig::default();
        config.completion_provider = "mock".to_string();
        config.embedding_provider = "remote".to_string();
        assert!(config.validate().is_err());

        config.embedding_endpoint = Some("http://localhost:11434".to_string());
        assert!(config.validate().is_ok());
    }
}
