//! Command handlers for the Atrium CLI.

pub mod ask;
pub mod documents;
pub mod export;
pub mod ingest;

pub use ask::AskCommand;
pub use documents::DocumentsCommand;
pub use export::ExportCommand;
pub use ingest::IngestCommand;

use atrium_core::{AppConfig, AppResult};
use atrium_knowledge::{
    create_provider, Assistant, ConversationStore, HttpFetcher, InMemoryUserDirectory,
    PlainTextExtractor, SqliteStore, User,
};
use atrium_llm::create_client;
use std::sync::Arc;
use std::time::Duration;

/// Load the user directory from `.atrium/users.yaml`.
///
/// The file is a YAML list of users (id, role, grants). Without one, the
/// CLI runs single-user with a local admin identity.
fn load_users(config: &AppConfig) -> AppResult<Arc<InMemoryUserDirectory>> {
    let directory = InMemoryUserDirectory::new();
    let path = config.atrium_dir().join("users.yaml");

    if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        let users: Vec<User> = serde_yaml::from_str(&contents).map_err(|e| {
            atrium_core::AppError::InvalidConfiguration(format!(
                "Failed to parse {:?}: {}",
                path, e
            ))
        })?;
        for user in users {
            directory.upsert(user)?;
        }
        tracing::debug!("Loaded user directory from {:?}", path);
    } else {
        directory.add_admin("local")?;
        tracing::debug!("No users.yaml, running single-user as 'local'");
    }

    Ok(Arc::new(directory))
}

/// Assemble the assistant from configuration: SQLite index under
/// `.atrium/`, configured embedding and completion providers, HTTP
/// fetching for URL sources.
pub fn build_assistant(config: &AppConfig) -> AppResult<Assistant> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let store = Arc::new(SqliteStore::open(&config.index_path())?);
    let users = load_users(config)?;
    let embedder = create_provider(
        &config.embedding_provider,
        &config.embedding_model,
        config.embedding_dim,
        config.embedding_endpoint.as_deref(),
        timeout,
    )?;
    let completion = create_client(
        &config.completion_provider,
        config.completion_endpoint.as_deref(),
        config.api_key.as_deref(),
        timeout,
    )?;

    let conversations = Arc::new(ConversationStore::persistent(
        config.atrium_dir().join("conversations"),
    )?);

    Assistant::new(
        config.clone(),
        store,
        users,
        embedder,
        completion,
        conversations,
        Arc::new(HttpFetcher::new(timeout)?),
        Arc::new(PlainTextExtractor),
    )
}
