//! End-to-end pipeline tests over the `Assistant` facade.

use crate::access::InMemoryUserDirectory;
use crate::assistant::Assistant;
use crate::embeddings::{CountingProvider, EmbeddingProvider, TrigramProvider};
use crate::ingest::{FileFetcher, PlainTextExtractor};
use crate::store::{MemoryStore, SqliteStore, VectorStore};
use crate::types::{IngestRequest, IngestSource};
use atrium_core::{AppConfig, AppError, AppResult};
use atrium_llm::providers::MockClient;
use atrium_llm::LlmClient;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Fetcher serving canned responses, so URL ingestion needs no network.
struct StaticFetcher {
    pages: HashMap<String, (Vec<u8>, String)>,
}

impl StaticFetcher {
    fn new(pages: &[(&str, &str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body, mime)| {
                    (url.to_string(), (body.as_bytes().to_vec(), mime.to_string()))
                })
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl FileFetcher for StaticFetcher {
    async fn fetch(&self, reference: &str) -> AppResult<(Vec<u8>, String)> {
        self.pages
            .get(reference)
            .cloned()
            .ok_or_else(|| AppError::Fetch(format!("no such page '{}'", reference)))
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        completion_provider: "mock".to_string(),
        chunk_size: 128,
        chunk_overlap: 16,
        max_retries: 1,
        ..AppConfig::default()
    }
}

struct Harness {
    assistant: Assistant,
    users: Arc<InMemoryUserDirectory>,
    embedder: Arc<CountingProvider>,
}

fn harness_with(
    store: Arc<dyn VectorStore>,
    completion: Arc<dyn LlmClient>,
    fetcher: Arc<dyn FileFetcher>,
) -> Harness {
    let users = Arc::new(InMemoryUserDirectory::new());
    let embedder = Arc::new(CountingProvider::new(Arc::new(TrigramProvider::new(128))));

    let assistant = Assistant::new(
        test_config(),
        store,
        Arc::clone(&users) as Arc<dyn crate::access::UserStore>,
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        completion,
        Arc::new(crate::conversation::ConversationStore::new()),
        fetcher,
        Arc::new(PlainTextExtractor),
    )
    .unwrap();

    Harness {
        assistant,
        users,
        embedder,
    }
}

fn harness() -> Harness {
    harness_with(
        Arc::new(MemoryStore::new()),
        Arc::new(MockClient::new()),
        Arc::new(StaticFetcher::new(&[])),
    )
}

fn text_request(id: &str, owner: &str, text: &str, permissions: &[&str]) -> IngestRequest {
    IngestRequest {
        document_id: Some(id.to_string()),
        title: format!("Title of {}", id),
        source: IngestSource::Text(text.to_string()),
        owner: owner.to_string(),
        permissions: permissions.iter().map(|s| s.to_string()).collect(),
    }
}

const NETWORK_DOC: &str = "The branch office routers are rebooted every Sunday night.\n\n\
     When the uplink fails, traffic moves to the backup LTE modem \
     automatically. Check the modem status page before escalating.\n\n\
     Firmware upgrades are staged through the controller.";

const PRICING_DOC: &str = "The starter plan costs 29 euros per month and includes \
     installation.\n\nThe business package adds a static address and priority \
     support for 59 euros.";

const BILLING_DOC: &str = "Invoices are issued on the first of the month.\n\nA late \
     fee applies to any payment more than 14 days overdue. Refunds are \
     processed within 5 business days.";

#[tokio::test]
async fn test_ingest_retrieve_respects_permissions() {
    let h = harness();
    h.users.add_standard("alice").unwrap();
    h.users.add_standard("bob").unwrap();

    h.assistant
        .ingest(text_request("network", "admin", NETWORK_DOC, &["alice"]))
        .await
        .unwrap();
    h.assistant
        .ingest(text_request("pricing", "admin", PRICING_DOC, &["bob"]))
        .await
        .unwrap();
    h.assistant
        .ingest(text_request("billing", "admin", BILLING_DOC, &["alice", "bob"]))
        .await
        .unwrap();

    // Alice asks about pricing, which she cannot see: even a perfect
    // semantic match outside her grants must not leak
    let results = h
        .assistant
        .retrieve("alice", "starter plan costs euros per month", 10)
        .await
        .unwrap();
    assert!(results
        .iter()
        .all(|r| r.chunk.document_id != "pricing"));

    // Bob sees pricing
    let results = h
        .assistant
        .retrieve("bob", "starter plan costs euros per month", 10)
        .await
        .unwrap();
    assert!(results.iter().any(|r| r.chunk.document_id == "pricing"));

    // Both see billing
    for user in ["alice", "bob"] {
        let results = h
            .assistant
            .retrieve(user, "invoice late fee overdue", 10)
            .await
            .unwrap();
        assert!(results.iter().any(|r| r.chunk.document_id == "billing"));
    }
}

#[tokio::test]
async fn test_single_document_lifecycle_across_users() {
    let h = harness();
    h.users.add_standard("alice").unwrap();
    h.users.add_standard("bob").unwrap();

    h.assistant
        .ingest(text_request("network", "admin", NETWORK_DOC, &["alice"]))
        .await
        .unwrap();

    // A query lifted from the middle paragraph with k=1 returns the one
    // chunk covering that paragraph
    let results = h
        .assistant
        .retrieve("alice", "traffic moves to the backup LTE modem", 1)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.document_id, "network");
    assert!(results[0].chunk.text.contains("backup LTE modem"));

    // Same query as an ungranted user yields nothing
    assert!(h
        .assistant
        .retrieve("bob", "traffic moves to the backup LTE modem", 1)
        .await
        .unwrap()
        .is_empty());

    // After deletion the granted user gets nothing either
    h.assistant.delete_document("network").unwrap();
    assert!(h
        .assistant
        .retrieve("alice", "traffic moves to the backup LTE modem", 1)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_no_grants_short_circuits_before_embedding() {
    let h = harness();
    h.users.add_standard("alice").unwrap();
    h.users.add_standard("mallory").unwrap();

    h.assistant
        .ingest(text_request("network", "admin", NETWORK_DOC, &["alice"]))
        .await
        .unwrap();
    let calls_after_ingest = h.embedder.call_count();

    let results = h
        .assistant
        .retrieve("mallory", "backup LTE modem", 10)
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(h.embedder.call_count(), calls_after_ingest);
}

#[tokio::test]
async fn test_reingest_replaces_instead_of_duplicating() {
    let h = harness();
    h.users.add_admin("root").unwrap();

    let first = h
        .assistant
        .ingest(text_request("doc", "root", NETWORK_DOC, &[]))
        .await
        .unwrap();
    let second = h
        .assistant
        .ingest(text_request("doc", "root", "Short replacement text.", &[]))
        .await
        .unwrap();

    assert_eq!(first.document_id, second.document_id);
    assert_eq!(second.chunk_count, 1);

    let stats = h.assistant.stats().unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, 1);

    let results = h.assistant.retrieve("root", "replacement", 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].chunk.text.contains("replacement"));
}

#[tokio::test]
async fn test_delete_removes_from_retrieval_and_is_idempotent() {
    let h = harness();
    h.users.add_standard("alice").unwrap();

    h.assistant
        .ingest(text_request("network", "admin", NETWORK_DOC, &["alice"]))
        .await
        .unwrap();
    assert!(!h
        .assistant
        .retrieve("alice", "backup LTE modem", 10)
        .await
        .unwrap()
        .is_empty());

    h.assistant.delete_document("network").unwrap();
    h.assistant.delete_document("network").unwrap();

    assert!(h
        .assistant
        .retrieve("alice", "backup LTE modem", 10)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(h.assistant.stats().unwrap().documents, 0);
}

#[tokio::test]
async fn test_grant_and_revoke_change_visibility() {
    let h = harness();
    h.users.add_standard("carol").unwrap();

    h.assistant
        .ingest(text_request("pricing", "admin", PRICING_DOC, &[]))
        .await
        .unwrap();

    assert!(h
        .assistant
        .retrieve("carol", "starter plan", 10)
        .await
        .unwrap()
        .is_empty());

    h.assistant.grant("pricing", "carol").unwrap();
    assert!(!h
        .assistant
        .retrieve("carol", "starter plan", 10)
        .await
        .unwrap()
        .is_empty());

    h.assistant.revoke("pricing", "carol").unwrap();
    assert!(h
        .assistant
        .retrieve("carol", "starter plan", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_owner_always_sees_own_document() {
    let h = harness();
    h.users.add_standard("dave").unwrap();

    h.assistant
        .ingest(text_request("notes", "dave", "Dave's private notes on modem setup.", &[]))
        .await
        .unwrap();

    let results = h.assistant.retrieve("dave", "modem setup", 10).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_url_ingestion_uses_url_as_document_id() {
    let fetcher = StaticFetcher::new(&[(
        "https://intranet/faq",
        "Reset your password from the account settings page.",
        "text/plain; charset=utf-8",
    )]);
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        Arc::new(MockClient::new()),
        Arc::new(fetcher),
    );
    h.users.add_admin("root").unwrap();

    let receipt = h
        .assistant
        .ingest(IngestRequest {
            document_id: None,
            title: "FAQ".to_string(),
            source: IngestSource::Url("https://intranet/faq".to_string()),
            owner: "root".to_string(),
            permissions: vec![],
        })
        .await
        .unwrap();

    assert_eq!(receipt.document_id, "https://intranet/faq");
    assert_eq!(receipt.chunk_count, 1);

    let meta = h
        .assistant
        .list_documents()
        .unwrap()
        .into_iter()
        .find(|d| d.id == "https://intranet/faq")
        .unwrap();
    assert_eq!(meta.source, crate::types::SourceType::Url);
}

#[tokio::test]
async fn test_unsupported_format_fails_without_state_change() {
    let h = harness();
    h.users.add_admin("root").unwrap();

    let err = h
        .assistant
        .ingest(IngestRequest {
            document_id: Some("report".to_string()),
            title: "Report".to_string(),
            source: IngestSource::Bytes {
                data: b"%PDF-1.7 binary".to_vec(),
                mime: "application/pdf".to_string(),
            },
            owner: "root".to_string(),
            permissions: vec![],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UnsupportedFormat(_)));
    assert_eq!(h.assistant.stats().unwrap().documents, 0);
}

#[tokio::test]
async fn test_empty_document_is_rejected() {
    let h = harness();
    h.users.add_admin("root").unwrap();

    let err = h
        .assistant
        .ingest(text_request("blank", "root", "", &[]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidConfiguration(_)));
    assert_eq!(h.assistant.stats().unwrap().documents, 0);
}

#[tokio::test]
async fn test_generate_records_history_and_exports() {
    let completion: Arc<dyn LlmClient> = Arc::new(MockClient::always(
        "Traffic fails over to the backup LTE modem [S1].",
    ));
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        completion,
        Arc::new(StaticFetcher::new(&[])),
    );
    h.users.add_standard("alice").unwrap();

    h.assistant
        .ingest(text_request("network", "admin", NETWORK_DOC, &["alice"]))
        .await
        .unwrap();

    let answer = h
        .assistant
        .generate("alice", "conv-1", "what happens when the uplink fails?")
        .await
        .unwrap();

    assert!(!answer.degraded);
    assert_eq!(answer.cited_chunk_ids.len(), 1);
    assert!(answer.cited_chunk_ids[0].starts_with("network#"));

    let history = h.assistant.history("conv-1").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "what happens when the uplink fails?");

    let json = h.assistant.export_conversation("conv-1").unwrap();
    assert!(json.contains("conv-1"));
    assert!(json.contains("backup LTE modem"));
}

#[tokio::test]
async fn test_degraded_generation_leaves_history_clean() {
    let completion: Arc<dyn LlmClient> = Arc::new(MockClient::always_timeout());
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        completion,
        Arc::new(StaticFetcher::new(&[])),
    );
    h.users.add_standard("alice").unwrap();

    h.assistant
        .ingest(text_request("network", "admin", NETWORK_DOC, &["alice"]))
        .await
        .unwrap();

    let answer = h
        .assistant
        .generate("alice", "conv-1", "what happens when the uplink fails?")
        .await
        .unwrap();

    assert!(answer.degraded);
    assert!(answer.text.contains("temporarily unavailable"));
    assert!(h.assistant.history("conv-1").unwrap().is_empty());
}

#[tokio::test]
async fn test_full_pipeline_on_sqlite() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&temp.path().join("index.db")).unwrap());
    let h = harness_with(
        store,
        Arc::new(MockClient::always("Invoices go out on the first [S1].")),
        Arc::new(StaticFetcher::new(&[])),
    );
    h.users.add_standard("alice").unwrap();
    h.users.add_admin("root").unwrap();

    h.assistant
        .ingest(text_request("billing", "admin", BILLING_DOC, &["alice"]))
        .await
        .unwrap();
    h.assistant
        .ingest(text_request("network", "admin", NETWORK_DOC, &[]))
        .await
        .unwrap();

    // Standard user is confined to their grant
    let results = h
        .assistant
        .retrieve("alice", "backup LTE modem uplink", 10)
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.chunk.document_id == "billing"));

    // Admin spans both documents
    let results = h
        .assistant
        .retrieve("root", "invoices modem", 10)
        .await
        .unwrap();
    let docs: std::collections::HashSet<_> =
        results.iter().map(|r| r.chunk.document_id.as_str()).collect();
    assert!(docs.contains("billing"));
    assert!(docs.contains("network"));

    let answer = h
        .assistant
        .generate("alice", "c1", "when are invoices issued?")
        .await
        .unwrap();
    assert!(!answer.degraded);
    assert_eq!(answer.cited_chunk_ids.len(), 1);
}
