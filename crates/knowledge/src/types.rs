//! Pipeline type definitions.

use atrium_persona::AgentPersona;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique document identifier.
pub type DocumentId = String;

/// Unique chunk identifier.
pub type ChunkId = String;

/// Where a document's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Url,
    Drive,
    Upload,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Url => "url",
            SourceType::Drive => "drive",
            SourceType::Upload => "upload",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "url" => Some(SourceType::Url),
            "drive" => Some(SourceType::Drive),
            "upload" => Some(SourceType::Upload),
            _ => None,
        }
    }
}

/// An ingested document.
///
/// The text is immutable once stored; re-ingestion under the same id
/// replaces the document's chunks atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier
    pub id: DocumentId,

    /// Human-readable title
    pub title: String,

    /// Source type
    pub source: SourceType,

    /// Extracted raw text
    pub text: String,

    /// Identity of the uploading user
    pub owner: String,

    /// When this document was ingested
    pub ingested_at: DateTime<Utc>,

    /// User-or-role identifiers permitted to see this document
    pub permissions: Vec<String>,
}

/// A text chunk derived from a document.
///
/// Owned by exactly one document; deleting the document cascades to its
/// chunks. The chunk id is deterministic so upserts are idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier (`{document_id}#{seq:04}`)
    pub id: ChunkId,

    /// Parent document id
    pub document_id: DocumentId,

    /// Sequence index within the document
    pub seq: u32,

    /// Text content (includes the leading overlap for chunks after the first)
    pub text: String,

    /// Byte offset of the chunk start in the document text
    pub start_offset: usize,

    /// Byte offset one past the chunk end
    pub end_offset: usize,

    /// Embedding vector (normalized)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Identifier of the model that produced the embedding
    pub embedding_model: String,
}

impl Chunk {
    /// Deterministic chunk id for a document position.
    pub fn make_id(document_id: &str, seq: u32) -> ChunkId {
        format!("{}#{:04}", document_id, seq)
    }
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Standard,
}

/// A user identity as seen by the access filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub id: String,

    /// Role (admins see every document)
    pub role: Role,

    /// Directly-granted document identifiers
    pub grants: Vec<DocumentId>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// One query/answer exchange within a conversation. Never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// The user's query
    pub query: String,

    /// The generated answer text
    pub answer: String,

    /// Chunks actually cited by the answer
    pub cited_chunk_ids: Vec<ChunkId>,

    /// Persona that served this turn
    pub persona: AgentPersona,

    /// When the turn completed
    pub timestamp: DateTime<Utc>,
}

/// An append-only conversation belonging to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Ordered turns, oldest first
    pub turns: Vec<Turn>,
}

/// The result of a generate call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text (invalid citation markers already stripped)
    pub text: String,

    /// Chunk ids the answer cites, in first-mention order
    pub cited_chunk_ids: Vec<ChunkId>,

    /// Persona that produced the answer
    pub persona: AgentPersona,

    /// Whether this is a degraded-service fallback rather than a grounded
    /// answer
    pub degraded: bool,
}

impl Answer {
    /// Fallback answer for transient external-service failures.
    ///
    /// Carries a user-facing apology instead of raw error detail.
    pub fn degraded(persona: AgentPersona) -> Self {
        Self {
            text: "Sorry, the assistant is temporarily unavailable. \
                   Please try again in a few minutes."
                .to_string(),
            cited_chunk_ids: Vec::new(),
            persona,
            degraded: true,
        }
    }
}

/// Document metadata as reported by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub title: String,
    pub source: SourceType,
    pub owner: String,
    pub ingested_at: DateTime<Utc>,
    pub permissions: Vec<String>,
    pub chunk_count: u32,
}

/// Source payload for an ingestion request.
#[derive(Debug, Clone)]
pub enum IngestSource {
    /// Fetch bytes from a URL, then extract text
    Url(String),

    /// Raw bytes with a MIME type, e.g. an upload or drive download
    Bytes { data: Vec<u8>, mime: String },

    /// Pre-extracted text
    Text(String),
}

/// A request to ingest one document.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Document id; generated when absent. Supplying the id of an existing
    /// document replaces its chunks atomically.
    pub document_id: Option<DocumentId>,

    /// Human-readable title
    pub title: String,

    /// Where the content comes from
    pub source: IngestSource,

    /// Uploading user identity
    pub owner: String,

    /// Initial permission set (the owner is always included)
    pub permissions: Vec<String>,
}

/// Receipt for a completed ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub document_id: DocumentId,
    pub chunk_count: u32,
    pub byte_count: u64,
}

/// Vector store statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub documents: u32,
    pub chunks: u32,
}
