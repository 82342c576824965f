//! Grounded response generation.
//!
//! Pulls visible chunks, renders the persona's system prompt with a
//! citation-tagged context block, runs the completion with backoff, and
//! validates the citations the model emitted. Transient upstream failures
//! degrade to an apology answer; the conversation log records successful
//! turns only.

use crate::conversation::ConversationStore;
use crate::retriever::Retriever;
use crate::types::{Answer, ChunkId, ScoredChunk, Turn};
use atrium_core::AppResult;
use atrium_llm::{with_backoff, BackoffPolicy, LlmClient, LlmRequest};
use atrium_persona::{render_system_prompt, select_persona};
use chrono::Utc;
use std::sync::Arc;

/// Tuning knobs for one generator instance.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Completion model identifier
    pub model: String,

    /// Maximum completion tokens
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// How many chunks to retrieve per query
    pub top_k: usize,

    /// How many recent turns to replay into the prompt
    pub history_window: usize,

    /// Upper bound on the rendered context block, in bytes
    pub max_context_chars: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            model: "llama3-8b-8192".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            top_k: 5,
            history_window: 6,
            max_context_chars: 4000,
        }
    }
}

/// Produces grounded answers for user queries.
pub struct ResponseGenerator {
    retriever: Arc<Retriever>,
    completion: Arc<dyn LlmClient>,
    conversations: Arc<ConversationStore>,
    settings: GeneratorSettings,
    backoff: BackoffPolicy,
}

impl ResponseGenerator {
    pub fn new(
        retriever: Arc<Retriever>,
        completion: Arc<dyn LlmClient>,
        conversations: Arc<ConversationStore>,
        settings: GeneratorSettings,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            retriever,
            completion,
            conversations,
            settings,
            backoff,
        }
    }

    /// Answer a query within a conversation.
    ///
    /// On success the turn is appended to the conversation. When the
    /// embedding or completion service stays down through the retry
    /// budget, the caller gets a degraded answer and the conversation is
    /// left untouched, so the log never contains apologies.
    pub async fn generate(
        &self,
        user_id: &str,
        conversation_id: &str,
        query: &str,
    ) -> AppResult<Answer> {
        let history = self.conversations.history(conversation_id)?;
        let recent = tail(&history, self.settings.history_window);

        let past_queries: Vec<String> = recent.iter().map(|t| t.query.clone()).collect();
        let persona = select_persona(query, &past_queries);

        let chunks = match self
            .retriever
            .retrieve(user_id, query, self.settings.top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(err) if err.is_transient() => {
                tracing::warn!("Retrieval degraded for '{}': {}", user_id, err);
                return Ok(Answer::degraded(persona));
            }
            Err(err) => return Err(err),
        };

        let (context, rendered) = build_context(&chunks, self.settings.max_context_chars);
        let system = render_system_prompt(persona, &context)?;
        let prompt = build_prompt(recent, query);

        let request = LlmRequest::new(prompt, &self.settings.model)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature)
            .with_system(system);

        let response = match with_backoff(self.backoff, "completion", || {
            self.completion.complete(&request)
        })
        .await
        {
            Ok(response) => response,
            Err(err) if err.is_transient() => {
                tracing::warn!("Completion degraded for '{}': {}", user_id, err);
                return Ok(Answer::degraded(persona));
            }
            Err(err) => return Err(err),
        };

        // Markers are only valid against chunks the model actually saw;
        // chunks the context budget excluded must not be citable.
        let (text, cited_chunk_ids) = resolve_citations(&response.content, &chunks[..rendered]);

        self.conversations.append_turn(
            conversation_id,
            user_id,
            Turn {
                query: query.to_string(),
                answer: text.clone(),
                cited_chunk_ids: cited_chunk_ids.clone(),
                persona,
                timestamp: Utc::now(),
            },
        )?;

        tracing::info!(
            "Answered '{}' in conversation '{}' as {} ({} citations)",
            user_id,
            conversation_id,
            persona,
            cited_chunk_ids.len()
        );

        Ok(Answer {
            text,
            cited_chunk_ids,
            persona,
            degraded: false,
        })
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Render retrieved chunks as a citation-tagged context block.
///
/// Markers are 1-based in rank order. Chunks stop being added once the
/// budget is reached; a first chunk larger than the whole budget is
/// truncated rather than dropped. Returns the block together with the
/// number of chunks that entered it, so citation validation can be
/// restricted to what the prompt actually contained.
fn build_context(chunks: &[ScoredChunk], max_chars: usize) -> (String, usize) {
    let mut context = String::new();
    let mut rendered = 0;

    for (i, scored) in chunks.iter().enumerate() {
        let segment = format!("[S{}] {}", i + 1, scored.chunk.text.trim());

        if context.is_empty() {
            if segment.len() > max_chars {
                let mut cut = max_chars;
                while cut > 0 && !segment.is_char_boundary(cut) {
                    cut -= 1;
                }
                context.push_str(&segment[..cut]);
                rendered = 1;
                break;
            }
            context.push_str(&segment);
        } else {
            if context.len() + 2 + segment.len() > max_chars {
                break;
            }
            context.push_str("\n\n");
            context.push_str(&segment);
        }
        rendered = i + 1;
    }

    (context, rendered)
}

/// Build the user-facing part of the prompt: recent turns plus the query.
fn build_prompt(recent: &[Turn], query: &str) -> String {
    let mut prompt = String::new();

    if !recent.is_empty() {
        prompt.push_str("Previous conversation:\n");
        for turn in recent {
            prompt.push_str("User: ");
            prompt.push_str(&turn.query);
            prompt.push('\n');
            prompt.push_str("Assistant: ");
            prompt.push_str(&turn.answer);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("Question:\n");
    prompt.push_str(query);
    prompt
}

/// Validate `[S<n>]` markers against the retrieved chunks.
///
/// Valid markers map to the cited chunk ids in first-mention order;
/// markers pointing outside the retrieved set are stripped from the text
/// so the user never sees a dangling citation.
fn resolve_citations(text: &str, chunks: &[ScoredChunk]) -> (String, Vec<ChunkId>) {
    let mut output = String::with_capacity(text.len());
    let mut cited: Vec<ChunkId> = Vec::new();

    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if let Some((n, end)) = parse_marker(bytes, i) {
            if n >= 1 && n <= chunks.len() {
                let id = &chunks[n - 1].chunk.id;
                if !cited.iter().any(|c| c == id) {
                    cited.push(id.clone());
                }
                output.push_str(&text[i..end]);
            }
            // Invalid markers are dropped
            i = end;
        } else {
            let ch = text[i..].chars().next().expect("in-bounds index");
            output.push(ch);
            i += ch.len_utf8();
        }
    }

    (output, cited)
}

/// Try to parse `[S<digits>]` at byte offset `at`. Returns the marker
/// number and the offset just past the closing bracket.
fn parse_marker(bytes: &[u8], at: usize) -> Option<(usize, usize)> {
    if bytes.get(at) != Some(&b'[') || bytes.get(at + 1) != Some(&b'S') {
        return None;
    }

    let mut i = at + 2;
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start || bytes.get(i) != Some(&b']') {
        return None;
    }

    let n = std::str::from_utf8(&bytes[digits_start..i])
        .ok()?
        .parse()
        .ok()?;
    Some((n, i + 1))
}
