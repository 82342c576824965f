//! Append-only conversation log.
//!
//! Each conversation belongs to one user and serializes its appends behind
//! its own lock, so two turns finishing concurrently interleave cleanly
//! rather than corrupting the log. History reads hand out snapshots.

use crate::types::{Conversation, Turn};
use atrium_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

/// Conversation log keyed by conversation id.
///
/// Optionally spills each conversation to a JSON file so threads survive
/// process restarts.
#[derive(Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Arc<Mutex<Conversation>>>>,
    dir: Option<PathBuf>,
}

impl ConversationStore {
    /// Purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that persists each conversation as `<dir>/<id>.json`.
    pub fn persistent(dir: PathBuf) -> AppResult<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            conversations: RwLock::new(HashMap::new()),
            dir: Some(dir),
        })
    }

    fn file_for(&self, conversation_id: &str) -> Option<PathBuf> {
        // Conversation ids become file names; map anything unsafe to '_'
        self.dir.as_ref().map(|dir| {
            let safe: String = conversation_id
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect();
            dir.join(format!("{}.json", safe))
        })
    }

    /// Get or create the conversation, binding it to `user_id` on first use.
    fn open(&self, conversation_id: &str, user_id: &str) -> AppResult<Arc<Mutex<Conversation>>> {
        if let Some(conversation) = self.lookup(conversation_id)? {
            return Ok(conversation);
        }

        let mut conversations = self.write()?;
        let conversation = conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Conversation {
                    id: conversation_id.to_string(),
                    user_id: user_id.to_string(),
                    turns: Vec::new(),
                }))
            });
        Ok(Arc::clone(conversation))
    }

    /// Find a conversation in memory, falling back to its file when the
    /// store is persistent.
    fn lookup(&self, conversation_id: &str) -> AppResult<Option<Arc<Mutex<Conversation>>>> {
        {
            let conversations = self.read()?;
            if let Some(conversation) = conversations.get(conversation_id) {
                return Ok(Some(Arc::clone(conversation)));
            }
        }

        let path = match self.file_for(conversation_id) {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        };

        let contents = std::fs::read_to_string(&path)?;
        let conversation: Conversation = serde_json::from_str(&contents)?;
        let conversation = Arc::new(Mutex::new(conversation));

        let mut conversations = self.write()?;
        let entry = conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::clone(&conversation));
        Ok(Some(Arc::clone(entry)))
    }

    /// Append a completed turn. Rejects appends by a user other than the
    /// conversation's owner.
    pub fn append_turn(&self, conversation_id: &str, user_id: &str, turn: Turn) -> AppResult<()> {
        let conversation = self.open(conversation_id, user_id)?;
        let mut conversation = conversation
            .lock()
            .map_err(|_| AppError::Store("conversation lock poisoned".to_string()))?;

        if conversation.user_id != user_id {
            return Err(AppError::Store(format!(
                "conversation '{}' belongs to another user",
                conversation_id
            )));
        }

        conversation.turns.push(turn);

        if let Some(path) = self.file_for(conversation_id) {
            std::fs::write(&path, serde_json::to_string_pretty(&*conversation)?)?;
        }
        Ok(())
    }

    /// Snapshot of a conversation's turns, oldest first. Empty for unknown
    /// conversations.
    pub fn history(&self, conversation_id: &str) -> AppResult<Vec<Turn>> {
        match self.lookup(conversation_id)? {
            Some(conversation) => {
                let conversation = conversation
                    .lock()
                    .map_err(|_| AppError::Store("conversation lock poisoned".to_string()))?;
                Ok(conversation.turns.clone())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Serialize a whole conversation to pretty JSON.
    pub fn export_json(&self, conversation_id: &str) -> AppResult<String> {
        let conversation = self.lookup(conversation_id)?.ok_or_else(|| {
            AppError::Store(format!("unknown conversation '{}'", conversation_id))
        })?;

        let conversation = conversation
            .lock()
            .map_err(|_| AppError::Store("conversation lock poisoned".to_string()))?;
        Ok(serde_json::to_string_pretty(&*conversation)?)
    }

    fn read(
        &self,
    ) -> AppResult<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Mutex<Conversation>>>>> {
        self.conversations
            .read()
            .map_err(|_| AppError::Store("conversation store lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> AppResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Mutex<Conversation>>>>> {
        self.conversations
            .write()
            .map_err(|_| AppError::Store("conversation store lock poisoned".to_string()))
    }
}
