//! Saved-conversation persistence.
//!
//! A [`SavedConversation`] is a snapshot of a session's configuration and
//! transcript under a user-chosen name. Stores are async so filesystem and
//! in-memory backends share one interface.

pub mod fs_store;
pub mod memory_store;

pub use fs_store::FsConversationStore;
pub use memory_store::MemoryConversationStore;

use crate::catalog::InteractionMode;
use crate::error::Result;
use crate::transcript::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a saved conversation (a UUID v4 string).
pub type ConversationId = String;

/// Generate a fresh conversation identifier.
#[must_use]
pub fn new_conversation_id() -> ConversationId {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedConversation {
    pub id: ConversationId,
    pub name: String,
    pub language: String,
    pub scenario: String,
    pub interaction_mode: InteractionMode,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedConversation {
    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            language: self.language.clone(),
            scenario: self.scenario.clone(),
            message_count: self.messages.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry for a saved conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub name: String,
    pub language: String,
    pub scenario: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Async storage backend for saved conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create or overwrite a conversation.
    async fn save(&self, conversation: &SavedConversation) -> Result<()>;

    /// Load a conversation by id. Fails with `Storage` if it does not exist.
    async fn load(&self, id: &str) -> Result<SavedConversation>;

    /// Summaries of every stored conversation, most recently updated first.
    async fn list(&self) -> Result<Vec<ConversationSummary>>;

    /// Delete a conversation. Returns `Ok(())` even if it did not exist.
    async fn delete(&self, id: &str) -> Result<()>;
}

fn sort_most_recent_first(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
