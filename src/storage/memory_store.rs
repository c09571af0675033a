//! In-memory conversation store for tests and ephemeral runs.

use super::{ConversationId, ConversationStore, ConversationSummary, SavedConversation};
use crate::error::{PracticeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Conversations live in an `Arc<RwLock<HashMap>>`; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryConversationStore {
    conversations: Arc<RwLock<HashMap<ConversationId, SavedConversation>>>,
}

impl MemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn save(&self, conversation: &SavedConversation) -> Result<()> {
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<SavedConversation> {
        self.conversations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PracticeError::Storage(format!("conversation not found: {id}")))
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<ConversationSummary> = self
            .conversations
            .read()
            .await
            .values()
            .map(SavedConversation::summary)
            .collect();
        super::sort_most_recent_first(&mut summaries);
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.conversations.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::catalog::InteractionMode;
    use crate::transcript::Message;
    use chrono::{Duration, Utc};

    fn conversation(name: &str, age_minutes: i64) -> SavedConversation {
        let at = Utc::now() - Duration::minutes(age_minutes);
        SavedConversation {
            id: super::super::new_conversation_id(),
            name: name.into(),
            language: "Spanish".into(),
            scenario: "Sandbox".into(),
            interaction_mode: InteractionMode::Written,
            messages: vec![Message::user("Hola", "Spanish")],
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn save_load_list_delete() {
        let store = MemoryConversationStore::new();
        let older = conversation("older", 10);
        let newer = conversation("newer", 1);
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["newer", "older"]);

        let loaded = store.load(&older.id).await.unwrap();
        assert_eq!(loaded, older);

        store.delete(&older.id).await.unwrap();
        store.delete(&older.id).await.unwrap();
        assert!(matches!(
            store.load(&older.id).await,
            Err(PracticeError::Storage(_))
        ));
    }
}
