//! Saved conversations: snapshot, list, restore and delete.
//!
//! Every operation is rejected while a configuration change awaits
//! confirmation.

use super::{ActiveConversation, PracticeSession};
use crate::error::{PracticeError, Result};
use crate::runtime::RuntimeEvent;
use crate::storage::{
    ConversationStore, ConversationSummary, SavedConversation, new_conversation_id,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

impl PracticeSession {
    fn conversation_store(&self) -> Result<&Arc<dyn ConversationStore>> {
        self.inner
            .store
            .as_ref()
            .ok_or_else(|| PracticeError::UnsupportedCapability("conversation storage".into()))
    }

    /// Save the current conversation, creating it on first save.
    ///
    /// `name` defaults to the existing name, or `"<scenario> (<language>)"`.
    pub async fn save_conversation(&self, name: Option<&str>) -> Result<ConversationSummary> {
        self.ensure_no_pending_change()?;
        let store = self.conversation_store()?.clone();
        let (conversation, generation) = {
            let state = self.lock();
            let config = state.config.resolve()?;
            if state.transcript.is_empty() {
                return Err(PracticeError::EmptyInput);
            }
            let now = Utc::now();
            let (id, existing_name, created_at) = match &state.active_conversation {
                Some(active) => (active.id.clone(), Some(active.name.clone()), active.created_at),
                None => (new_conversation_id(), None, now),
            };
            let name = name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_owned)
                .or(existing_name)
                .unwrap_or_else(|| format!("{} ({})", config.scenario, config.language));
            let conversation = SavedConversation {
                id,
                name,
                language: config.language,
                scenario: config.scenario,
                interaction_mode: config.mode,
                messages: state
                    .transcript
                    .messages()
                    .iter()
                    .map(crate::transcript::Message::settled)
                    .collect(),
                created_at,
                updated_at: now,
            };
            (conversation, state.generation)
        };

        store.save(&conversation).await?;
        info!(id = %conversation.id, messages = conversation.messages.len(), "conversation saved");

        let mut state = self.lock();
        if state.generation == generation {
            state.active_conversation = Some(ActiveConversation {
                id: conversation.id.clone(),
                name: conversation.name.clone(),
                created_at: conversation.created_at,
            });
        }
        Ok(conversation.summary())
    }

    /// Saved conversations, most recently updated first.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.ensure_no_pending_change()?;
        self.conversation_store()?.list().await
    }

    /// Replace the configuration and transcript with a saved conversation.
    pub async fn load_conversation(&self, id: &str) -> Result<SavedConversation> {
        self.ensure_no_pending_change()?;
        let conversation = self.conversation_store()?.load(id).await?;

        self.cancel_speech();
        let (config, language_changed, message_ids) = {
            let mut state = self.lock();
            if state.pending_change.is_some() {
                return Err(PracticeError::ConfirmationPending);
            }
            let language_changed =
                state.config.language.as_deref() != Some(conversation.language.as_str());
            state.config.language = Some(conversation.language.clone());
            state.config.scenario = Some(conversation.scenario.clone());
            state.config.interaction_mode = Some(conversation.interaction_mode);
            state.transcript.restore(conversation.messages.clone());
            state.generation += 1;
            state.active_conversation = Some(ActiveConversation {
                id: conversation.id.clone(),
                name: conversation.name.clone(),
                created_at: conversation.created_at,
            });
            let ids = state.transcript.messages().iter().map(|m| m.id()).collect();
            (state.config.clone(), language_changed, ids)
        };
        if language_changed {
            self.select_voice(None);
        }
        info!(id = %conversation.id, "conversation loaded");
        self.publish(RuntimeEvent::TranscriptRestored { message_ids });
        self.publish(RuntimeEvent::ConfigurationApplied(config));
        Ok(conversation)
    }

    /// Start a fresh conversation with the current configuration.
    pub fn new_conversation(&self) -> Result<()> {
        self.ensure_no_pending_change()?;
        self.cancel_speech();
        {
            let mut state = self.lock();
            state.reset_transcript();
            state.active_conversation = None;
        }
        info!("new conversation started");
        self.publish(RuntimeEvent::TranscriptCleared);
        Ok(())
    }

    /// Delete a saved conversation. The live transcript is left alone.
    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.ensure_no_pending_change()?;
        self.conversation_store()?.delete(id).await?;
        let mut state = self.lock();
        if state
            .active_conversation
            .as_ref()
            .is_some_and(|active| active.id == id)
        {
            state.active_conversation = None;
        }
        info!(id = %id, "conversation deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::super::test_support::*;
    use super::super::ConfigChange;
    use super::*;
    use crate::transcript::Message;

    async fn chat(h: &Harness) {
        h.services.push_agent_reply("Salut");
        h.session.submit_user_turn("Bonjour").await.unwrap();
    }

    #[tokio::test]
    async fn save_then_update_keeps_id_and_name() {
        let h = Harness::new(french_written());
        chat(&h).await;
        let first = h.session.save_conversation(Some("Café")).await.unwrap();
        assert_eq!(first.name, "Café");
        assert_eq!(
            h.session.status().active_conversation_id.as_deref(),
            Some(first.id.as_str())
        );

        h.services.push_agent_reply("Oui");
        h.session.submit_user_turn("Encore").await.unwrap();
        let second = h.session.save_conversation(None).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Café");
        assert_eq!(second.message_count, 4);
        assert_eq!(h.session.list_conversations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn default_name_uses_scenario_and_language() {
        let h = Harness::new(french_written());
        chat(&h).await;
        let summary = h.session.save_conversation(Some("  ")).await.unwrap();
        assert_eq!(summary.name, "Meeting a stranger (French)");
    }

    #[tokio::test]
    async fn load_replaces_config_and_transcript() {
        let h = Harness::new(french_written());
        chat(&h).await;
        let saved = h.session.save_conversation(None).await.unwrap();

        h.session
            .request_change(ConfigChange::Language("German".into()))
            .unwrap();
        h.session.confirm_change();
        h.session.select_voice(Some("v-de".into()));
        assert!(h.session.transcript().is_empty());

        let loaded = h.session.load_conversation(&saved.id).await.unwrap();
        assert_eq!(loaded.messages.len(), 2);
        let status = h.session.status();
        assert_eq!(status.config.language.as_deref(), Some("French"));
        assert_eq!(status.message_count, 2);
        assert_eq!(status.selected_voice, None);
        assert_eq!(status.active_conversation_id.as_deref(), Some(saved.id.as_str()));
    }

    #[tokio::test]
    async fn busy_flags_are_not_persisted() {
        let h = Harness::new(french_written());
        let message = Message::user("Bonjour", "French");
        let id = message.id();
        h.session.append_message(message, None);
        h.session
            .patch_message(id, &crate::transcript::MessagePatch::translation_started());
        let summary = h.session.save_conversation(None).await.unwrap();
        let loaded = h.session.load_conversation(&summary.id).await.unwrap();
        assert!(!loaded.messages[0].is_translating);
    }

    #[tokio::test]
    async fn rejected_while_confirmation_pending() {
        let h = Harness::new(french_written());
        chat(&h).await;
        h.session
            .request_change(ConfigChange::Scenario("Sandbox".into()))
            .unwrap();
        assert!(matches!(
            h.session.save_conversation(None).await,
            Err(PracticeError::ConfirmationPending)
        ));
        assert!(matches!(
            h.session.new_conversation(),
            Err(PracticeError::ConfirmationPending)
        ));
        assert!(matches!(
            h.session.list_conversations().await,
            Err(PracticeError::ConfirmationPending)
        ));
        assert_eq!(h.session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn deleting_active_conversation_forgets_it() {
        let h = Harness::new(french_written());
        chat(&h).await;
        let saved = h.session.save_conversation(None).await.unwrap();
        h.session.delete_conversation(&saved.id).await.unwrap();
        assert!(h.session.status().active_conversation_id.is_none());
        assert_eq!(h.session.transcript().len(), 2);
        assert!(h.session.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_conversation_clears_transcript() {
        let h = Harness::new(french_written());
        chat(&h).await;
        h.session.new_conversation().unwrap();
        assert!(h.session.transcript().is_empty());
        assert!(h.session.status().active_conversation_id.is_none());
    }
}
