//! Conversation transcript: messages and the ordered store that owns them.
//!
//! The transcript is the single shared mutable resource of a session. It is
//! only ever changed through [`Transcript::append`], [`Transcript::patch`],
//! [`Transcript::clear`] and [`Transcript::restore`], so every mutation is a
//! discrete event that the session can publish to subscribers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, never-reused message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

impl Speaker {
    /// Label used in serialized conversation history.
    #[must_use]
    pub fn history_label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Agent => "Agent",
        }
    }
}

/// One conversational turn.
///
/// `id`, `speaker`, `text` and `original_language` are fixed at creation.
/// Only the enrichment fields change afterwards, via [`MessagePatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    speaker: Speaker,
    text: String,
    original_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grammar_feedback: Option<String>,
    #[serde(default)]
    pub is_translating: bool,
    #[serde(default)]
    pub is_checking_grammar: bool,
}

impl Message {
    /// Create a message with a fresh id.
    pub fn new(speaker: Speaker, text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            speaker,
            text: text.into(),
            original_language: language.into(),
            translated_text: None,
            grammar_feedback: None,
            is_translating: false,
            is_checking_grammar: false,
        }
    }

    pub fn user(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(Speaker::User, text, language)
    }

    pub fn agent(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(Speaker::Agent, text, language)
    }

    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn original_language(&self) -> &str {
        &self.original_language
    }

    /// Copy of this message with transient busy flags cleared.
    #[must_use]
    pub fn settled(&self) -> Self {
        let mut copy = self.clone();
        copy.is_translating = false;
        copy.is_checking_grammar = false;
        copy
    }

    fn apply(&mut self, patch: &MessagePatch) {
        if let Some(value) = &patch.translated_text {
            self.translated_text.clone_from(value);
        }
        if let Some(value) = &patch.grammar_feedback {
            self.grammar_feedback.clone_from(value);
        }
        if let Some(value) = patch.is_translating {
            self.is_translating = value;
        }
        if let Some(value) = patch.is_checking_grammar {
            self.is_checking_grammar = value;
        }
    }
}

/// Partial update for the mutable fields of a [`Message`].
///
/// `None` leaves a field untouched; `Some(None)` clears an optional result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grammar_feedback: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_translating: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_checking_grammar: Option<bool>,
}

impl MessagePatch {
    /// Mark a translation as started and drop stale enrichment results.
    #[must_use]
    pub fn translation_started() -> Self {
        Self {
            translated_text: Some(None),
            grammar_feedback: Some(None),
            is_translating: Some(true),
            is_checking_grammar: Some(false),
        }
    }

    #[must_use]
    pub fn translation_finished(result: Option<String>) -> Self {
        Self {
            translated_text: result.map(Some),
            is_translating: Some(false),
            ..Self::default()
        }
    }

    /// Mark a grammar check as started and drop stale enrichment results.
    #[must_use]
    pub fn grammar_check_started() -> Self {
        Self {
            translated_text: Some(None),
            grammar_feedback: Some(None),
            is_translating: Some(false),
            is_checking_grammar: Some(true),
        }
    }

    #[must_use]
    pub fn grammar_check_finished(result: Option<String>) -> Self {
        Self {
            grammar_feedback: result.map(Some),
            is_checking_grammar: Some(false),
            ..Self::default()
        }
    }
}

/// Ordered, append-only (with point updates) log of messages.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    revision: u64,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the end.
    ///
    /// Returns `false` (and leaves the transcript unchanged) if a message with
    /// the same id is already present.
    pub fn append(&mut self, message: Message) -> bool {
        if self.get(message.id()).is_some() {
            return false;
        }
        self.messages.push(message);
        self.revision += 1;
        true
    }

    /// Merge `patch` into the message with `id`.
    ///
    /// Returns the updated message, or `None` if no message has that id.
    pub fn patch(&mut self, id: MessageId, patch: &MessagePatch) -> Option<&Message> {
        let message = self.messages.iter_mut().find(|m| m.id == id)?;
        message.apply(patch);
        self.revision += 1;
        Some(message)
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.revision += 1;
    }

    /// Replace the whole transcript (used when loading a saved conversation).
    ///
    /// Messages with duplicate ids after the first occurrence are dropped.
    pub fn restore(&mut self, messages: Vec<Message>) {
        self.messages.clear();
        for message in messages {
            if self.get(message.id()).is_none() {
                self.messages.push(message.settled());
            }
        }
        self.revision += 1;
    }

    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Monotonic counter bumped by every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Serialize as collaborator conversation history.
    #[must_use]
    pub fn history(&self) -> String {
        format_history(&self.messages)
    }
}

/// One line per message, `"<User|Agent>: <text>"`, newline-joined.
#[must_use]
pub fn format_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.speaker.history_label(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn append_preserves_order_and_unique_ids() {
        let mut transcript = Transcript::new();
        for i in 0..20 {
            let speaker = if i % 2 == 0 { Speaker::User } else { Speaker::Agent };
            assert!(transcript.append(Message::new(speaker, format!("m{i}"), "French")));
        }
        let texts: Vec<&str> = transcript.messages().iter().map(Message::text).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
        assert_eq!(texts, expected);

        let mut ids: Vec<MessageId> = transcript.messages().iter().map(Message::id).collect();
        ids.sort_by_key(ToString::to_string);
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn append_rejects_duplicate_id() {
        let mut transcript = Transcript::new();
        let message = Message::user("Hola", "Spanish");
        assert!(transcript.append(message.clone()));
        assert!(!transcript.append(message));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn patch_unknown_id_is_noop() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("Hola", "Spanish"));
        let before = transcript.messages().to_vec();
        let revision = transcript.revision();

        let result = transcript.patch(MessageId::new(), &MessagePatch::translation_started());
        assert!(result.is_none());
        assert_eq!(transcript.messages(), before.as_slice());
        assert_eq!(transcript.revision(), revision);
    }

    #[test]
    fn starting_grammar_check_clears_translation() {
        let mut transcript = Transcript::new();
        let message = Message::user("Je suis allé", "French");
        let id = message.id();
        transcript.append(message);
        transcript.patch(id, &MessagePatch::translation_finished(Some("I went".into())));
        assert_eq!(
            transcript.get(id).unwrap().translated_text.as_deref(),
            Some("I went")
        );

        let patched = transcript
            .patch(id, &MessagePatch::grammar_check_started())
            .unwrap();
        assert!(patched.translated_text.is_none());
        assert!(patched.grammar_feedback.is_none());
        assert!(patched.is_checking_grammar);
        assert!(!patched.is_translating);
    }

    #[test]
    fn failed_enrichment_leaves_result_absent() {
        let mut transcript = Transcript::new();
        let message = Message::agent("Bonjour", "French");
        let id = message.id();
        transcript.append(message);
        transcript.patch(id, &MessagePatch::translation_started());
        let patched = transcript
            .patch(id, &MessagePatch::translation_finished(None))
            .unwrap();
        assert!(!patched.is_translating);
        assert!(patched.translated_text.is_none());
        assert_eq!(patched.text(), "Bonjour");
    }

    #[test]
    fn history_format_matches_wire_contract() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("Bonjour", "French"));
        transcript.append(Message::agent("Bonjour! Ça va?", "French"));
        assert_eq!(transcript.history(), "User: Bonjour\nAgent: Bonjour! Ça va?");
        assert_eq!(Transcript::new().history(), "");
    }

    #[test]
    fn clear_empties_and_bumps_revision() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("Hallo", "German"));
        let revision = transcript.revision();
        transcript.clear();
        assert!(transcript.is_empty());
        assert!(transcript.revision() > revision);
    }

    #[test]
    fn restore_settles_busy_flags_and_drops_duplicates() {
        let mut busy = Message::agent("Ciao", "Italian");
        busy.is_translating = true;
        let dup = busy.clone();

        let mut transcript = Transcript::new();
        transcript.append(Message::user("old", "Italian"));
        transcript.restore(vec![busy, dup]);

        assert_eq!(transcript.len(), 1);
        assert!(!transcript.messages()[0].is_translating);
    }

    #[test]
    fn message_json_round_trip_keeps_identity() {
        let message = Message::user("Hola", "Spanish");
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"speaker\":\"user\""));
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }
}
