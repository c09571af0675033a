//! Per-message enrichment: translation into the pivot language and grammar
//! feedback on user messages.
//!
//! Each operation only ever patches its own message, so any number can be in
//! flight at once.

use super::PracticeSession;
use crate::runtime::Notification;
use crate::services::{GrammarRequest, TranslationRequest};
use crate::transcript::{MessageId, MessagePatch, Speaker};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// The result was stored on the message.
    Applied(String),
    /// The service failed or returned nothing; the user was notified.
    Failed,
    /// Nothing to do (unknown message, pivot-language source, agent text).
    Skipped,
}

#[derive(Debug, Clone, Copy)]
enum EnrichmentKind {
    Translation,
    Grammar,
}

impl EnrichmentKind {
    fn started(self) -> MessagePatch {
        match self {
            Self::Translation => MessagePatch::translation_started(),
            Self::Grammar => MessagePatch::grammar_check_started(),
        }
    }

    fn finished(self, result: Option<String>) -> MessagePatch {
        match self {
            Self::Translation => MessagePatch::translation_finished(result),
            Self::Grammar => MessagePatch::grammar_check_finished(result),
        }
    }

    fn failure_notification(self) -> Notification {
        match self {
            Self::Translation => Notification::error(
                "Translation Error",
                "Failed to translate the message. Please try again.",
            ),
            Self::Grammar => Notification::error(
                "Grammar Check Error",
                "Failed to check grammar for the message. Please try again.",
            ),
        }
    }
}

/// Clears the message's busy flag if the operation is dropped mid-flight.
struct InFlight<'a> {
    session: &'a PracticeSession,
    id: MessageId,
    kind: EnrichmentKind,
    settled: bool,
}

impl InFlight<'_> {
    fn finish(mut self, result: Option<String>) {
        self.settled = true;
        self.session
            .patch_message(self.id, &self.kind.finished(result));
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.session.patch_message(self.id, &self.kind.finished(None));
        }
    }
}

impl PracticeSession {
    /// Translate `text` from `source_language` into the pivot language and
    /// store it on message `id`.
    pub async fn translate(
        &self,
        id: MessageId,
        text: &str,
        source_language: &str,
    ) -> EnrichmentOutcome {
        let target = self.inner.pivot_language.clone();
        if source_language.eq_ignore_ascii_case(&target) {
            debug!(message = %id, "source is the pivot language; not translating");
            return EnrichmentOutcome::Skipped;
        }
        let Some(in_flight) = self.start_enrichment(id, EnrichmentKind::Translation) else {
            return EnrichmentOutcome::Skipped;
        };
        info!(message = %id, from = %source_language, to = %target, "translating message");

        let request = TranslationRequest {
            text_to_translate: text.to_owned(),
            source_language: source_language.to_owned(),
            target_language: target,
        };
        let result = match self.inner.services.translation.translate(&request).await {
            Ok(reply) if !reply.translated_text.trim().is_empty() => {
                Some(reply.translated_text.trim().to_owned())
            }
            Ok(_) => {
                warn!(message = %id, "translation service returned no text");
                None
            }
            Err(e) => {
                error!(message = %id, error = %e, "translation failed");
                None
            }
        };
        self.finish_enrichment(in_flight, result)
    }

    /// Check the grammar of user message `id`, written in `language`.
    pub async fn check_grammar(&self, id: MessageId, text: &str, language: &str) -> EnrichmentOutcome {
        if self
            .message(id)
            .is_some_and(|m| m.speaker() == Speaker::Agent)
        {
            debug!(message = %id, "grammar checks only apply to user messages");
            return EnrichmentOutcome::Skipped;
        }
        let Some(in_flight) = self.start_enrichment(id, EnrichmentKind::Grammar) else {
            return EnrichmentOutcome::Skipped;
        };
        info!(message = %id, language = %language, "checking grammar");

        let request = GrammarRequest {
            text_to_check: text.to_owned(),
            language: language.to_owned(),
        };
        let result = match self.inner.services.grammar.check_grammar(&request).await {
            Ok(reply) if !reply.feedback.trim().is_empty() => Some(reply.feedback.trim().to_owned()),
            Ok(_) => {
                warn!(message = %id, "grammar service returned no feedback");
                None
            }
            Err(e) => {
                error!(message = %id, error = %e, "grammar check failed");
                None
            }
        };
        self.finish_enrichment(in_flight, result)
    }

    /// Translate a transcript message using its own text and language.
    pub async fn translate_message(&self, id: MessageId) -> EnrichmentOutcome {
        match self.message(id) {
            Some(m) => self.translate(id, m.text(), m.original_language()).await,
            None => EnrichmentOutcome::Skipped,
        }
    }

    /// Grammar-check a transcript message using its own text and language.
    pub async fn check_message_grammar(&self, id: MessageId) -> EnrichmentOutcome {
        match self.message(id) {
            Some(m) => self.check_grammar(id, m.text(), m.original_language()).await,
            None => EnrichmentOutcome::Skipped,
        }
    }

    fn start_enrichment(&self, id: MessageId, kind: EnrichmentKind) -> Option<InFlight<'_>> {
        if self.patch_message(id, &kind.started()).is_none() {
            debug!(message = %id, "message not in transcript; skipping enrichment");
            return None;
        }
        Some(InFlight {
            session: self,
            id,
            kind,
            settled: false,
        })
    }

    fn finish_enrichment(&self, in_flight: InFlight<'_>, result: Option<String>) -> EnrichmentOutcome {
        let kind = in_flight.kind;
        in_flight.finish(result.clone());
        match result {
            Some(text) => EnrichmentOutcome::Applied(text),
            None => {
                self.notify(kind.failure_notification());
                EnrichmentOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::super::test_support::*;
    use super::*;
    use crate::runtime::RuntimeEvent;
    use crate::services::{ServiceError, TranslationReply};
    use crate::transcript::Message;

    fn seed(h: &Harness, message: Message) -> MessageId {
        let id = message.id();
        h.session.append_message(message, None);
        id
    }

    #[tokio::test]
    async fn translation_sets_flag_then_result() {
        let mut h = Harness::new(french_written());
        let id = seed(&h, Message::agent("¿Cómo estás?", "Spanish"));
        h.services.push_translation("How are you?");

        let outcome = h.session.translate(id, "¿Cómo estás?", "Spanish").await;
        assert_eq!(outcome, EnrichmentOutcome::Applied("How are you?".into()));

        let updates: Vec<Message> = h
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::MessageUpdated(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 2);
        assert!(updates[0].is_translating);
        assert!(!updates[1].is_translating);
        assert_eq!(updates[1].translated_text.as_deref(), Some("How are you?"));

        let request = &h.services.translation.requests()[0];
        assert_eq!(request.target_language, "English");
        assert_eq!(request.source_language, "Spanish");
    }

    #[tokio::test]
    async fn grammar_check_clears_previous_translation_before_resolving() {
        let h = Harness::new(french_written());
        let id = seed(&h, Message::user("Je suis allé", "French"));
        h.services.push_translation("I went");
        h.session.translate_message(id).await;
        assert!(h.session.message(id).unwrap().translated_text.is_some());

        let gate = h.services.grammar.push_gate();
        let session = h.session.clone();
        let task = tokio::spawn(async move { session.check_message_grammar(id).await });
        while !h.session.message(id).unwrap().is_checking_grammar {
            tokio::task::yield_now().await;
        }
        let in_flight = h.session.message(id).unwrap();
        assert!(in_flight.translated_text.is_none());
        assert!(!in_flight.is_translating);

        gate.send(Ok(crate::services::GrammarReply {
            feedback: "Correct.".into(),
        }))
        .unwrap();
        assert_eq!(
            task.await.unwrap(),
            EnrichmentOutcome::Applied("Correct.".into())
        );
        let done = h.session.message(id).unwrap();
        assert_eq!(done.grammar_feedback.as_deref(), Some("Correct."));
        assert!(!done.is_checking_grammar);
    }

    #[tokio::test]
    async fn failure_leaves_result_absent_and_notifies() {
        let mut h = Harness::new(french_written());
        let id = seed(&h, Message::user("Bonjour", "French"));
        h.services
            .translation
            .push_err(ServiceError::Timeout("30s".into()));
        assert_eq!(
            h.session.translate_message(id).await,
            EnrichmentOutcome::Failed
        );
        let message = h.session.message(id).unwrap();
        assert!(message.translated_text.is_none());
        assert!(!message.is_translating);
        let notifications = h.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Translation Error");
    }

    #[tokio::test]
    async fn empty_grammar_feedback_is_a_failure() {
        let mut h = Harness::new(french_written());
        let id = seed(&h, Message::user("Bonjour", "French"));
        h.services.push_grammar_feedback("");
        assert_eq!(
            h.session.check_message_grammar(id).await,
            EnrichmentOutcome::Failed
        );
        assert_eq!(h.notifications()[0].title, "Grammar Check Error");
    }

    #[tokio::test]
    async fn agent_messages_are_not_grammar_checked() {
        let h = Harness::new(french_written());
        let id = seed(&h, Message::agent("Bonjour", "French"));
        assert_eq!(
            h.session.check_message_grammar(id).await,
            EnrichmentOutcome::Skipped
        );
        assert!(h.services.grammar.requests().is_empty());
    }

    #[tokio::test]
    async fn pivot_language_source_is_not_translated() {
        let h = Harness::new(french_written());
        let id = seed(&h, Message::user("Hello", "English"));
        assert_eq!(
            h.session.translate_message(id).await,
            EnrichmentOutcome::Skipped
        );
        assert!(h.services.translation.requests().is_empty());
    }

    #[tokio::test]
    async fn unknown_message_is_skipped() {
        let h = Harness::new(french_written());
        assert_eq!(
            h.session.translate(MessageId::new(), "hola", "Spanish").await,
            EnrichmentOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn concurrent_enrichments_complete_independently() {
        let h = Harness::new(french_written());
        let a = seed(&h, Message::agent("Uno", "Spanish"));
        let b = seed(&h, Message::agent("Dos", "Spanish"));
        let gate_a = h.services.translation.push_gate();
        let gate_b = h.services.translation.push_gate();

        let s = h.session.clone();
        let task_a = tokio::spawn(async move { s.translate_message(a).await });
        while !h.session.message(a).unwrap().is_translating {
            tokio::task::yield_now().await;
        }
        let s = h.session.clone();
        let task_b = tokio::spawn(async move { s.translate_message(b).await });
        while !h.session.message(b).unwrap().is_translating {
            tokio::task::yield_now().await;
        }

        gate_b
            .send(Ok(TranslationReply {
                translated_text: "Two".into(),
            }))
            .unwrap();
        task_b.await.unwrap();
        assert!(h.session.message(a).unwrap().is_translating);
        assert_eq!(
            h.session.message(b).unwrap().translated_text.as_deref(),
            Some("Two")
        );

        gate_a
            .send(Ok(TranslationReply {
                translated_text: "One".into(),
            }))
            .unwrap();
        task_a.await.unwrap();
        assert_eq!(
            h.session.message(a).unwrap().translated_text.as_deref(),
            Some("One")
        );
    }
}
