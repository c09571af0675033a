//! Skills feedback over the whole conversation.

use super::PracticeSession;
use crate::error::{PracticeError, Result};
use crate::runtime::{BusyFlag, Notification};
use crate::services::{FeedbackRequest, HistoryEntry, SkillFeedback};
use tracing::{error, info};

impl PracticeSession {
    /// Ask the feedback service to review the learner's side of the conversation.
    ///
    /// Needs a complete configuration and at least one message. Failures
    /// notify once and return `ServiceFailure`.
    pub async fn request_feedback(&self) -> Result<SkillFeedback> {
        let (resolved, history) = {
            let state = self.lock();
            let history: Vec<HistoryEntry> =
                state.transcript.messages().iter().map(HistoryEntry::from).collect();
            (state.config.resolve(), history)
        };
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                self.notify_selection_missing();
                return Err(e);
            }
        };
        if history.is_empty() {
            self.notify(Notification::info(
                "Nothing to Review",
                "Have a conversation first, then ask for feedback.",
            ));
            return Err(PracticeError::EmptyInput);
        }

        let _loading = self.begin_loading(BusyFlag::Feedback);
        let request = FeedbackRequest {
            language: resolved.language,
            scenario: resolved.scenario,
            conversation_history: history,
        };
        info!(messages = request.conversation_history.len(), "requesting skills feedback");

        let failure = match self.inner.services.feedback.feedback(&request).await {
            Ok(feedback) if !feedback.is_empty() => return Ok(feedback),
            Ok(_) => "feedback service returned nothing".to_owned(),
            Err(e) => e.to_string(),
        };
        error!(error = %failure, "skills feedback failed");
        self.notify(Notification::error(
            "Feedback Error",
            "Failed to get feedback on your conversation. Please try again.",
        ));
        Err(PracticeError::ServiceFailure(failure))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::super::test_support::*;
    use super::*;
    use crate::services::ServiceError;
    use crate::transcript::{Message, Speaker};

    #[tokio::test]
    async fn sends_structured_history() {
        let h = Harness::new(french_written());
        h.session
            .append_message(Message::user("Bonjour", "French"), None);
        h.session
            .append_message(Message::agent("Salut", "French"), None);
        h.services.feedback.push_ok(SkillFeedback {
            grammar: "Good".into(),
            overall: "Keep going".into(),
            ..SkillFeedback::default()
        });

        let feedback = h.session.request_feedback().await.unwrap();
        assert_eq!(feedback.overall, "Keep going");
        assert!(!h.session.status().is_loading_feedback);

        let request = &h.services.feedback.requests()[0];
        assert_eq!(request.scenario, "Meeting a stranger");
        assert_eq!(request.conversation_history.len(), 2);
        assert_eq!(request.conversation_history[1].speaker, Speaker::Agent);
    }

    #[tokio::test]
    async fn empty_transcript_is_rejected() {
        let h = Harness::new(french_written());
        assert!(matches!(
            h.session.request_feedback().await,
            Err(PracticeError::EmptyInput)
        ));
        assert!(h.services.feedback.requests().is_empty());
    }

    #[tokio::test]
    async fn failure_is_service_failure_with_one_notification() {
        let mut h = Harness::new(french_written());
        h.session
            .append_message(Message::user("Bonjour", "French"), None);
        h.drain();
        h.services
            .feedback
            .push_err(ServiceError::InvalidPayload("not json".into()));
        assert!(matches!(
            h.session.request_feedback().await,
            Err(PracticeError::ServiceFailure(_))
        ));
        let notifications = h.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Feedback Error");
    }
}
