//! Sandbox suggestions: a conversational prompt surfaced as a notification.

use super::PracticeSession;
use crate::catalog;
use crate::error::Result;
use crate::runtime::{BusyFlag, Notification};
use crate::services::SuggestionRequest;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionOutcome {
    Suggested(String),
    /// The service failed or returned nothing; the user was notified.
    Failed,
    /// Suggestions are only offered in the sandbox scenario.
    NotSandbox,
}

impl PracticeSession {
    /// Ask the suggestion service for something the user could say next.
    ///
    /// The suggestion never enters the transcript.
    pub async fn get_suggestion(&self) -> Result<SuggestionOutcome> {
        let config = self.config();
        if !config.scenario.as_deref().is_some_and(catalog::is_sandbox) {
            debug!("suggestions are only available in the sandbox scenario");
            return Ok(SuggestionOutcome::NotSandbox);
        }
        let resolved = match config.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                self.notify_selection_missing();
                return Err(e);
            }
        };

        let _loading = self.begin_loading(BusyFlag::Suggestion);
        let request = SuggestionRequest {
            language: resolved.language,
            conversation_history: self.lock().transcript.history(),
        };
        info!(language = %request.language, "requesting suggestion");

        let suggestion = match self.inner.services.suggestion.suggest(&request).await {
            Ok(reply) if !reply.suggestion.trim().is_empty() => Some(reply.suggestion.trim().to_owned()),
            Ok(_) => {
                warn!("suggestion service returned nothing");
                None
            }
            Err(e) => {
                error!(error = %e, "suggestion failed");
                None
            }
        };

        Ok(match suggestion {
            Some(text) => {
                self.notify(Notification::info(
                    "Suggestion",
                    format!("Try saying this: {text}"),
                ));
                SuggestionOutcome::Suggested(text)
            }
            None => {
                self.notify(Notification::error(
                    "Error",
                    "Failed to get a suggestion. Please try again.",
                ));
                SuggestionOutcome::Failed
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::super::test_support::*;
    use super::super::SessionConfig;
    use super::*;
    use crate::catalog::InteractionMode;
    use crate::runtime::Severity;
    use crate::services::ServiceError;

    fn sandbox() -> SessionConfig {
        SessionConfig::new("Spanish", "Sandbox", InteractionMode::Written)
    }

    #[tokio::test]
    async fn outside_sandbox_is_a_no_op() {
        let mut h = Harness::new(french_written());
        assert_eq!(
            h.session.get_suggestion().await.unwrap(),
            SuggestionOutcome::NotSandbox
        );
        assert!(h.services.suggestion.requests().is_empty());
        assert!(h.notifications().is_empty());
    }

    #[tokio::test]
    async fn suggestion_is_a_notification_not_a_message() {
        let mut h = Harness::new(sandbox());
        h.services.push_suggestion("¿Qué te gusta hacer?");
        let outcome = h.session.get_suggestion().await.unwrap();
        assert_eq!(
            outcome,
            SuggestionOutcome::Suggested("¿Qué te gusta hacer?".into())
        );
        assert!(h.session.transcript().is_empty());
        assert!(!h.session.status().is_loading_suggestion);

        let notifications = h.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Suggestion");
        assert_eq!(notifications[0].severity, Severity::Normal);
        assert!(notifications[0].description.contains("¿Qué te gusta hacer?"));

        let request = &h.services.suggestion.requests()[0];
        assert_eq!(request.language, "Spanish");
        assert_eq!(request.conversation_history, "");
    }

    #[tokio::test]
    async fn failure_notifies_once_and_clears_flag() {
        let mut h = Harness::new(sandbox());
        h.services
            .suggestion
            .push_err(ServiceError::Request("503".into()));
        assert_eq!(
            h.session.get_suggestion().await.unwrap(),
            SuggestionOutcome::Failed
        );
        assert!(!h.session.status().is_loading_suggestion);
        let notifications = h.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].severity, Severity::Destructive);
    }
}
