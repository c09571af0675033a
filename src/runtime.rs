//! Runtime events emitted by a practice session for UI and observability.
//!
//! Every transcript mutation, busy-flag change, speech state change and
//! user-facing notification is published as a [`RuntimeEvent`] on a
//! broadcast channel. Events are small and cloneable so publishing never
//! blocks the controllers.

use crate::session::guard::PendingChange;
use crate::session::SessionConfig;
use crate::speech::platform::{CaptureRequest, UtteranceRequest};
use crate::transcript::{Message, MessageId};
use serde::{Deserialize, Serialize};

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Destructive,
}

/// Transient, non-blocking user-facing message. Never part of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Normal,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Destructive,
        }
    }
}

/// Which session busy flag changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyFlag {
    /// An agent turn is in flight.
    Turn,
    /// A suggestion request is in flight.
    Suggestion,
    /// A skills-feedback request is in flight.
    Feedback,
}

/// Events that describe what the session is doing "right now".
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A message was appended to the transcript.
    MessageAppended(Message),
    /// A message was patched in place; carries the updated message.
    MessageUpdated(Message),
    /// The transcript was emptied.
    TranscriptCleared,
    /// The transcript was replaced wholesale (saved conversation loaded).
    TranscriptRestored { message_ids: Vec<MessageId> },
    /// A busy flag flipped.
    Busy { flag: BusyFlag, active: bool },
    /// Transient notification for the user.
    Notification(Notification),
    /// Agent speech output started/stopped.
    AgentSpeaking { active: bool },
    /// Speech capture started/stopped.
    Listening { active: bool },
    /// Free-text input buffer changed (typed-mode capture appends here).
    DraftChanged { text: String },
    /// A configuration change awaits explicit confirmation.
    ConfirmationRequested(PendingChange),
    /// A pending configuration change was discarded.
    ConfirmationCancelled(PendingChange),
    /// The session configuration changed (and the transcript was reset).
    ConfigurationApplied(SessionConfig),
    /// The speech platform should play this utterance.
    SpeakRequested(UtteranceRequest),
    /// The speech platform should stop any playing utterance.
    SpeechCancelRequested,
    /// The speech platform should start a capture session.
    CaptureRequested(CaptureRequest),
    /// The speech platform should stop the capture session.
    CaptureStopRequested,
}

impl RuntimeEvent {
    /// Stable event name used by the host bridge.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageAppended(_) => "transcript.appended",
            Self::MessageUpdated(_) => "transcript.updated",
            Self::TranscriptCleared => "transcript.cleared",
            Self::TranscriptRestored { .. } => "transcript.restored",
            Self::Busy { .. } => "session.busy",
            Self::Notification(_) => "notification",
            Self::AgentSpeaking { .. } => "speech.agent_speaking",
            Self::Listening { .. } => "speech.listening",
            Self::DraftChanged { .. } => "input.draft_changed",
            Self::ConfirmationRequested(_) => "session.confirmation_requested",
            Self::ConfirmationCancelled(_) => "session.confirmation_cancelled",
            Self::ConfigurationApplied(_) => "session.configuration_applied",
            Self::SpeakRequested(_) => "speech.speak",
            Self::SpeechCancelRequested => "speech.cancel_requested",
            Self::CaptureRequested(_) => "capture.start",
            Self::CaptureStopRequested => "capture.stop",
        }
    }

    /// JSON payload used by the host bridge.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::MessageAppended(message) | Self::MessageUpdated(message) => {
                serde_json::json!({ "message": message })
            }
            Self::TranscriptCleared | Self::SpeechCancelRequested | Self::CaptureStopRequested => {
                serde_json::json!({})
            }
            Self::TranscriptRestored { message_ids } => {
                serde_json::json!({ "message_ids": message_ids })
            }
            Self::Busy { flag, active } => serde_json::json!({ "flag": flag, "active": active }),
            Self::Notification(notification) => serde_json::json!(notification),
            Self::AgentSpeaking { active } | Self::Listening { active } => {
                serde_json::json!({ "active": active })
            }
            Self::DraftChanged { text } => serde_json::json!({ "text": text }),
            Self::ConfirmationRequested(pending) | Self::ConfirmationCancelled(pending) => {
                serde_json::json!(pending)
            }
            Self::ConfigurationApplied(config) => serde_json::json!(config),
            Self::SpeakRequested(request) => serde_json::json!(request),
            Self::CaptureRequested(request) => serde_json::json!(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_constructors_set_severity() {
        assert_eq!(Notification::info("a", "b").severity, Severity::Normal);
        assert_eq!(Notification::error("a", "b").severity, Severity::Destructive);
    }

    #[test]
    fn busy_event_payload_shape() {
        let event = RuntimeEvent::Busy {
            flag: BusyFlag::Suggestion,
            active: true,
        };
        assert_eq!(event.name(), "session.busy");
        assert_eq!(
            event.payload(),
            serde_json::json!({"flag": "suggestion", "active": true})
        );
    }

    #[test]
    fn notification_payload_is_flat() {
        let event = RuntimeEvent::Notification(Notification::error("Error", "boom"));
        assert_eq!(
            event.payload(),
            serde_json::json!({"title": "Error", "description": "boom", "severity": "destructive"})
        );
    }
}
