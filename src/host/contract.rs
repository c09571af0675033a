//! Versioned host command/event envelopes for frontend integration.

use serde::{Deserialize, Serialize};

/// Contract version for host command/event envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Command set accepted by the host bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
    #[serde(rename = "session.status")]
    SessionStatus,
    #[serde(rename = "session.request_change")]
    SessionRequestChange,
    #[serde(rename = "session.confirm_change")]
    SessionConfirmChange,
    #[serde(rename = "session.cancel_change")]
    SessionCancelChange,
    #[serde(rename = "turn.submit")]
    TurnSubmit,
    #[serde(rename = "message.translate")]
    MessageTranslate,
    #[serde(rename = "message.check_grammar")]
    MessageCheckGrammar,
    #[serde(rename = "suggestion.get")]
    SuggestionGet,
    #[serde(rename = "feedback.get")]
    FeedbackGet,
    #[serde(rename = "speech.voices_changed")]
    SpeechVoicesChanged,
    #[serde(rename = "speech.select_voice")]
    SpeechSelectVoice,
    #[serde(rename = "speech.synthesis_event")]
    SpeechSynthesisEvent,
    #[serde(rename = "speech.capture_toggle")]
    SpeechCaptureToggle,
    #[serde(rename = "speech.capture_event")]
    SpeechCaptureEvent,
    #[serde(rename = "speech.cancel")]
    SpeechCancel,
    #[serde(rename = "conversation.save")]
    ConversationSave,
    #[serde(rename = "conversation.list")]
    ConversationList,
    #[serde(rename = "conversation.load")]
    ConversationLoad,
    #[serde(rename = "conversation.new")]
    ConversationNew,
    #[serde(rename = "conversation.delete")]
    ConversationDelete,
}

impl CommandName {
    pub const ALL: [Self; 23] = [
        Self::HostPing,
        Self::HostVersion,
        Self::RuntimeStop,
        Self::SessionStatus,
        Self::SessionRequestChange,
        Self::SessionConfirmChange,
        Self::SessionCancelChange,
        Self::TurnSubmit,
        Self::MessageTranslate,
        Self::MessageCheckGrammar,
        Self::SuggestionGet,
        Self::FeedbackGet,
        Self::SpeechVoicesChanged,
        Self::SpeechSelectVoice,
        Self::SpeechSynthesisEvent,
        Self::SpeechCaptureToggle,
        Self::SpeechCaptureEvent,
        Self::SpeechCancel,
        Self::ConversationSave,
        Self::ConversationList,
        Self::ConversationLoad,
        Self::ConversationNew,
        Self::ConversationDelete,
    ];

    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::RuntimeStop => "runtime.stop",
            Self::SessionStatus => "session.status",
            Self::SessionRequestChange => "session.request_change",
            Self::SessionConfirmChange => "session.confirm_change",
            Self::SessionCancelChange => "session.cancel_change",
            Self::TurnSubmit => "turn.submit",
            Self::MessageTranslate => "message.translate",
            Self::MessageCheckGrammar => "message.check_grammar",
            Self::SuggestionGet => "suggestion.get",
            Self::FeedbackGet => "feedback.get",
            Self::SpeechVoicesChanged => "speech.voices_changed",
            Self::SpeechSelectVoice => "speech.select_voice",
            Self::SpeechSynthesisEvent => "speech.synthesis_event",
            Self::SpeechCaptureToggle => "speech.capture_toggle",
            Self::SpeechCaptureEvent => "speech.capture_event",
            Self::SpeechCancel => "speech.cancel",
            Self::ConversationSave => "conversation.save",
            Self::ConversationList => "conversation.list",
            Self::ConversationLoad => "conversation.load",
            Self::ConversationNew => "conversation.new",
            Self::ConversationDelete => "conversation.delete",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.as_str() == raw)
    }
}

/// A versioned response envelope from backend host -> frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A versioned command envelope from frontend -> backend host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    /// Build a v1 command envelope.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A versioned event envelope from backend host -> frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build a v1 event envelope.
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }
}

impl From<&crate::runtime::RuntimeEvent> for EventEnvelope {
    fn from(event: &crate::runtime::RuntimeEvent) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            event.name(),
            event.payload(),
        )
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ContractError {}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for command in CommandName::ALL {
            let json = serde_json::to_value(command).unwrap();
            assert_eq!(json, serde_json::json!(command.as_str()));
            assert_eq!(CommandName::parse(command.as_str()), Some(command));
        }
        assert_eq!(CommandName::parse("orb.flash"), None);
    }

    #[test]
    fn validate_rejects_wrong_version_and_blank_id() {
        let mut envelope = CommandEnvelope::new("req-1", CommandName::HostPing, serde_json::json!({}));
        assert!(envelope.validate().is_ok());

        envelope.v = 2;
        assert_eq!(
            envelope.validate().unwrap_err().kind,
            ContractErrorKind::UnsupportedVersion
        );

        envelope.v = EVENT_VERSION;
        envelope.request_id = "  ".into();
        assert_eq!(
            envelope.validate().unwrap_err().kind,
            ContractErrorKind::InvalidEnvelope
        );
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let envelope: CommandEnvelope =
            serde_json::from_str(r#"{"v":1,"request_id":"r","command":"session.status"}"#).unwrap();
        assert_eq!(envelope.command, CommandName::SessionStatus);
        assert!(envelope.payload.is_null());
    }
}
