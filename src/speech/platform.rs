//! Boundary to the platform speech subsystem (synthesis + capture).
//!
//! Implementations only accept requests. Progress comes back later as
//! [`SynthesisEvent`]s and [`CaptureEvent`]s delivered to the coordinators,
//! so implementations must never call back into a coordinator synchronously
//! from `speak`/`cancel`/`start`/`stop`.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A platform voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Platform-unique voice identifier.
    pub uri: String,
    pub name: String,
    /// BCP-47 tag reported by the platform (e.g. `"es-MX"`).
    pub lang: String,
}

impl Voice {
    pub fn new(uri: impl Into<String>, name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Identifier of one synthesized-speech playback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtteranceId(pub u64);

impl std::fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "utt-{}", self.0)
    }
}

/// A single utterance to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtteranceRequest {
    pub id: UtteranceId,
    pub text: String,
    /// Language tag; `None` lets the platform decide.
    pub lang: Option<String>,
    /// Voice to use; `None` means the platform default.
    pub voice_uri: Option<String>,
}

/// A single-shot capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub lang: String,
    /// Always `false`: one result per capture session.
    pub continuous: bool,
}

/// Progress notifications for an utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SynthesisEvent {
    Started { id: UtteranceId },
    Ended { id: UtteranceId },
    Failed { id: UtteranceId, error: String },
}

/// Progress notifications for a capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureEvent {
    Started,
    Result { transcript: String },
    Error { code: String },
    Ended,
}

/// Speech capabilities, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechCapabilities {
    pub synthesis: bool,
    pub capture: bool,
}

impl Default for SpeechCapabilities {
    fn default() -> Self {
        Self {
            synthesis: true,
            capture: true,
        }
    }
}

/// Text-to-speech side of the platform.
pub trait SpeechSynthesizer: Send + Sync {
    /// Voices currently reported by the platform (may be empty at startup).
    fn voices(&self) -> Vec<Voice>;
    /// Queue an utterance for playback.
    fn speak(&self, request: &UtteranceRequest) -> Result<()>;
    /// Stop whatever is playing.
    fn cancel(&self);
}

/// Speech-to-text side of the platform.
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self, request: &CaptureRequest) -> Result<()>;
    fn stop(&self);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn synthesis_event_json_is_tagged() {
        let event = SynthesisEvent::Failed {
            id: UtteranceId(3),
            error: "interrupted".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "failed", "id": 3, "error": "interrupted"})
        );
    }

    #[test]
    fn capture_event_parses_from_frontend_shape() {
        let event: CaptureEvent =
            serde_json::from_str(r#"{"type":"result","transcript":"hola"}"#).unwrap();
        assert_eq!(
            event,
            CaptureEvent::Result {
                transcript: "hola".into()
            }
        );
        let event: CaptureEvent = serde_json::from_str(r#"{"type":"ended"}"#).unwrap();
        assert_eq!(event, CaptureEvent::Ended);
    }
}
