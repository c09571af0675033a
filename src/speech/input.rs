//! Speech input coordinator: single-shot capture sessions.
//!
//! ```text
//! Idle ──toggle──▶ Listening ──result──▶ Listening ──ended──▶ Idle
//!   ▲                  │
//!   └──── toggle / error / cancel
//! ```
//!
//! The coordinator never submits turns itself. [`handle_event`] returns a
//! [`CaptureOutcome`] and the session decides what to do with the text.
//!
//! [`handle_event`]: SpeechInputCoordinator::handle_event

use crate::catalog::InteractionMode;
use crate::error::{PracticeError, Result};
use crate::runtime::{Notification, RuntimeEvent};
use crate::speech::platform::{CaptureEvent, CaptureRequest, SpeechRecognizer};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// User-facing category of a capture failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureErrorKind {
    NoSpeech,
    MicrophoneUnavailable,
    PermissionDenied,
    Other,
}

impl CaptureErrorKind {
    /// Map a platform error code onto a category.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::MicrophoneUnavailable,
            "not-allowed" | "service-not-allowed" => Self::PermissionDenied,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn notification(self, code: &str) -> Notification {
        match self {
            Self::NoSpeech => Notification::error(
                "No Speech Detected",
                "We didn't hear anything. Please try speaking again.",
            ),
            Self::MicrophoneUnavailable => Notification::error(
                "Microphone Unavailable",
                "No microphone was found. Please check your audio input device.",
            ),
            Self::PermissionDenied => Notification::error(
                "Microphone Access Denied",
                "Please allow microphone access to use voice input.",
            ),
            Self::Other => Notification::error(
                "Speech Recognition Error",
                format!("An error occurred during speech recognition: {code}"),
            ),
        }
    }
}

/// What the session should do after a capture event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Ignored,
    /// Verbal mode: submit the text as a user turn right away.
    Submit(String),
    /// Written mode: append the text to the free-text draft.
    AppendToDraft(String),
}

struct InputInner {
    listening: bool,
    last_error: Option<CaptureErrorKind>,
}

pub struct SpeechInputCoordinator {
    recognizer: Arc<dyn SpeechRecognizer>,
    supported: bool,
    inner: Mutex<InputInner>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl SpeechInputCoordinator {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        supported: bool,
        events: broadcast::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            recognizer,
            supported,
            inner: Mutex::new(InputInner {
                listening: false,
                last_error: None,
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, InputInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.lock().listening
    }

    #[must_use]
    pub fn last_error(&self) -> Option<CaptureErrorKind> {
        self.lock().last_error
    }

    /// Start capture in `lang_tag` if idle, stop it if listening.
    ///
    /// Returns the new listening state.
    pub fn toggle_capture(&self, lang_tag: &str) -> Result<bool> {
        if !self.supported {
            self.publish(RuntimeEvent::Notification(Notification::error(
                "Not Supported",
                "Speech recognition is not supported on this platform.",
            )));
            return Err(PracticeError::UnsupportedCapability(
                "speech capture".to_owned(),
            ));
        }
        let mut inner = self.lock();
        if inner.listening {
            info!("stopping speech capture");
            self.recognizer.stop();
            self.set_listening_locked(&mut inner, false);
            return Ok(false);
        }
        inner.last_error = None;
        let request = CaptureRequest {
            lang: lang_tag.to_owned(),
            continuous: false,
        };
        match self.recognizer.start(&request) {
            Ok(()) => {
                info!(lang = %request.lang, "speech capture started");
                self.set_listening_locked(&mut inner, true);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "failed to start speech capture");
                inner.last_error = Some(CaptureErrorKind::Other);
                self.publish(RuntimeEvent::Notification(
                    CaptureErrorKind::Other.notification(&e.to_string()),
                ));
                Err(PracticeError::SpeechPlatform(e.to_string()))
            }
        }
    }

    /// Apply a platform capture event.
    pub fn handle_event(&self, event: &CaptureEvent, mode: InteractionMode) -> CaptureOutcome {
        let mut inner = self.lock();
        match event {
            CaptureEvent::Started => {
                self.set_listening_locked(&mut inner, true);
                CaptureOutcome::Ignored
            }
            CaptureEvent::Result { transcript } => {
                let text = transcript.trim();
                if text.is_empty() {
                    return CaptureOutcome::Ignored;
                }
                debug!(len = text.len(), ?mode, "capture result");
                match mode {
                    InteractionMode::Verbal => CaptureOutcome::Submit(text.to_owned()),
                    InteractionMode::Written => CaptureOutcome::AppendToDraft(text.to_owned()),
                }
            }
            CaptureEvent::Error { code } => {
                let kind = CaptureErrorKind::from_code(code);
                warn!(code = %code, ?kind, "speech capture error");
                inner.last_error = Some(kind);
                self.set_listening_locked(&mut inner, false);
                self.publish(RuntimeEvent::Notification(kind.notification(code)));
                CaptureOutcome::Ignored
            }
            CaptureEvent::Ended => {
                self.set_listening_locked(&mut inner, false);
                CaptureOutcome::Ignored
            }
        }
    }

    /// Stop any capture session and force the idle state.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        if inner.listening {
            debug!("cancelling speech capture");
            self.recognizer.stop();
        }
        self.set_listening_locked(&mut inner, false);
    }

    fn set_listening_locked(&self, inner: &mut InputInner, active: bool) {
        if inner.listening != active {
            inner.listening = active;
            self.publish(RuntimeEvent::Listening { active });
        }
    }

    fn publish(&self, event: RuntimeEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::speech::memory::MemoryRecognizer;

    fn coordinator(supported: bool) -> (
        Arc<MemoryRecognizer>,
        SpeechInputCoordinator,
        broadcast::Receiver<RuntimeEvent>,
    ) {
        let recognizer = Arc::new(MemoryRecognizer::default());
        let (tx, rx) = broadcast::channel(64);
        let input = SpeechInputCoordinator::new(recognizer.clone(), supported, tx);
        (recognizer, input, rx)
    }

    #[test]
    fn error_codes_map_to_categories() {
        assert_eq!(CaptureErrorKind::from_code("no-speech"), CaptureErrorKind::NoSpeech);
        assert_eq!(
            CaptureErrorKind::from_code("audio-capture"),
            CaptureErrorKind::MicrophoneUnavailable
        );
        assert_eq!(
            CaptureErrorKind::from_code("not-allowed"),
            CaptureErrorKind::PermissionDenied
        );
        assert_eq!(
            CaptureErrorKind::from_code("service-not-allowed"),
            CaptureErrorKind::PermissionDenied
        );
        assert_eq!(CaptureErrorKind::from_code("network"), CaptureErrorKind::Other);
    }

    #[test]
    fn toggle_starts_then_stops() {
        let (recognizer, input, _rx) = coordinator(true);
        assert!(input.toggle_capture("fr-FR").unwrap());
        assert!(input.is_listening());
        assert_eq!(recognizer.started()[0].lang, "fr-FR");
        assert!(!recognizer.started()[0].continuous);

        assert!(!input.toggle_capture("fr-FR").unwrap());
        assert!(!input.is_listening());
        assert_eq!(recognizer.stop_count(), 1);
    }

    #[test]
    fn verbal_result_submits_and_written_result_drafts() {
        let (_r, input, _rx) = coordinator(true);
        let result = CaptureEvent::Result {
            transcript: " Bonjour ".into(),
        };
        assert_eq!(
            input.handle_event(&result, InteractionMode::Verbal),
            CaptureOutcome::Submit("Bonjour".into())
        );
        assert_eq!(
            input.handle_event(&result, InteractionMode::Written),
            CaptureOutcome::AppendToDraft("Bonjour".into())
        );
    }

    #[test]
    fn error_sets_idle_and_notifies_once() {
        let (_r, input, mut rx) = coordinator(true);
        input.toggle_capture("es-ES").unwrap();
        input.handle_event(
            &CaptureEvent::Error {
                code: "no-speech".into(),
            },
            InteractionMode::Verbal,
        );
        assert!(!input.is_listening());
        assert_eq!(input.last_error(), Some(CaptureErrorKind::NoSpeech));

        let notifications: Vec<Notification> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|e| match e {
                RuntimeEvent::Notification(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "No Speech Detected");

        // Starting again clears the stale error.
        input.toggle_capture("es-ES").unwrap();
        assert_eq!(input.last_error(), None);
    }

    #[test]
    fn end_returns_to_idle() {
        let (_r, input, _rx) = coordinator(true);
        input.toggle_capture("de-DE").unwrap();
        input.handle_event(&CaptureEvent::Ended, InteractionMode::Verbal);
        assert!(!input.is_listening());
    }

    #[test]
    fn unsupported_capture_notifies_and_does_nothing() {
        let (recognizer, input, mut rx) = coordinator(false);
        let err = input.toggle_capture("en-US").unwrap_err();
        assert!(matches!(err, PracticeError::UnsupportedCapability(_)));
        assert!(recognizer.started().is_empty());
        assert!(matches!(rx.try_recv(), Ok(RuntimeEvent::Notification(_))));
    }
}
