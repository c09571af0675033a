//! Speech output coordinator: speaks agent messages in verbal mode.
//!
//! State machine per utterance:
//!
//! ```text
//! Idle ──speak──▶ AwaitingVoices ──voices──▶ Active(id) ──started──▶ Active(id), speaking
//!   ▲                   │                        │
//!   └──── cancel ───────┴──── ended / failed ────┘
//! ```
//!
//! At most one utterance is ever active: starting a new one cancels the
//! previous one first, and events for superseded utterances are ignored.

use crate::runtime::{Notification, RuntimeEvent};
use crate::speech::platform::{
    SpeechSynthesizer, SynthesisEvent, UtteranceId, UtteranceRequest, Voice,
};
use crate::speech::voice::{resolve_voice, voices_for_language};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputState {
    Idle,
    /// Waiting for the platform to report its voices (one-shot).
    AwaitingVoices { text: String, lang: Option<String> },
    Active(UtteranceId),
}

struct OutputInner {
    state: OutputState,
    speaking: bool,
    voices: Vec<Voice>,
    selected_voice: Option<String>,
}

/// Drives speech synthesis for agent messages.
pub struct SpeechOutputCoordinator {
    synth: Arc<dyn SpeechSynthesizer>,
    supported: bool,
    next_id: AtomicU64,
    inner: Mutex<OutputInner>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl SpeechOutputCoordinator {
    pub fn new(
        synth: Arc<dyn SpeechSynthesizer>,
        supported: bool,
        events: broadcast::Sender<RuntimeEvent>,
    ) -> Self {
        let voices = if supported { synth.voices() } else { Vec::new() };
        Self {
            synth,
            supported,
            next_id: AtomicU64::new(1),
            inner: Mutex::new(OutputInner {
                state: OutputState::Idle,
                speaking: false,
                voices,
                selected_voice: None,
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, OutputInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Speak `text`, cancelling anything currently playing.
    ///
    /// If the platform has not reported any voices yet the utterance is held
    /// until [`on_voices_changed`](Self::on_voices_changed) delivers them.
    pub fn speak(&self, text: &str, lang: Option<&str>) {
        if !self.supported {
            debug!("speech synthesis unsupported; not speaking agent message");
            return;
        }
        if text.trim().is_empty() {
            return;
        }
        let mut inner = self.lock();
        self.cancel_locked(&mut inner);
        if inner.voices.is_empty() {
            debug!("voice list not populated yet; deferring utterance");
            inner.state = OutputState::AwaitingVoices {
                text: text.to_owned(),
                lang: lang.map(str::to_owned),
            };
            return;
        }
        self.start_locked(&mut inner, text.to_owned(), lang.map(str::to_owned));
    }

    /// Record a refreshed platform voice list and release a deferred utterance.
    pub fn on_voices_changed(&self, voices: Vec<Voice>) {
        let mut inner = self.lock();
        info!(count = voices.len(), "platform voices changed");
        inner.voices = voices;
        if inner.voices.is_empty() {
            return;
        }
        let pending = std::mem::replace(&mut inner.state, OutputState::Idle);
        match pending {
            OutputState::AwaitingVoices { text, lang } => self.start_locked(&mut inner, text, lang),
            other => inner.state = other,
        }
    }

    /// Apply a platform progress notification.
    pub fn handle_event(&self, event: &SynthesisEvent) {
        let mut inner = self.lock();
        let current = match inner.state {
            OutputState::Active(id) => Some(id),
            _ => None,
        };
        match event {
            SynthesisEvent::Started { id } if current == Some(*id) => {
                if !inner.speaking {
                    inner.speaking = true;
                    self.publish(RuntimeEvent::AgentSpeaking { active: true });
                }
            }
            SynthesisEvent::Ended { id } if current == Some(*id) => {
                info!(utterance = %id, "agent utterance finished");
                inner.state = OutputState::Idle;
                self.set_idle_locked(&mut inner);
            }
            SynthesisEvent::Failed { id, error } if current == Some(*id) => {
                warn!(utterance = %id, error = %error, "speech synthesis error");
                inner.state = OutputState::Idle;
                self.set_idle_locked(&mut inner);
                self.publish(RuntimeEvent::Notification(Notification::error(
                    "Voice Output Error",
                    "Could not play agent's voice.",
                )));
            }
            other => debug!(?other, "ignoring event for superseded utterance"),
        }
    }

    /// Stop any playing or deferred utterance and force the idle state.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        self.cancel_locked(&mut inner);
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.lock().speaking
    }

    /// Whether an utterance is queued, deferred or playing.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().state != OutputState::Idle
    }

    #[must_use]
    pub fn voices(&self) -> Vec<Voice> {
        self.lock().voices.clone()
    }

    #[must_use]
    pub fn voices_for_language(&self, lang: Option<&str>) -> Vec<Voice> {
        let inner = self.lock();
        voices_for_language(&inner.voices, lang)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn selected_voice(&self) -> Option<String> {
        self.lock().selected_voice.clone()
    }

    /// Choose a voice by URI; `None` means platform default.
    pub fn select_voice(&self, uri: Option<String>) {
        self.lock().selected_voice = uri;
    }

    fn start_locked(&self, inner: &mut OutputInner, text: String, lang: Option<String>) {
        let id = UtteranceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let voice_uri = resolve_voice(
            &inner.voices,
            inner.selected_voice.as_deref(),
            lang.as_deref(),
        )
        .map(|v| v.uri.clone());
        let request = UtteranceRequest {
            id,
            text,
            lang,
            voice_uri,
        };
        match self.synth.speak(&request) {
            Ok(()) => {
                info!(utterance = %id, voice = ?request.voice_uri, "speaking agent message");
                inner.state = OutputState::Active(id);
            }
            Err(e) => {
                warn!(error = %e, "failed to submit utterance");
                inner.state = OutputState::Idle;
                self.set_idle_locked(inner);
                self.publish(RuntimeEvent::Notification(Notification::error(
                    "Voice Output Error",
                    "Could not play agent's voice.",
                )));
            }
        }
    }

    fn cancel_locked(&self, inner: &mut OutputInner) {
        let was = std::mem::replace(&mut inner.state, OutputState::Idle);
        if matches!(was, OutputState::Active(_)) || inner.speaking {
            debug!("cancelling active utterance");
            self.synth.cancel();
        }
        self.set_idle_locked(inner);
    }

    fn set_idle_locked(&self, inner: &mut OutputInner) {
        if inner.speaking {
            inner.speaking = false;
            self.publish(RuntimeEvent::AgentSpeaking { active: false });
        }
    }

    fn publish(&self, event: RuntimeEvent) {
        let _ = self.events.send(event);
    }
}
