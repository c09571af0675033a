//! Practice session context.
//!
//! [`PracticeSession`] owns the session configuration, the transcript and the
//! busy flags, and routes every mutation through one place so each change is
//! published as a [`RuntimeEvent`]. Controllers live in submodules:
//!
//! - [`turn`]: user turn submission and agent replies
//! - [`enrichment`]: per-message translation and grammar checks
//! - [`suggestion`]: sandbox conversation prompts
//! - [`feedback`]: skills feedback over the whole conversation
//! - [`guard`]: confirmation-gated configuration changes
//! - [`conversations`]: saved conversations
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. Lock order is session state first, then a speech coordinator.

pub mod conversations;
pub mod enrichment;
pub mod feedback;
pub mod guard;
pub mod suggestion;
pub mod turn;

pub use enrichment::EnrichmentOutcome;
pub use guard::{ChangeOutcome, ConfigChange, ConfigField, PendingChange};
pub use suggestion::SuggestionOutcome;
pub use turn::TurnOutcome;

use crate::catalog::{self, InteractionMode};
use crate::config::AppConfig;
use crate::error::{PracticeError, Result};
use crate::runtime::{BusyFlag, Notification, RuntimeEvent};
use crate::services::Services;
use crate::speech::{
    CaptureEvent, CaptureOutcome, MemoryRecognizer, MemorySynthesizer, SpeechCapabilities,
    SpeechInputCoordinator, SpeechOutputCoordinator, SpeechRecognizer, SpeechSynthesizer,
    SynthesisEvent, Voice,
};
use crate::storage::{ConversationId, ConversationStore};
use crate::transcript::{Message, MessageId, MessagePatch, Speaker, Transcript};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 256;

/// The three user selections every controller reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub language: Option<String>,
    pub scenario: Option<String>,
    pub interaction_mode: Option<InteractionMode>,
}

impl SessionConfig {
    pub fn new(
        language: impl Into<String>,
        scenario: impl Into<String>,
        interaction_mode: InteractionMode,
    ) -> Self {
        Self {
            language: Some(language.into()),
            scenario: Some(scenario.into()),
            interaction_mode: Some(interaction_mode),
        }
    }

    /// All three fields, or `ConfigurationIncomplete` naming the missing ones.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let language = self.language.as_deref().filter(|v| !v.trim().is_empty());
        let scenario = self.scenario.as_deref().filter(|v| !v.trim().is_empty());
        match (language, scenario, self.interaction_mode) {
            (Some(language), Some(scenario), Some(mode)) => Ok(ResolvedConfig {
                language: language.to_owned(),
                scenario: scenario.to_owned(),
                mode,
            }),
            _ => {
                let mut missing = Vec::new();
                if language.is_none() {
                    missing.push("language");
                }
                if scenario.is_none() {
                    missing.push("scenario");
                }
                if self.interaction_mode.is_none() {
                    missing.push("interaction mode");
                }
                Err(PracticeError::ConfigurationIncomplete(missing.join(", ")))
            }
        }
    }

    #[must_use]
    pub fn is_verbal(&self) -> bool {
        self.interaction_mode == Some(InteractionMode::Verbal)
    }

    /// BCP-47 tag of the session language, when the catalog knows it.
    #[must_use]
    pub fn language_tag(&self) -> Option<&'static str> {
        self.language.as_deref().and_then(catalog::bcp47_for)
    }
}

/// A complete configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub language: String,
    pub scenario: String,
    pub mode: InteractionMode,
}

/// Point-in-time view of the session for UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub config: SessionConfig,
    pub message_count: usize,
    pub transcript_revision: u64,
    pub is_loading: bool,
    pub is_loading_suggestion: bool,
    pub is_loading_feedback: bool,
    pub is_agent_speaking: bool,
    pub is_listening: bool,
    pub capabilities: SpeechCapabilities,
    pub selected_voice: Option<String>,
    pub pending_change: Option<PendingChange>,
    pub active_conversation_id: Option<ConversationId>,
    pub draft: String,
    /// Whether the UI should block new input and configuration changes.
    pub is_ui_blocked: bool,
}

#[derive(Debug, Clone)]
struct ActiveConversation {
    id: ConversationId,
    name: String,
    created_at: DateTime<Utc>,
}

struct SessionState {
    config: SessionConfig,
    transcript: Transcript,
    /// Bumped whenever the transcript is replaced; in-flight turns that
    /// started under an older generation drop their reply.
    generation: u64,
    is_loading: bool,
    is_loading_suggestion: bool,
    is_loading_feedback: bool,
    draft: String,
    pending_change: Option<PendingChange>,
    active_conversation: Option<ActiveConversation>,
}

impl SessionState {
    fn busy_flag(&mut self, flag: BusyFlag) -> &mut bool {
        match flag {
            BusyFlag::Turn => &mut self.is_loading,
            BusyFlag::Suggestion => &mut self.is_loading_suggestion,
            BusyFlag::Feedback => &mut self.is_loading_feedback,
        }
    }

    fn reset_transcript(&mut self) {
        self.transcript.clear();
        self.generation += 1;
    }
}

struct SessionInner {
    state: Mutex<SessionState>,
    services: Services,
    output: SpeechOutputCoordinator,
    input: SpeechInputCoordinator,
    capabilities: SpeechCapabilities,
    store: Option<Arc<dyn ConversationStore>>,
    events: broadcast::Sender<RuntimeEvent>,
    pivot_language: String,
    fallback_capture_tag: String,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.output.cancel();
        self.input.cancel();
    }
}

/// Explicit session context shared by every controller. Cheap to clone.
#[derive(Clone)]
pub struct PracticeSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for PracticeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PracticeSession")
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}

impl PracticeSession {
    pub fn builder(services: Services) -> PracticeSessionBuilder {
        PracticeSessionBuilder::new(services)
    }

    /// Subscribe to runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.lock().config.clone()
    }

    /// Snapshot of the transcript messages in conversation order.
    #[must_use]
    pub fn transcript(&self) -> Vec<Message> {
        self.lock().transcript.messages().to_vec()
    }

    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.lock().transcript.get(id).cloned()
    }

    #[must_use]
    pub fn pivot_language(&self) -> &str {
        &self.inner.pivot_language
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let is_agent_speaking = self.inner.output.is_speaking();
        let is_listening = self.inner.input.is_listening();
        let selected_voice = self.inner.output.selected_voice();
        let state = self.lock();
        let is_ui_blocked = state.is_loading
            || state.is_loading_suggestion
            || (state.config.is_verbal() && is_agent_speaking)
            || state.pending_change.is_some();
        SessionStatus {
            config: state.config.clone(),
            message_count: state.transcript.len(),
            transcript_revision: state.transcript.revision(),
            is_loading: state.is_loading,
            is_loading_suggestion: state.is_loading_suggestion,
            is_loading_feedback: state.is_loading_feedback,
            is_agent_speaking,
            is_listening,
            capabilities: self.inner.capabilities,
            selected_voice,
            pending_change: state.pending_change.clone(),
            active_conversation_id: state.active_conversation.as_ref().map(|a| a.id.clone()),
            draft: state.draft.clone(),
            is_ui_blocked,
        }
    }

    // ── Speech ────────────────────────────────────────────────

    /// Every voice the platform reports.
    #[must_use]
    pub fn available_voices(&self) -> Vec<Voice> {
        self.inner.output.voices()
    }

    /// Voices sharing the base subtag of the session language.
    #[must_use]
    pub fn voices_for_language(&self) -> Vec<Voice> {
        let tag = self.config().language_tag();
        self.inner.output.voices_for_language(tag)
    }

    /// Choose a voice by URI. `None` selects the platform default.
    pub fn select_voice(&self, uri: Option<String>) {
        info!(voice = ?uri, "voice selected");
        self.inner.output.select_voice(uri);
    }

    pub fn on_voices_changed(&self, voices: Vec<Voice>) {
        self.inner.output.on_voices_changed(voices);
    }

    pub fn handle_synthesis_event(&self, event: &SynthesisEvent) {
        self.inner.output.handle_event(event);
    }

    /// Start capture in the session language, or stop it if listening.
    pub fn toggle_capture(&self) -> Result<bool> {
        let tag = self
            .config()
            .language_tag()
            .map_or_else(|| self.inner.fallback_capture_tag.clone(), str::to_owned);
        self.inner.input.toggle_capture(&tag)
    }

    /// Apply a capture event. A verbal-mode result is submitted as a turn.
    pub async fn handle_capture_event(&self, event: &CaptureEvent) -> Result<Option<TurnOutcome>> {
        let mode = self.config().interaction_mode.unwrap_or_default();
        match self.inner.input.handle_event(event, mode) {
            CaptureOutcome::Submit(text) => {
                self.set_draft(String::new());
                self.submit_user_turn(&text).await.map(Some)
            }
            CaptureOutcome::AppendToDraft(text) => {
                let draft = {
                    let mut state = self.lock();
                    if !state.draft.is_empty() && !state.draft.ends_with(' ') {
                        state.draft.push(' ');
                    }
                    state.draft.push_str(&text);
                    state.draft.clone()
                };
                self.publish(RuntimeEvent::DraftChanged { text: draft });
                Ok(None)
            }
            CaptureOutcome::Ignored => Ok(None),
        }
    }

    /// Stop speech output and capture.
    pub fn cancel_speech(&self) {
        self.inner.output.cancel();
        self.inner.input.cancel();
    }

    #[must_use]
    pub fn is_agent_speaking(&self) -> bool {
        self.inner.output.is_speaking()
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.inner.input.is_listening()
    }

    // ── Draft ─────────────────────────────────────────────────

    #[must_use]
    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    pub fn set_draft(&self, text: String) {
        let changed = {
            let mut state = self.lock();
            if state.draft == text {
                false
            } else {
                state.draft.clone_from(&text);
                true
            }
        };
        if changed {
            self.publish(RuntimeEvent::DraftChanged { text });
        }
    }

    // ── Internals shared by the controllers ───────────────────

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn publish(&self, event: RuntimeEvent) {
        let _ = self.inner.events.send(event);
    }

    fn notify(&self, notification: Notification) {
        debug!(title = %notification.title, "notification");
        self.publish(RuntimeEvent::Notification(notification));
    }

    fn notify_selection_missing(&self) {
        self.notify(Notification::error(
            "Selection Missing",
            "Please select language, scenario, and interaction mode.",
        ));
    }

    /// Append to the transcript and hand agent messages to speech output.
    ///
    /// Returns `false` (and appends nothing) when `generation` is stale.
    fn append_message(&self, message: Message, generation: Option<u64>) -> bool {
        let speak = {
            let mut state = self.lock();
            if generation.is_some_and(|g| g != state.generation) {
                return false;
            }
            if !state.transcript.append(message.clone()) {
                return false;
            }
            (message.speaker() == Speaker::Agent && state.config.is_verbal())
                .then(|| state.config.language_tag())
        };
        self.publish(RuntimeEvent::MessageAppended(message.clone()));
        if let Some(tag) = speak {
            self.inner.output.speak(message.text(), tag);
        }
        true
    }

    /// Patch a message in place. `None` if the id is not in the transcript.
    fn patch_message(&self, id: MessageId, patch: &MessagePatch) -> Option<Message> {
        let updated = self.lock().transcript.patch(id, patch).cloned();
        if let Some(message) = &updated {
            self.publish(RuntimeEvent::MessageUpdated(message.clone()));
        }
        updated
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn begin_loading(&self, flag: BusyFlag) -> LoadingGuard {
        *self.lock().busy_flag(flag) = true;
        self.publish(RuntimeEvent::Busy { flag, active: true });
        LoadingGuard {
            session: self.clone(),
            flag,
        }
    }

    fn ensure_no_pending_change(&self) -> Result<()> {
        if self.lock().pending_change.is_some() {
            return Err(PracticeError::ConfirmationPending);
        }
        Ok(())
    }
}

/// Clears a busy flag when dropped, whatever way the operation ended.
struct LoadingGuard {
    session: PracticeSession,
    flag: BusyFlag,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        *self.session.lock().busy_flag(self.flag) = false;
        self.session.publish(RuntimeEvent::Busy {
            flag: self.flag,
            active: false,
        });
    }
}

/// Builder for [`PracticeSession`].
pub struct PracticeSessionBuilder {
    services: Services,
    config: SessionConfig,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    capabilities: SpeechCapabilities,
    store: Option<Arc<dyn ConversationStore>>,
    events: Option<broadcast::Sender<RuntimeEvent>>,
    pivot_language: String,
    fallback_capture_tag: String,
}

impl PracticeSessionBuilder {
    fn new(services: Services) -> Self {
        Self {
            services,
            config: SessionConfig::default(),
            synthesizer: None,
            recognizer: None,
            capabilities: SpeechCapabilities::default(),
            store: None,
            events: None,
            pivot_language: catalog::PIVOT_LANGUAGE.to_owned(),
            fallback_capture_tag: "en-US".to_owned(),
        }
    }

    /// Take initial selections, capabilities and pivot language from `app`.
    #[must_use]
    pub fn app_config(mut self, app: &AppConfig) -> Self {
        self.config = SessionConfig {
            language: app.session.language.clone(),
            scenario: app.session.scenario.clone(),
            interaction_mode: app.session.interaction_mode,
        };
        self.capabilities = app.speech.capabilities();
        self.pivot_language.clone_from(&app.session.pivot_language);
        self.fallback_capture_tag
            .clone_from(&app.speech.fallback_capture_tag);
        self
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    #[must_use]
    pub fn recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    #[must_use]
    pub fn capabilities(mut self, capabilities: SpeechCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Publish on an existing channel (e.g. one shared with a speech bridge).
    #[must_use]
    pub fn events(mut self, events: broadcast::Sender<RuntimeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn pivot_language(mut self, language: impl Into<String>) -> Self {
        self.pivot_language = language.into();
        self
    }

    pub fn build(self) -> PracticeSession {
        let events = self
            .events
            .unwrap_or_else(|| broadcast::channel(EVENT_CAPACITY).0);
        let synthesizer = self
            .synthesizer
            .unwrap_or_else(|| Arc::new(MemorySynthesizer::default()));
        let recognizer = self
            .recognizer
            .unwrap_or_else(|| Arc::new(MemoryRecognizer::default()));
        info!(
            synthesis = self.capabilities.synthesis,
            capture = self.capabilities.capture,
            "speech capabilities resolved"
        );
        let output =
            SpeechOutputCoordinator::new(synthesizer, self.capabilities.synthesis, events.clone());
        let input =
            SpeechInputCoordinator::new(recognizer, self.capabilities.capture, events.clone());
        PracticeSession {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    config: self.config,
                    transcript: Transcript::new(),
                    generation: 0,
                    is_loading: false,
                    is_loading_suggestion: false,
                    is_loading_feedback: false,
                    draft: String::new(),
                    pending_change: None,
                    active_conversation: None,
                }),
                services: self.services,
                output,
                input,
                capabilities: self.capabilities,
                store: self.store,
                events,
                pivot_language: self.pivot_language,
                fallback_capture_tag: self.fallback_capture_tag,
            }),
        }
    }
}
