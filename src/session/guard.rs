//! Configuration-change guard.
//!
//! Changing language, scenario or interaction mode invalidates the
//! conversation. With an empty transcript a change applies at once; otherwise
//! it waits in a single pending slot until the user confirms or cancels.
//! Applying a change resets the transcript and any speech activity.

use super::{PracticeSession, SessionConfig};
use crate::catalog::InteractionMode;
use crate::error::{PracticeError, Result};
use crate::runtime::RuntimeEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigField {
    Language,
    Scenario,
    InteractionMode,
}

/// A new value for one configuration field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ConfigChange {
    Language(String),
    Scenario(String),
    InteractionMode(InteractionMode),
}

impl ConfigChange {
    #[must_use]
    pub fn field(&self) -> ConfigField {
        match self {
            Self::Language(_) => ConfigField::Language,
            Self::Scenario(_) => ConfigField::Scenario,
            Self::InteractionMode(_) => ConfigField::InteractionMode,
        }
    }

    /// Whether `config` already holds this value.
    #[must_use]
    pub fn is_current(&self, config: &SessionConfig) -> bool {
        match self {
            Self::Language(v) => config.language.as_deref() == Some(v.as_str()),
            Self::Scenario(v) => config.scenario.as_deref() == Some(v.as_str()),
            Self::InteractionMode(v) => config.interaction_mode == Some(*v),
        }
    }

    fn apply_to(&self, config: &mut SessionConfig) {
        match self {
            Self::Language(v) => config.language = Some(v.clone()),
            Self::Scenario(v) => config.scenario = Some(v.clone()),
            Self::InteractionMode(v) => config.interaction_mode = Some(*v),
        }
    }
}

/// A change waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub change: ConfigChange,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The value was already current, or nothing was pending.
    Unchanged,
    /// Applied; carries the new configuration.
    Applied(SessionConfig),
    /// Waiting for [`confirm_change`](PracticeSession::confirm_change) or
    /// [`cancel_change`](PracticeSession::cancel_change).
    PendingConfirmation(PendingChange),
}

impl PracticeSession {
    /// Request a configuration change.
    ///
    /// Fails with `ConfirmationPending` while another change awaits a decision.
    pub fn request_change(&self, change: ConfigChange) -> Result<ChangeOutcome> {
        let pending = {
            let mut state = self.lock();
            if state.pending_change.is_some() {
                return Err(PracticeError::ConfirmationPending);
            }
            if change.is_current(&state.config) {
                return Ok(ChangeOutcome::Unchanged);
            }
            if state.transcript.is_empty() {
                None
            } else {
                let pending = PendingChange {
                    change: change.clone(),
                    requested_at: Utc::now(),
                };
                state.pending_change = Some(pending.clone());
                Some(pending)
            }
        };
        match pending {
            None => Ok(ChangeOutcome::Applied(self.apply_change(&change))),
            Some(pending) => {
                info!(field = ?change.field(), "configuration change awaiting confirmation");
                self.publish(RuntimeEvent::ConfirmationRequested(pending.clone()));
                Ok(ChangeOutcome::PendingConfirmation(pending))
            }
        }
    }

    /// Apply the pending change, if any.
    pub fn confirm_change(&self) -> ChangeOutcome {
        let Some(pending) = self.lock().pending_change.take() else {
            return ChangeOutcome::Unchanged;
        };
        info!(field = ?pending.change.field(), "configuration change confirmed");
        ChangeOutcome::Applied(self.apply_change(&pending.change))
    }

    /// Discard the pending change. Nothing else is touched.
    pub fn cancel_change(&self) -> Option<PendingChange> {
        let pending = self.lock().pending_change.take()?;
        info!(field = ?pending.change.field(), "configuration change cancelled");
        self.publish(RuntimeEvent::ConfirmationCancelled(pending.clone()));
        Some(pending)
    }

    #[must_use]
    pub fn pending_change(&self) -> Option<PendingChange> {
        self.lock().pending_change.clone()
    }

    /// Apply `change` and reset the conversation.
    fn apply_change(&self, change: &ConfigChange) -> SessionConfig {
        let config = {
            let mut state = self.lock();
            change.apply_to(&mut state.config);
            state.reset_transcript();
            state.active_conversation = None;
            state.config.clone()
        };
        self.cancel_speech();
        if change.field() == ConfigField::Language {
            self.select_voice(None);
        }
        info!(
            language = ?config.language,
            scenario = ?config.scenario,
            mode = ?config.interaction_mode,
            "configuration applied"
        );
        self.publish(RuntimeEvent::TranscriptCleared);
        self.publish(RuntimeEvent::ConfigurationApplied(config.clone()));
        config
    }
}
