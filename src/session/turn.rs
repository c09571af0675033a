//! Turn controller: one user message in, one agent message out.

use super::{PracticeSession, ResolvedConfig};
use crate::catalog::InteractionMode;
use crate::error::{PracticeError, Result};
use crate::runtime::{BusyFlag, Notification};
use crate::services::AgentRequest;
use crate::transcript::Message;
use tracing::{debug, error, info, warn};

/// Agent message appended when the agent service fails or replies empty.
pub const FALLBACK_AGENT_REPLY: &str =
    "I'm sorry, I encountered an error. Could you please try rephrasing or try again later?";

/// Result of [`PracticeSession::submit_user_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub user_message: Message,
    /// `None` when the transcript was reset while the agent was replying.
    pub agent_message: Option<Message>,
    /// The agent message is the fallback apology.
    pub used_fallback: bool,
}

impl PracticeSession {
    /// Submit a user turn and wait for the agent's reply.
    ///
    /// Callers are expected to block new submissions while a turn is in
    /// flight (see [`SessionStatus::is_ui_blocked`](super::SessionStatus)).
    pub async fn submit_user_turn(&self, text: &str) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PracticeError::EmptyInput);
        }
        let config = match self.config().resolve() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "turn rejected");
                self.notify_selection_missing();
                return Err(e);
            }
        };

        if config.mode == InteractionMode::Verbal {
            self.inner.output.cancel();
        }
        self.set_draft(String::new());

        let generation = self.generation();
        self.run_turn(text, &config, generation).await
    }

    /// Append the user message for `generation` and fetch the agent reply.
    async fn run_turn(
        &self,
        text: &str,
        config: &ResolvedConfig,
        generation: u64,
    ) -> Result<TurnOutcome> {
        let user_message = Message::user(text, &config.language);
        if !self.append_message(user_message.clone(), Some(generation)) {
            debug!("transcript reset before the user message landed; turn abandoned");
            return Ok(TurnOutcome {
                user_message,
                agent_message: None,
                used_fallback: false,
            });
        }
        let _loading = self.begin_loading(BusyFlag::Turn);

        let request = AgentRequest {
            language: config.language.clone(),
            scenario: config.scenario.clone(),
            user_input: text.to_owned(),
            conversation_history: self.lock().transcript.history(),
        };
        info!(
            language = %config.language,
            scenario = %config.scenario,
            len = text.len(),
            "submitting user turn"
        );

        let (reply, used_fallback) = match self.inner.services.agent.respond(&request).await {
            Ok(reply) if !reply.agent_response.trim().is_empty() => {
                (reply.agent_response.trim().to_owned(), false)
            }
            Ok(_) => {
                warn!("agent returned an empty response");
                (FALLBACK_AGENT_REPLY.to_owned(), true)
            }
            Err(e) => {
                error!(error = %e, "agent response failed");
                (FALLBACK_AGENT_REPLY.to_owned(), true)
            }
        };

        let agent_message = Message::agent(reply, &config.language);
        let appended = self.append_message(agent_message.clone(), Some(generation));
        if !appended {
            info!("transcript reset during turn; dropping agent reply");
        } else if used_fallback {
            self.notify(Notification::error(
                "Error",
                "Failed to get a response from the AI. Please try again.",
            ));
        } else {
            info!(len = agent_message.text().len(), "agent replied");
        }

        Ok(TurnOutcome {
            user_message,
            agent_message: appended.then_some(agent_message),
            used_fallback,
        })
    }
}
