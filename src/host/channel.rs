//! Host command channel and router for frontend integrations.
//!
//! Each request is routed on its own task so long-running commands (agent
//! turns, enrichment) overlap and complete in whatever order the
//! collaborators answer. Every session [`RuntimeEvent`] is forwarded to the
//! event stream as an [`EventEnvelope`].

use crate::error::{PracticeError, Result};
use crate::host::contract::{
    CommandEnvelope, CommandName, EVENT_VERSION, EventEnvelope, ResponseEnvelope,
};
use crate::runtime::RuntimeEvent;
use crate::session::{
    ChangeOutcome, ConfigChange, EnrichmentOutcome, PracticeSession, SuggestionOutcome,
    TurnOutcome,
};
use crate::speech::platform::{CaptureEvent, SynthesisEvent, Voice};
use crate::transcript::MessageId;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<ResponseEnvelope>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostCommandClient {
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate().map_err(|e| {
            PracticeError::InvalidRequest(format!(
                "invalid host command envelope {}: {}",
                envelope.request_id, e
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| {
                PracticeError::Channel(format!("failed to send host command request: {e}"))
            })?;

        response_rx
            .await
            .map_err(|e| PracticeError::Channel(format!("host command response dropped: {e}")))
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }
}

pub struct HostCommandServer {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
    router: HostRouter,
}

#[must_use]
pub fn command_channel(
    request_capacity: usize,
    event_capacity: usize,
    session: PracticeSession,
) -> (HostCommandClient, HostCommandServer) {
    let (event_tx, _event_rx) = broadcast::channel(event_capacity.max(1));
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));

    (
        HostCommandClient {
            request_tx,
            event_tx: event_tx.clone(),
        },
        HostCommandServer {
            request_rx,
            event_tx,
            router: HostRouter { session },
        },
    )
}

impl HostCommandServer {
    /// Serve requests until every client is dropped.
    pub async fn run(mut self) {
        let shutdown = CancellationToken::new();
        let forwarder = tokio::spawn(forward_runtime_events(
            self.router.session.subscribe(),
            self.event_tx.clone(),
            shutdown.clone(),
        ));

        while let Some(request) = self.request_rx.recv().await {
            let router = self.router.clone();
            tokio::spawn(async move {
                let response = router.dispatch(&request.envelope).await;
                let _ = request.response_tx.send(response);
            });
        }

        shutdown.cancel();
        let _ = forwarder.await;
    }
}

/// Republish session events as envelopes until `shutdown` fires.
async fn forward_runtime_events(
    mut rx: broadcast::Receiver<RuntimeEvent>,
    event_tx: broadcast::Sender<EventEnvelope>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => {
                    let _ = event_tx.send(EventEnvelope::from(&event));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged = n, "runtime event forwarder lagged; some events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("runtime event forwarder stopped");
}

/// Maps commands onto session operations.
#[derive(Clone)]
pub struct HostRouter {
    session: PracticeSession,
}

impl HostRouter {
    #[must_use]
    pub fn new(session: PracticeSession) -> Self {
        Self { session }
    }

    /// Route and convert failures into error envelopes carrying the request id.
    pub async fn dispatch(&self, envelope: &CommandEnvelope) -> ResponseEnvelope {
        match self.route(envelope).await {
            Ok(payload) => ResponseEnvelope::ok(envelope.request_id.clone(), payload),
            Err(e) => {
                debug!(command = envelope.command.as_str(), error = %e, "host command failed");
                ResponseEnvelope::error(envelope.request_id.clone(), e.to_string())
            }
        }
    }

    /// Route a command envelope to the matching session operation.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let session = &self.session;
        match envelope.command {
            CommandName::HostPing => Ok(serde_json::json!({"pong": true})),
            CommandName::HostVersion => Ok(serde_json::json!({
                "contract_version": EVENT_VERSION,
                "channel": "lingualive_host_v1",
                "version": env!("CARGO_PKG_VERSION"),
            })),
            CommandName::RuntimeStop => {
                info!("runtime stop requested");
                session.cancel_speech();
                Ok(serde_json::json!({"accepted": true}))
            }
            CommandName::SessionStatus => to_json(&session.status()),
            CommandName::SessionRequestChange => {
                let change: ConfigChange = parse_payload(envelope)?;
                Ok(change_outcome_json(session.request_change(change)?))
            }
            CommandName::SessionConfirmChange => Ok(change_outcome_json(session.confirm_change())),
            CommandName::SessionCancelChange => {
                let cancelled = session.cancel_change();
                Ok(serde_json::json!({
                    "cancelled": cancelled.is_some(),
                    "pending": cancelled,
                }))
            }
            CommandName::TurnSubmit => {
                let TextPayload { text } = parse_payload(envelope)?;
                Ok(turn_json(&session.submit_user_turn(&text).await?))
            }
            CommandName::MessageTranslate => {
                let MessagePayload { message_id } = parse_payload(envelope)?;
                Ok(enrichment_json(message_id, session.translate_message(message_id).await))
            }
            CommandName::MessageCheckGrammar => {
                let MessagePayload { message_id } = parse_payload(envelope)?;
                Ok(enrichment_json(
                    message_id,
                    session.check_message_grammar(message_id).await,
                ))
            }
            CommandName::SuggestionGet => Ok(match session.get_suggestion().await? {
                SuggestionOutcome::Suggested(text) => {
                    serde_json::json!({"outcome": "suggested", "suggestion": text})
                }
                SuggestionOutcome::Failed => serde_json::json!({"outcome": "failed"}),
                SuggestionOutcome::NotSandbox => serde_json::json!({"outcome": "not_sandbox"}),
            }),
            CommandName::FeedbackGet => to_json(&session.request_feedback().await?),
            CommandName::SpeechVoicesChanged => {
                let VoicesPayload { voices } = parse_payload(envelope)?;
                let count = voices.len();
                session.on_voices_changed(voices);
                Ok(serde_json::json!({"accepted": true, "count": count}))
            }
            CommandName::SpeechSelectVoice => {
                let SelectVoicePayload { voice_uri } = parse_payload(envelope)?;
                session.select_voice(voice_uri.clone());
                Ok(serde_json::json!({"accepted": true, "voice_uri": voice_uri}))
            }
            CommandName::SpeechSynthesisEvent => {
                let event: SynthesisEvent = parse_payload(envelope)?;
                session.handle_synthesis_event(&event);
                Ok(serde_json::json!({"accepted": true}))
            }
            CommandName::SpeechCaptureToggle => {
                let listening = session.toggle_capture()?;
                Ok(serde_json::json!({"listening": listening}))
            }
            CommandName::SpeechCaptureEvent => {
                let event: CaptureEvent = parse_payload(envelope)?;
                let turn = session.handle_capture_event(&event).await?;
                Ok(serde_json::json!({
                    "submitted": turn.is_some(),
                    "turn": turn.as_ref().map(turn_json),
                }))
            }
            CommandName::SpeechCancel => {
                session.cancel_speech();
                Ok(serde_json::json!({"accepted": true}))
            }
            CommandName::ConversationSave => {
                let SavePayload { name } = parse_optional_payload(envelope)?;
                to_json(&session.save_conversation(name.as_deref()).await?)
            }
            CommandName::ConversationList => {
                let conversations = session.list_conversations().await?;
                Ok(serde_json::json!({"conversations": conversations}))
            }
            CommandName::ConversationLoad => {
                let IdPayload { id } = parse_payload(envelope)?;
                let conversation = session.load_conversation(&id).await?;
                Ok(serde_json::json!({"conversation": conversation}))
            }
            CommandName::ConversationNew => {
                session.new_conversation()?;
                Ok(serde_json::json!({"accepted": true}))
            }
            CommandName::ConversationDelete => {
                let IdPayload { id } = parse_payload(envelope)?;
                session.delete_conversation(&id).await?;
                Ok(serde_json::json!({"accepted": true, "id": id}))
            }
        }
    }
}

#[derive(Deserialize)]
struct TextPayload {
    text: String,
}

#[derive(Deserialize)]
struct MessagePayload {
    message_id: MessageId,
}

#[derive(Deserialize)]
struct VoicesPayload {
    voices: Vec<Voice>,
}

#[derive(Deserialize)]
struct SelectVoicePayload {
    #[serde(default)]
    voice_uri: Option<String>,
}

#[derive(Deserialize, Default)]
struct SavePayload {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

fn parse_payload<T: DeserializeOwned>(envelope: &CommandEnvelope) -> Result<T> {
    serde_json::from_value(envelope.payload.clone()).map_err(|e| {
        PracticeError::InvalidRequest(format!(
            "{} has an invalid payload: {e}",
            envelope.command.as_str()
        ))
    })
}

/// Like [`parse_payload`], but an absent payload means all defaults.
fn parse_optional_payload<T: DeserializeOwned + Default>(envelope: &CommandEnvelope) -> Result<T> {
    if envelope.payload.is_null() {
        return Ok(T::default());
    }
    parse_payload(envelope)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| PracticeError::Channel(format!("failed to serialize response: {e}")))
}

fn change_outcome_json(outcome: ChangeOutcome) -> serde_json::Value {
    match outcome {
        ChangeOutcome::Unchanged => serde_json::json!({"outcome": "unchanged"}),
        ChangeOutcome::Applied(config) => {
            serde_json::json!({"outcome": "applied", "config": config})
        }
        ChangeOutcome::PendingConfirmation(pending) => {
            serde_json::json!({"outcome": "pending_confirmation", "pending": pending})
        }
    }
}

fn turn_json(turn: &TurnOutcome) -> serde_json::Value {
    serde_json::json!({
        "user_message": turn.user_message,
        "agent_message": turn.agent_message,
        "used_fallback": turn.used_fallback,
    })
}

fn enrichment_json(message_id: MessageId, outcome: EnrichmentOutcome) -> serde_json::Value {
    match outcome {
        EnrichmentOutcome::Applied(text) => {
            serde_json::json!({"message_id": message_id, "outcome": "applied", "text": text})
        }
        EnrichmentOutcome::Failed => {
            serde_json::json!({"message_id": message_id, "outcome": "failed"})
        }
        EnrichmentOutcome::Skipped => {
            serde_json::json!({"message_id": message_id, "outcome": "skipped"})
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::session::test_support::{Harness, french_written};

    fn make_envelope(command: CommandName, payload: serde_json::Value) -> CommandEnvelope {
        CommandEnvelope::new("req-1", command, payload)
    }

    #[tokio::test]
    async fn ping_and_version() {
        let h = Harness::new(french_written());
        let router = HostRouter::new(h.session.clone());
        let resp = router
            .dispatch(&make_envelope(CommandName::HostPing, serde_json::json!({})))
            .await;
        assert!(resp.ok);
        assert_eq!(resp.payload["pong"], true);

        let resp = router
            .dispatch(&make_envelope(CommandName::HostVersion, serde_json::Value::Null))
            .await;
        assert_eq!(resp.payload["contract_version"], EVENT_VERSION);
    }

    #[tokio::test]
    async fn turn_submit_returns_both_messages() {
        let h = Harness::new(french_written());
        h.services.push_agent_reply("Salut !");
        let router = HostRouter::new(h.session.clone());
        let resp = router
            .dispatch(&make_envelope(
                CommandName::TurnSubmit,
                serde_json::json!({"text": "Bonjour"}),
            ))
            .await;
        assert!(resp.ok, "{:?}", resp.error);
        assert_eq!(resp.payload["user_message"]["text"], "Bonjour");
        assert_eq!(resp.payload["agent_message"]["text"], "Salut !");
        assert_eq!(resp.payload["used_fallback"], false);
    }

    #[tokio::test]
    async fn missing_field_is_an_error_envelope() {
        let h = Harness::new(french_written());
        let router = HostRouter::new(h.session.clone());
        let resp = router
            .dispatch(&make_envelope(CommandName::TurnSubmit, serde_json::json!({})))
            .await;
        assert!(!resp.ok);
        assert_eq!(resp.request_id, "req-1");
        assert!(resp.error.unwrap().contains("turn.submit"));
    }

    #[tokio::test]
    async fn request_change_uses_field_value_payload() {
        let h = Harness::new(french_written());
        let router = HostRouter::new(h.session.clone());
        let resp = router
            .dispatch(&make_envelope(
                CommandName::SessionRequestChange,
                serde_json::json!({"field": "language", "value": "German"}),
            ))
            .await;
        assert!(resp.ok, "{:?}", resp.error);
        assert_eq!(resp.payload["outcome"], "applied");
        assert_eq!(resp.payload["config"]["language"], "German");
    }

    #[tokio::test]
    async fn translate_unknown_message_is_skipped() {
        let h = Harness::new(french_written());
        let router = HostRouter::new(h.session.clone());
        let id = MessageId::new();
        let resp = router
            .dispatch(&make_envelope(
                CommandName::MessageTranslate,
                serde_json::json!({"message_id": id}),
            ))
            .await;
        assert!(resp.ok);
        assert_eq!(resp.payload["outcome"], "skipped");
    }

    #[tokio::test]
    async fn save_rejected_on_empty_transcript() {
        let h = Harness::new(french_written());
        let router = HostRouter::new(h.session.clone());
        let resp = router
            .dispatch(&make_envelope(CommandName::ConversationList, serde_json::Value::Null))
            .await;
        assert!(resp.ok, "{:?}", resp.error);
        assert_eq!(resp.payload["conversations"], serde_json::json!([]));

        let resp = router
            .dispatch(&make_envelope(CommandName::ConversationSave, serde_json::Value::Null))
            .await;
        assert!(!resp.ok);
        assert_eq!(resp.error.as_deref(), Some("empty input"));
    }

    #[tokio::test]
    async fn server_forwards_runtime_events() {
        let h = Harness::new(french_written());
        let (client, server) = command_channel(8, 64, h.session.clone());
        let mut events = client.subscribe_events();
        let server_handle = tokio::spawn(server.run());

        h.services.push_agent_reply("Salut");
        let resp = client
            .send(make_envelope(
                CommandName::TurnSubmit,
                serde_json::json!({"text": "Bonjour"}),
            ))
            .await
            .unwrap();
        assert!(resp.ok);

        let mut names = Vec::new();
        while names.iter().filter(|n| *n == "transcript.appended").count() < 2 {
            let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
                .await
                .expect("event forwarded in time")
                .unwrap();
            names.push(event.event);
        }
        assert!(names.iter().any(|n| n == "session.busy"));

        drop(client);
        server_handle.await.unwrap();
    }
}
