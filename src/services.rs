//! Collaborator service contracts.
//!
//! The language work (agent replies, suggestions, translation, grammar and
//! skills feedback) is delegated to external collaborators. Each one is a
//! small async trait taking a wire-shaped request and returning a
//! wire-shaped response. The [`llm`](crate::llm) module provides an HTTP
//! implementation; [`ScriptedServices`] provides a deterministic one.

use crate::transcript::{Message, Speaker};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Stable error codes for collaborator failures.
pub mod error_codes {
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";
    pub const EMPTY_RESPONSE: &str = "EMPTY_RESPONSE";
    pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
    pub const TIMEOUT: &str = "TIMEOUT";
}

/// Errors produced by collaborator services.
///
/// Controllers normalise every variant into the same failure path; the
/// distinction only matters for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    Request(String),

    #[error("[{}] {}", error_codes::EMPTY_RESPONSE, .0)]
    EmptyResponse(String),

    #[error("[{}] {}", error_codes::INVALID_PAYLOAD, .0)]
    InvalidPayload(String),

    #[error("[{}] {}", error_codes::TIMEOUT, .0)]
    Timeout(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Request(_) => error_codes::REQUEST_FAILED,
            Self::EmptyResponse(_) => error_codes::EMPTY_RESPONSE,
            Self::InvalidPayload(_) => error_codes::INVALID_PAYLOAD,
            Self::Timeout(_) => error_codes::TIMEOUT,
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

// ── Wire types ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub language: String,
    pub scenario: String,
    pub user_input: String,
    pub conversation_history: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReply {
    #[serde(default)]
    pub agent_response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub language: String,
    pub conversation_history: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionReply {
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub text_to_translate: String,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationReply {
    #[serde(default)]
    pub translated_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarRequest {
    pub text_to_check: String,
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarReply {
    #[serde(default)]
    pub feedback: String,
}

/// A structured transcript line for the skills-feedback collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            speaker: message.speaker(),
            text: message.text().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub language: String,
    pub scenario: String,
    pub conversation_history: Vec<HistoryEntry>,
}

/// End-of-conversation feedback on the learner's skills.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillFeedback {
    #[serde(default)]
    pub grammar: String,
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default)]
    pub vocabulary: String,
    #[serde(default)]
    pub overall: String,
}

impl SkillFeedback {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.grammar,
            &self.pronunciation,
            &self.vocabulary,
            &self.overall,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }
}

// ── Traits ────────────────────────────────────────────────────

#[async_trait]
pub trait AgentService: Send + Sync {
    /// Produce the agent's next in-language reply.
    async fn respond(&self, request: &AgentRequest) -> ServiceResult<AgentReply>;
}

#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// Suggest something the learner could say next (sandbox scenario).
    async fn suggest(&self, request: &SuggestionRequest) -> ServiceResult<SuggestionReply>;
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> ServiceResult<TranslationReply>;
}

#[async_trait]
pub trait GrammarService: Send + Sync {
    async fn check_grammar(&self, request: &GrammarRequest) -> ServiceResult<GrammarReply>;
}

#[async_trait]
pub trait FeedbackService: Send + Sync {
    async fn feedback(&self, request: &FeedbackRequest) -> ServiceResult<SkillFeedback>;
}

/// The full set of collaborators a session talks to.
#[derive(Clone)]
pub struct Services {
    pub agent: Arc<dyn AgentService>,
    pub suggestion: Arc<dyn SuggestionService>,
    pub translation: Arc<dyn TranslationService>,
    pub grammar: Arc<dyn GrammarService>,
    pub feedback: Arc<dyn FeedbackService>,
}

impl Services {
    /// Use one backend for every collaborator.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AgentService
            + SuggestionService
            + TranslationService
            + GrammarService
            + FeedbackService
            + 'static,
    {
        Self {
            agent: backend.clone(),
            suggestion: backend.clone(),
            translation: backend.clone(),
            grammar: backend.clone(),
            feedback: backend,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

// ── Scripted collaborators ────────────────────────────────────

enum Step<T> {
    Ready(ServiceResult<T>),
    Gated(oneshot::Receiver<ServiceResult<T>>),
}

/// A queue of canned replies for one collaborator, plus a log of requests.
///
/// When the queue is empty the collaborator fails with
/// [`ServiceError::Request`]. Gated steps hold the call open until the
/// returned sender is resolved, which lets callers control completion order.
pub struct Script<Req, Resp> {
    steps: Mutex<VecDeque<Step<Resp>>>,
    requests: Mutex<Vec<Req>>,
}

impl<Req: Clone, Resp> Script<Req, Resp> {
    fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_ok(&self, reply: Resp) {
        self.push(Step::Ready(Ok(reply)));
    }

    pub fn push_err(&self, error: ServiceError) {
        self.push(Step::Ready(Err(error)));
    }

    /// Queue a reply that resolves only when the returned sender fires.
    pub fn push_gate(&self) -> oneshot::Sender<ServiceResult<Resp>> {
        let (tx, rx) = oneshot::channel();
        self.push(Step::Gated(rx));
        tx
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<Req> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn push(&self, step: Step<Resp>) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
    }

    async fn call(&self, request: &Req) -> ServiceResult<Resp> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let step = self.steps.lock().ok().and_then(|mut s| s.pop_front());
        match step {
            Some(Step::Ready(result)) => result,
            Some(Step::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(ServiceError::Request("scripted gate dropped".into()))),
            None => Err(ServiceError::Request("no scripted reply queued".into())),
        }
    }
}

/// Deterministic collaborators backed by [`Script`] queues.
pub struct ScriptedServices {
    pub agent: Script<AgentRequest, AgentReply>,
    pub suggestion: Script<SuggestionRequest, SuggestionReply>,
    pub translation: Script<TranslationRequest, TranslationReply>,
    pub grammar: Script<GrammarRequest, GrammarReply>,
    pub feedback: Script<FeedbackRequest, SkillFeedback>,
}

impl ScriptedServices {
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: Script::new(),
            suggestion: Script::new(),
            translation: Script::new(),
            grammar: Script::new(),
            feedback: Script::new(),
        }
    }

    pub fn push_agent_reply(&self, text: impl Into<String>) {
        self.agent.push_ok(AgentReply {
            agent_response: text.into(),
        });
    }

    pub fn push_translation(&self, text: impl Into<String>) {
        self.translation.push_ok(TranslationReply {
            translated_text: text.into(),
        });
    }

    pub fn push_grammar_feedback(&self, text: impl Into<String>) {
        self.grammar.push_ok(GrammarReply {
            feedback: text.into(),
        });
    }

    pub fn push_suggestion(&self, text: impl Into<String>) {
        self.suggestion.push_ok(SuggestionReply {
            suggestion: text.into(),
        });
    }
}

impl Default for ScriptedServices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentService for ScriptedServices {
    async fn respond(&self, request: &AgentRequest) -> ServiceResult<AgentReply> {
        self.agent.call(request).await
    }
}

#[async_trait]
impl SuggestionService for ScriptedServices {
    async fn suggest(&self, request: &SuggestionRequest) -> ServiceResult<SuggestionReply> {
        self.suggestion.call(request).await
    }
}

#[async_trait]
impl TranslationService for ScriptedServices {
    async fn translate(&self, request: &TranslationRequest) -> ServiceResult<TranslationReply> {
        self.translation.call(request).await
    }
}

#[async_trait]
impl GrammarService for ScriptedServices {
    async fn check_grammar(&self, request: &GrammarRequest) -> ServiceResult<GrammarReply> {
        self.grammar.call(request).await
    }
}

#[async_trait]
impl FeedbackService for ScriptedServices {
    async fn feedback(&self, request: &FeedbackRequest) -> ServiceResult<SkillFeedback> {
        self.feedback.call(request).await
    }
}
