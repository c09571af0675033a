//! Chat completions client implementing every collaborator trait.

use super::prompts::{self, Prompt};
use super::reply::parse_reply;
use crate::config::BackendConfig;
use crate::error::{PracticeError, Result};
use crate::services::{
    AgentReply, AgentRequest, AgentService, FeedbackRequest, FeedbackService, GrammarReply,
    GrammarRequest, GrammarService, ServiceError, ServiceResult, SkillFeedback, SuggestionReply,
    SuggestionRequest, SuggestionService, TranslationReply, TranslationRequest,
    TranslationService,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Non-streaming client for `POST {base_url}/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpBackend {
    /// Build a client from configuration. The API key is read from the
    /// configured environment variable once, here.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PracticeError::Config(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!(
            "{}/v1/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let api_key = config.api_key();
        info!(endpoint = %endpoint, model = %config.model, auth = api_key.is_some(), "HTTP backend configured");
        Ok(Self {
            client,
            config,
            endpoint,
            api_key,
        })
    }

    /// Override the API key (e.g. from a secret store).
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": false,
            "response_format": { "type": "json_object" },
        })
    }

    /// Send one prompt and return the assistant message content.
    async fn complete(&self, collaborator: &'static str, prompt: &Prompt) -> ServiceResult<String> {
        let started = Instant::now();
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(collaborator, status = status.as_u16(), "backend returned an error status");
            return Err(ServiceError::Request(format!(
                "HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&body)
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidPayload(format!("response was not JSON: {e}")))?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();
        debug!(
            collaborator,
            elapsed_ms = started.elapsed().as_millis() as u64,
            len = content.len(),
            "backend replied"
        );
        Ok(content)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        collaborator: &'static str,
        prompt: Prompt,
        plain_field: Option<&str>,
    ) -> ServiceResult<T> {
        let content = self.complete(collaborator, &prompt).await?;
        parse_reply(&content, plain_field)
    }
}

fn map_transport_error(e: &reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(format!("request timed out: {e}"))
    } else {
        ServiceError::Request(format!("request failed: {e}"))
    }
}

/// Pull `error.message` out of an OpenAI-style error body, else the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

fn require_text(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::EmptyResponse(format!("{field} was empty")));
    }
    Ok(())
}

#[async_trait]
impl AgentService for HttpBackend {
    async fn respond(&self, request: &AgentRequest) -> ServiceResult<AgentReply> {
        let reply: AgentReply = self
            .call("agent", prompts::agent(request), Some("agentResponse"))
            .await?;
        require_text("agentResponse", &reply.agent_response)?;
        Ok(reply)
    }
}

#[async_trait]
impl SuggestionService for HttpBackend {
    async fn suggest(&self, request: &SuggestionRequest) -> ServiceResult<SuggestionReply> {
        let reply: SuggestionReply = self
            .call("suggestion", prompts::suggestion(request), Some("suggestion"))
            .await?;
        require_text("suggestion", &reply.suggestion)?;
        Ok(reply)
    }
}

#[async_trait]
impl TranslationService for HttpBackend {
    async fn translate(&self, request: &TranslationRequest) -> ServiceResult<TranslationReply> {
        let reply: TranslationReply = self
            .call("translation", prompts::translation(request), Some("translatedText"))
            .await?;
        require_text("translatedText", &reply.translated_text)?;
        Ok(reply)
    }
}

#[async_trait]
impl GrammarService for HttpBackend {
    async fn check_grammar(&self, request: &GrammarRequest) -> ServiceResult<GrammarReply> {
        let reply: GrammarReply = self
            .call("grammar", prompts::grammar(request), Some("feedback"))
            .await?;
        require_text("feedback", &reply.feedback)?;
        Ok(reply)
    }
}

#[async_trait]
impl FeedbackService for HttpBackend {
    async fn feedback(&self, request: &FeedbackRequest) -> ServiceResult<SkillFeedback> {
        let reply: SkillFeedback = self
            .call("feedback", prompts::feedback(request), None)
            .await?;
        if reply.is_empty() {
            return Err(ServiceError::EmptyResponse("feedback was empty".into()));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let backend = HttpBackend::new(BackendConfig {
            base_url: "http://localhost:8080/".into(),
            ..BackendConfig::default()
        })
        .unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn request_body_asks_for_json() {
        let backend = HttpBackend::new(BackendConfig::default()).unwrap();
        let body = backend.request_body(&Prompt {
            system: "s".into(),
            user: "u".into(),
        });
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][1]["content"], "u");
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"model not found"}}"#),
            "model not found"
        );
        assert_eq!(extract_error_message("bad gateway"), "bad gateway");
    }
}
