//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! This binary reads `CommandEnvelope` messages as newline-delimited JSON
//! from stdin, dispatches them to a practice session, and writes
//! `ResponseEnvelope` and `EventEnvelope` messages to stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use lingualive::config::AppConfig;
use lingualive::host::{BridgeSpeechPlatform, run_stdio_bridge};
use lingualive::llm::HttpBackend;
use lingualive::services::Services;
use lingualive::session::PracticeSession;
use lingualive::storage::FsConversationStore;
use lingualive::{app_dirs, logging};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = AppConfig::default_config_path();
    let config = AppConfig::load_or_default(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", config_path.display()))?;

    let _log_guard = logging::init(&config.logging, &app_dirs::logs_dir())?;
    tracing::info!(config = %config_path.display(), "lingualive-host starting");

    let backend = Arc::new(HttpBackend::new(config.backend.clone())?);
    let store = Arc::new(FsConversationStore::new(
        config.storage.effective_conversations_dir(),
    )?);

    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let platform = Arc::new(BridgeSpeechPlatform::new(events.clone()));
    let session = PracticeSession::builder(Services::from_backend(backend))
        .app_config(&config)
        .synthesizer(platform.clone())
        .recognizer(platform)
        .store(store)
        .events(events)
        .build();

    run_stdio_bridge(session).await.map_err(|e| {
        tracing::error!(error = %e, "lingualive-host exited with error");
        anyhow::anyhow!("lingualive-host failed: {e}")
    })?;

    tracing::info!("lingualive-host shut down cleanly");
    Ok(())
}
