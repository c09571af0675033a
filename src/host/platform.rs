//! Speech platform that delegates to the frontend over the event stream.
//!
//! The bridge has no audio of its own. Requests become runtime events
//! (`speech.speak`, `speech.cancel_requested`, `capture.start`,
//! `capture.stop`) and the frontend reports progress back through
//! `speech.synthesis_event` / `speech.capture_event` commands.

use crate::error::Result;
use crate::runtime::RuntimeEvent;
use crate::speech::platform::{
    CaptureRequest, SpeechRecognizer, SpeechSynthesizer, UtteranceRequest, Voice,
};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BridgeSpeechPlatform {
    events: broadcast::Sender<RuntimeEvent>,
}

impl BridgeSpeechPlatform {
    #[must_use]
    pub fn new(events: broadcast::Sender<RuntimeEvent>) -> Self {
        Self { events }
    }

    fn emit(&self, event: RuntimeEvent) {
        debug!(event = event.name(), "forwarding speech request to frontend");
        // No subscriber just means no frontend is attached yet.
        let _ = self.events.send(event);
    }
}

impl SpeechSynthesizer for BridgeSpeechPlatform {
    /// Voices arrive later via `speech.voices_changed`.
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&self, request: &UtteranceRequest) -> Result<()> {
        self.emit(RuntimeEvent::SpeakRequested(request.clone()));
        Ok(())
    }

    fn cancel(&self) {
        self.emit(RuntimeEvent::SpeechCancelRequested);
    }
}

impl SpeechRecognizer for BridgeSpeechPlatform {
    fn start(&self, request: &CaptureRequest) -> Result<()> {
        self.emit(RuntimeEvent::CaptureRequested(request.clone()));
        Ok(())
    }

    fn stop(&self) {
        self.emit(RuntimeEvent::CaptureStopRequested);
    }
}
