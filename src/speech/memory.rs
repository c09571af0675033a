//! In-memory speech platform that records every request.
//!
//! Used by tests and by headless runs without a real speech backend.

use crate::error::{PracticeError, Result};
use crate::speech::platform::{
    CaptureRequest, SpeechRecognizer, SpeechSynthesizer, UtteranceRequest, Voice,
};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemorySynthesizer {
    voices: Mutex<Vec<Voice>>,
    spoken: Mutex<Vec<UtteranceRequest>>,
    cancels: Mutex<usize>,
    fail_with: Mutex<Option<String>>,
}

impl MemorySynthesizer {
    #[must_use]
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        Self {
            voices: Mutex::new(voices),
            ..Self::default()
        }
    }

    /// Make the next `speak` call fail with `error`.
    pub fn fail_next(&self, error: impl Into<String>) {
        *lock(&self.fail_with) = Some(error.into());
    }

    #[must_use]
    pub fn spoken(&self) -> Vec<UtteranceRequest> {
        lock(&self.spoken).clone()
    }

    #[must_use]
    pub fn cancel_count(&self) -> usize {
        *lock(&self.cancels)
    }
}

impl SpeechSynthesizer for MemorySynthesizer {
    fn voices(&self) -> Vec<Voice> {
        lock(&self.voices).clone()
    }

    fn speak(&self, request: &UtteranceRequest) -> Result<()> {
        if let Some(error) = lock(&self.fail_with).take() {
            return Err(PracticeError::SpeechPlatform(error));
        }
        lock(&self.spoken).push(request.clone());
        Ok(())
    }

    fn cancel(&self) {
        *lock(&self.cancels) += 1;
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecognizer {
    started: Mutex<Vec<CaptureRequest>>,
    stops: Mutex<usize>,
}

impl MemoryRecognizer {
    #[must_use]
    pub fn started(&self) -> Vec<CaptureRequest> {
        lock(&self.started).clone()
    }

    #[must_use]
    pub fn stop_count(&self) -> usize {
        *lock(&self.stops)
    }
}

impl SpeechRecognizer for MemoryRecognizer {
    fn start(&self, request: &CaptureRequest) -> Result<()> {
        lock(&self.started).push(request.clone());
        Ok(())
    }

    fn stop(&self) {
        *lock(&self.stops) += 1;
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
