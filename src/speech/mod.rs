//! Speech synthesis and capture orchestration.

pub mod input;
pub mod memory;
pub mod output;
pub mod platform;
pub mod voice;

pub use input::{CaptureErrorKind, CaptureOutcome, SpeechInputCoordinator};
pub use memory::{MemoryRecognizer, MemorySynthesizer};
pub use output::SpeechOutputCoordinator;
pub use platform::{
    CaptureEvent, CaptureRequest, SpeechCapabilities, SpeechRecognizer, SpeechSynthesizer,
    SynthesisEvent, UtteranceId, UtteranceRequest, Voice,
};
pub use voice::{resolve_voice, voices_for_language};
