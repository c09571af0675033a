//! LinguaLive: conversation practice with an AI roleplay partner.
//!
//! A [`PracticeSession`] owns the transcript and coordinates everything that
//! happens around it:
//!
//! - **Turns**: the learner's message goes to the agent service and the
//!   reply is appended (or a fallback apology when the service fails)
//! - **Enrichment**: per-message translation into the pivot language and
//!   grammar feedback, concurrently and in any order
//! - **Suggestions** in the sandbox scenario and end-of-conversation
//!   **skills feedback**
//! - **Speech**: agent replies spoken in verbal mode, single-shot capture of
//!   the learner's answer
//! - **Configuration guard**: changing language, scenario or mode mid
//!   conversation asks for confirmation before the transcript is cleared
//!
//! Collaborators sit behind traits in [`services`]; [`llm::HttpBackend`]
//! implements them against an OpenAI-compatible endpoint. The [`host`]
//! module exposes a session to a frontend over newline-delimited JSON.

pub mod app_dirs;
pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod llm;
pub mod logging;
pub mod runtime;
pub mod services;
pub mod session;
pub mod speech;
pub mod storage;
pub mod transcript;

pub use config::AppConfig;
pub use error::{PracticeError, Result};
pub use runtime::{Notification, RuntimeEvent};
pub use session::{PracticeSession, SessionConfig};
pub use transcript::{Message, MessageId, Speaker};
