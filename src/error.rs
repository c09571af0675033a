//! Error types for practice sessions.

/// Top-level error type for the conversation-practice runtime.
#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    /// A required session field (language, scenario, interaction mode) is unset.
    #[error("configuration incomplete: {0}")]
    ConfigurationIncomplete(String),

    /// A collaborator call failed or returned an empty/invalid payload.
    #[error("service failure: {0}")]
    ServiceFailure(String),

    /// Speech synthesis or capture reported an error.
    #[error("speech platform error: {0}")]
    SpeechPlatform(String),

    /// The platform lacks a required speech capability.
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// A configuration change is already awaiting confirmation.
    #[error("a configuration change is already awaiting confirmation")]
    ConfirmationPending,

    /// The submitted user text was empty after trimming.
    #[error("empty input")]
    EmptyInput,

    /// Configuration file error.
    #[error("config error: {0}")]
    Config(String),

    /// Saved-conversation storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A host command carried a missing or malformed payload.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PracticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = PracticeError::ConfigurationIncomplete("language".into());
        assert_eq!(err.to_string(), "configuration incomplete: language");

        let err = PracticeError::ServiceFailure("timeout".into());
        assert!(err.to_string().starts_with("service failure"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PracticeError = io.into();
        assert!(matches!(err, PracticeError::Io(_)));
    }
}
