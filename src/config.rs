//! Configuration types for the practice runtime.

use crate::catalog::{DEFAULT_LANGUAGE, DEFAULT_SCENARIO, InteractionMode, PIVOT_LANGUAGE};
use crate::error::PracticeError;
use crate::speech::platform::SpeechCapabilities;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Initial session selections.
    pub session: SessionDefaults,
    /// Collaborator backend (OpenAI-compatible HTTP).
    pub backend: BackendConfig,
    /// Speech capability flags.
    pub speech: SpeechSettings,
    /// Saved-conversation storage.
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Selections a new session starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub language: Option<String>,
    pub scenario: Option<String>,
    pub interaction_mode: Option<InteractionMode>,
    /// Target language for message translation.
    pub pivot_language: String,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            language: Some(DEFAULT_LANGUAGE.to_owned()),
            scenario: Some(DEFAULT_SCENARIO.to_owned()),
            interaction_mode: Some(InteractionMode::Written),
            pivot_language: PIVOT_LANGUAGE.to_owned(),
        }
    }
}

/// OpenAI-compatible chat completions backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL without the `/v1/...` suffix.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    ///
    /// Empty means no `Authorization` header (local servers).
    pub api_key_env: String,
    /// Sampling temperature.
    pub temperature: f64,
    pub max_tokens: u32,
    /// Per-request timeout in seconds. `0` disables the timeout.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            // Ollama default endpoint.
            base_url: "http://localhost:11434".to_owned(),
            model: "qwen3:4b".to_owned(),
            api_key_env: String::new(),
            temperature: 0.7,
            max_tokens: 512,
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Request timeout, or `None` when disabled.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Resolve the API key from the configured environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        if self.api_key_env.trim().is_empty() {
            return None;
        }
        std::env::var(self.api_key_env.trim())
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Speech capabilities, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub synthesis_available: bool,
    pub capture_available: bool,
    /// Capture language tag used when the session language has no known tag.
    pub fallback_capture_tag: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            synthesis_available: true,
            capture_available: true,
            fallback_capture_tag: "en-US".to_owned(),
        }
    }
}

impl SpeechSettings {
    #[must_use]
    pub fn capabilities(&self) -> SpeechCapabilities {
        SpeechCapabilities {
            synthesis: self.synthesis_available,
            capture: self.capture_available,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the saved-conversations directory.
    pub conversations_dir: Option<PathBuf>,
}

impl StorageConfig {
    #[must_use]
    pub fn effective_conversations_dir(&self) -> PathBuf {
        self.conversations_dir
            .clone()
            .unwrap_or_else(crate::app_dirs::conversations_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Also write a daily-rolling log file under the logs directory.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PracticeError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PracticeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path, honouring `LINGUALIVE_CONFIG_DIR`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.session.pivot_language, "English");
        assert_eq!(
            config.session.interaction_mode,
            Some(InteractionMode::Written)
        );
        assert!(config.backend.max_tokens > 0);
        assert!(config.backend.request_timeout().is_some());
        assert!(config.speech.capabilities().capture);
        assert_eq!(config.speech.fallback_capture_tag, "en-US");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.session.language = Some("French".into());
        config.session.interaction_mode = Some(InteractionMode::Verbal);
        config.backend.request_timeout_secs = 0;
        config.storage.conversations_dir = Some(dir.path().join("convos"));
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.backend.request_timeout().is_none());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [session]
            language = "Japanese"

            [speech]
            capture_available = false
            "#,
        )
        .unwrap();
        assert_eq!(config.session.language.as_deref(), Some("Japanese"));
        assert_eq!(config.session.scenario.as_deref(), Some("Meeting a stranger"));
        assert!(!config.speech.capture_available);
        assert!(config.speech.synthesis_available);
        assert_eq!(config.backend, BackendConfig::default());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "session = 3").unwrap();
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(PracticeError::Config(_))
        ));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn blank_api_key_env_means_no_key() {
        assert!(BackendConfig::default().api_key().is_none());
    }
}
