//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/lingualive/` | `~/.local/share/lingualive/` |
//! | Config | `~/Library/Application Support/lingualive/` | `~/.config/lingualive/` |
//!
//! # Environment Overrides
//!
//! - `LINGUALIVE_DATA_DIR` overrides [`data_dir`]
//! - `LINGUALIVE_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

const APP_NAME: &str = "lingualive";

/// Application data root directory (saved conversations, logs).
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LINGUALIVE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("/tmp/lingualive-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LINGUALIVE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("/tmp/lingualive-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Saved conversations (`data_dir()/conversations/`).
#[must_use]
pub fn conversations_dir() -> PathBuf {
    data_dir().join("conversations")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_nonempty() {
        assert!(!data_dir().as_os_str().is_empty());
    }

    #[test]
    fn config_file_ends_with_config_toml() {
        assert!(config_file().ends_with("config.toml"));
    }

    #[test]
    fn derived_dirs_have_expected_leaf() {
        assert!(logs_dir().ends_with("logs"));
        assert!(conversations_dir().ends_with("conversations"));
    }

    #[test]
    fn config_dir_override_via_env() {
        let key = "LINGUALIVE_CONFIG_DIR";
        let original = std::env::var_os(key);

        // SAFETY: no other test in this crate reads this variable.
        unsafe { std::env::set_var(key, "/custom/config") };
        assert_eq!(config_dir(), PathBuf::from("/custom/config"));

        match original {
            Some(val) => unsafe { std::env::set_var(key, val) },
            None => unsafe { std::env::remove_var(key) },
        }
    }
}
