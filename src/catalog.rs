//! Selectable languages, roleplay scenarios, and interaction modes.

use serde::{Deserialize, Serialize};

/// A practice language with its display label and BCP-47 tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageOption {
    /// Value sent to collaborators (e.g. `"French"`).
    pub value: &'static str,
    /// Native-script display label.
    pub label: &'static str,
    /// BCP-47 tag used for speech synthesis and capture.
    pub bcp47: &'static str,
}

/// A roleplay scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioOption {
    pub value: &'static str,
    pub label: &'static str,
}

pub const LANGUAGES: &[LanguageOption] = &[
    LanguageOption {
        value: "English",
        label: "English",
        bcp47: "en-US",
    },
    LanguageOption {
        value: "Spanish",
        label: "Español",
        bcp47: "es-ES",
    },
    LanguageOption {
        value: "French",
        label: "Français",
        bcp47: "fr-FR",
    },
    LanguageOption {
        value: "German",
        label: "Deutsch",
        bcp47: "de-DE",
    },
    LanguageOption {
        value: "Japanese",
        label: "日本語",
        bcp47: "ja-JP",
    },
    LanguageOption {
        value: "Mandarin Chinese",
        label: "中文 (普通话)",
        bcp47: "zh-CN",
    },
    LanguageOption {
        value: "Italian",
        label: "Italiano",
        bcp47: "it-IT",
    },
];

/// The open-ended scenario that enables conversation suggestions.
pub const SANDBOX_SCENARIO: &str = "Sandbox";

pub const SCENARIOS: &[ScenarioOption] = &[
    ScenarioOption {
        value: "Meeting a stranger",
        label: "Meeting a Stranger",
    },
    ScenarioOption {
        value: "Ordering food at a restaurant",
        label: "Ordering Food",
    },
    ScenarioOption {
        value: "Buying groceries at a supermarket",
        label: "Buying Groceries",
    },
    ScenarioOption {
        value: "Asking for directions",
        label: "Asking for Directions",
    },
    ScenarioOption {
        value: SANDBOX_SCENARIO,
        label: "Sandbox (Open Conversation)",
    },
];

/// Target language for message translation.
pub const PIVOT_LANGUAGE: &str = "English";

pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_SCENARIO: &str = "Meeting a stranger";

/// How the user exchanges turns with the agent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    /// Typed input, text-only replies.
    #[default]
    Written,
    /// Spoken input (speech capture) and spoken replies (speech synthesis).
    Verbal,
}

impl InteractionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Verbal => "verbal",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "written" | "text" | "typed" => Some(Self::Written),
            "verbal" | "voice" | "spoken" => Some(Self::Verbal),
            _ => None,
        }
    }
}

impl std::fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up a catalog language by its value.
#[must_use]
pub fn language(value: &str) -> Option<&'static LanguageOption> {
    LANGUAGES.iter().find(|l| l.value == value)
}

/// BCP-47 tag for a catalog language, if known.
#[must_use]
pub fn bcp47_for(value: &str) -> Option<&'static str> {
    language(value).map(|l| l.bcp47)
}

/// Look up a catalog scenario by its value.
#[must_use]
pub fn scenario(value: &str) -> Option<&'static ScenarioOption> {
    SCENARIOS.iter().find(|s| s.value == value)
}

#[must_use]
pub fn is_sandbox(scenario: &str) -> bool {
    scenario == SANDBOX_SCENARIO
}

/// Primary language subtag of a BCP-47 tag (`"es-MX"` -> `"es"`).
#[must_use]
pub fn base_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}
