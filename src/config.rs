//! Strongly-typed configuration for the automation engine.
//!
//! Two layers of configuration exist: the [`SelectorSet`], an immutable
//! per-run profile describing how to find things on the target page, and the
//! [`EngineConfig`], which carries engine-level pacing and browser knobs.
//! Both can be built from defaults, deserialized from JSON, or loaded from
//! environment variables (with optional `.env` support).

use std::env;
use std::num::ParseIntError;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default quiet period before a streamed answer counts as stabilized.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 1_500;

/// Default hard timeout bounding the wait for a single answer.
pub const DEFAULT_HARD_TIMEOUT_MS: u64 = 120_000;

/// Verbosity level for engine logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Minimal,
    Medium,
    Detailed,
}

impl Verbosity {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Verbosity::Minimal => 0,
            Verbosity::Medium => 1,
            Verbosity::Detailed => 2,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Verbosity::Minimal),
            1 => Some(Verbosity::Medium),
            2 => Some(Verbosity::Detailed),
            _ => None,
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Medium
    }
}

/// Ordered candidate descriptors per element role, plus the two detector
/// timers. Passed in per run and never mutated by the engine; the target page
/// may destroy and recreate elements at any time, so nothing derived from a
/// `SelectorSet` is cached across cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorSet {
    /// Candidates for the prompt input surface, most specific first.
    #[serde(alias = "inputCandidates")]
    pub input: Vec<String>,
    /// Candidates for the submit control.
    #[serde(alias = "submitCandidates")]
    pub submit_control: Vec<String>,
    /// Fallback form candidates when the input has no enclosing form.
    #[serde(alias = "formCandidates")]
    pub form: Vec<String>,
    /// Candidates for the container holding streamed responses.
    #[serde(alias = "messagesContainer")]
    pub response_container: Vec<String>,
    /// Candidates for individual response items; the last match wins.
    #[serde(alias = "assistantMsgCandidates")]
    pub response_item: Vec<String>,
    /// Class marking a region as actively streaming; empty disables the check.
    #[serde(alias = "streamingClass")]
    pub streaming_marker: String,
    /// Quiet period the response text must hold before counting as final.
    #[serde(alias = "finalizeDelayMs")]
    pub quiet_period_ms: u64,
    /// Hard upper bound on the wait for one answer.
    pub hard_timeout_ms: u64,
}

impl Default for SelectorSet {
    fn default() -> Self {
        SelectorSet {
            input: string_vec(&[
                "textarea[placeholder*='Ask']",
                "textarea[aria-label*='Ask']",
                "div[contenteditable='true'][role='textbox']",
                "div[contenteditable='true']",
                "form textarea",
                "form input[type='text']",
                "textarea",
                "input[type='text']",
            ]),
            submit_control: string_vec(&[
                "button[data-testid='submit-button']",
                "button[type='submit']",
                "button[aria-label*='Search']",
                "button[aria-label*='Send']",
                "button[data-testid*='send']",
                "form button[type='submit']",
            ]),
            form: string_vec(&["form[action*='search']", "form"]),
            response_container: string_vec(&["[data-testid*='conversation']", "main", "body"]),
            response_item: string_vec(&[
                "[data-testid*='message'][data-role='assistant']",
                "[data-testid*='message']:not([data-role='user'])",
                "article",
                ".prose",
            ]),
            streaming_marker: String::new(),
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            hard_timeout_ms: DEFAULT_HARD_TIMEOUT_MS,
        }
    }
}

impl SelectorSet {
    /// Parse a selector profile from a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::InvalidJson {
            field: "selector profile",
            source,
        })
    }
}

fn string_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Engine-level pacing and browser configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    #[serde(skip)]
    pub verbose: Verbosity,
    /// Delay before each cycle so the page can settle after the previous one.
    pub settle_delay_ms: u64,
    /// Pause between consecutive cycles.
    pub cycle_delay_ms: u64,
    /// Delay before the keyboard path's follow-up button attempt.
    pub keyboard_followup_delay_ms: u64,
    /// Interval at which the live-page surface drains buffered mutations.
    pub mutation_poll_ms: u64,
    /// Launch the local browser without a visible window.
    pub headless: bool,
    /// Explicit Chrome/Chromium binary for local launches.
    pub chrome_executable: Option<String>,
    /// Attach to an already-running browser over CDP instead of launching.
    pub cdp_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            verbose: Verbosity::default(),
            settle_delay_ms: 2_000,
            cycle_delay_ms: 600,
            keyboard_followup_delay_ms: 50,
            mutation_poll_ms: 250,
            headless: true,
            chrome_executable: None,
            cdp_url: None,
        }
    }
}

impl EngineConfig {
    /// Construct a configuration from environment variables, after loading a
    /// `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        let mut config = EngineConfig::default();

        if let Some(value) = env_var("ASKRUNNER_VERBOSE") {
            let parsed = parse_u8("ASKRUNNER_VERBOSE", &value)?;
            config.verbose = Verbosity::from_u8(parsed).ok_or(ConfigError::InvalidEnumVariant {
                field: "ASKRUNNER_VERBOSE",
                value,
            })?;
        }

        if let Some(value) = env_var("ASKRUNNER_SETTLE_DELAY_MS") {
            config.settle_delay_ms = parse_u64("ASKRUNNER_SETTLE_DELAY_MS", &value)?;
        }

        if let Some(value) = env_var("ASKRUNNER_CYCLE_DELAY_MS") {
            config.cycle_delay_ms = parse_u64("ASKRUNNER_CYCLE_DELAY_MS", &value)?;
        }

        if let Some(value) = env_var("ASKRUNNER_KEYBOARD_FOLLOWUP_DELAY_MS") {
            config.keyboard_followup_delay_ms =
                parse_u64("ASKRUNNER_KEYBOARD_FOLLOWUP_DELAY_MS", &value)?;
        }

        if let Some(value) = env_var("ASKRUNNER_MUTATION_POLL_MS") {
            config.mutation_poll_ms = parse_u64("ASKRUNNER_MUTATION_POLL_MS", &value)?;
        }

        if let Some(value) = env_var("ASKRUNNER_HEADLESS") {
            config.headless = parse_bool("ASKRUNNER_HEADLESS", &value)?;
        }

        if let Some(value) = env_var("ASKRUNNER_CHROME_BIN") {
            config.chrome_executable = Some(value);
        }

        if let Some(value) = env_var("ASKRUNNER_CDP_URL") {
            config.cdp_url = Some(value);
        }

        Ok(config)
    }
}

/// Errors that can arise while constructing configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {field}")]
    InvalidEnumVariant { field: &'static str, value: String },
    #[error("invalid boolean '{value}' for {field}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid JSON for {field}: {source}")]
    InvalidJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, ConfigError> {
    value
        .trim()
        .parse::<u8>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}
