//! Global configuration models for `.vitalflow/config.toml`.
//!
//! Every section and field has a default, so an empty or missing file
//! yields a working configuration.

use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

/// Represents global settings from `.vitalflow/config.toml`.
///
/// # Example
///
/// ```toml
/// [retry]
/// base_wait_secs = 45
/// increment_secs = 15
/// max_attempts = 10
/// rate_limit_signatures = ["rate_limit", "429", "too many requests", "upstream"]
///
/// [interaction]
/// poll_interval_secs = 2
/// max_wait_secs = 300
///
/// [alerts]
/// score_threshold = 80
///
/// [database]
/// url = "sqlite://vitalflow.db"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
pub struct Settings {
    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub interaction: InteractionSettings,

    #[serde(default)]
    pub alerts: AlertSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Backoff policy for rate-limited reasoning calls.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct RetrySettings {
    /// Wait before the first retry.
    pub base_wait_secs: u64,

    /// Added to the wait after every retry.
    pub increment_secs: u64,

    /// Total attempts, including the first call.
    pub max_attempts: u32,

    /// Case-insensitive substrings marking an error as a rate limit.
    pub rate_limit_signatures: Vec<String>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_wait_secs: 45,
            increment_secs: 15,
            max_attempts: 10,
            rate_limit_signatures: vec![
                "rate_limit".to_string(),
                "429".to_string(),
                "too many requests".to_string(),
                "upstream".to_string(),
            ],
        }
    }
}

/// Polling budget for questions put to the subject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct InteractionSettings {
    pub poll_interval_secs: u64,

    /// Wait budget for unattended runs.
    pub max_wait_secs: u64,

    /// Wait budget when answers are typed in by a person at the terminal.
    pub interactive_max_wait_secs: u64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            max_wait_secs: 300,
            interactive_max_wait_secs: 600,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct AlertSettings {
    /// Scores at or above this value raise an alert regardless of level.
    pub score_threshold: u8,

    /// Endpoint receiving escalation payloads. Escalations are only
    /// logged when unset.
    pub webhook_url: Option<String>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            score_threshold: 80,
            webhook_url: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite connection URL shared by the runner and answering clients.
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://.vitalflow/vitalflow.db".to_string(),
        }
    }
}
