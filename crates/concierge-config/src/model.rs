// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed configuration sections.
//!
//! Every section rejects unknown keys so typos surface as diagnostics
//! instead of silently falling back to defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root of `concierge.toml`. Every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConciergeConfig {
    /// Durable store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Poll-loop intervals for the message and notification feeds.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Automated assistant endpoint settings.
    #[serde(default)]
    pub delegate: DelegateConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Display names used on engine-authored messages.
    #[serde(default)]
    pub messages: MessagesConfig,
}

/// `[storage]`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Open the database in WAL mode so poll reads do not block writers.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Capacity of the in-process change feed. Subscribers that fall further
    /// behind than this lose events and rely on polling.
    #[serde(default = "default_push_capacity")]
    pub push_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            push_capacity: default_push_capacity(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("concierge").join("concierge.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("concierge.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_push_capacity() -> usize {
    256
}

/// Polling profiles for the two feeds built on the push/poll multiplexer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Guest/staff conversation feed.
    #[serde(default = "PollProfile::conversation")]
    pub conversation: PollProfile,

    /// Order and booking status notifications.
    #[serde(default = "PollProfile::notifications")]
    pub notifications: PollProfile,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            conversation: PollProfile::conversation(),
            notifications: PollProfile::notifications(),
        }
    }
}

/// Adaptive poll interval: starts at `base_interval_ms`, grows by
/// `multiplier` after every empty poll, never exceeds `max_interval_ms`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollProfile {
    #[serde(default = "default_conversation_base_ms")]
    pub base_interval_ms: u64,

    #[serde(default = "default_conversation_max_ms")]
    pub max_interval_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl PollProfile {
    /// 3 s base, 15 s cap.
    pub fn conversation() -> Self {
        Self {
            base_interval_ms: default_conversation_base_ms(),
            max_interval_ms: default_conversation_max_ms(),
            multiplier: default_multiplier(),
        }
    }

    /// 5 s base, 30 s cap.
    pub fn notifications() -> Self {
        Self {
            base_interval_ms: 5_000,
            max_interval_ms: 30_000,
            multiplier: default_multiplier(),
        }
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

fn default_conversation_base_ms() -> u64 {
    3_000
}

fn default_conversation_max_ms() -> u64 {
    15_000
}

fn default_multiplier() -> f64 {
    1.5
}

/// Automated assistant (serverless function) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DelegateConfig {
    /// Function URL. `None` means every delegate call fails, so assisted
    /// conversations escalate on the first guest message.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with each invocation.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Transport timeout for a single invocation.
    #[serde(default = "default_delegate_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_delegate_timeout_secs(),
        }
    }
}

fn default_delegate_timeout_secs() -> u64 {
    30
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Sender names stamped on engine-authored system messages.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessagesConfig {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    #[serde(default = "default_staff_team_name")]
    pub staff_team_name: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            staff_team_name: default_staff_team_name(),
        }
    }
}

fn default_assistant_name() -> String {
    "AI Assistant".to_string()
}

fn default_staff_team_name() -> String {
    "Concierge Team".to_string()
}
