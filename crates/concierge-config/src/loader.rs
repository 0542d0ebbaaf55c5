// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./concierge.toml` > `~/.config/concierge/concierge.toml`
//! > `/etc/concierge/concierge.toml` with environment variable overrides via the
//! `CONCIERGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ConciergeConfig;

/// Section prefixes recognised in environment variable names, longest first
/// so `polling_conversation_` wins over a bare `polling_`.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("polling_conversation_", "polling.conversation."),
    ("polling_notifications_", "polling.notifications."),
    ("storage_", "storage."),
    ("delegate_", "delegate."),
    ("logging_", "logging."),
    ("messages_", "messages."),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/concierge/concierge.toml` (system-wide)
/// 3. `~/.config/concierge/concierge.toml` (user XDG config)
/// 4. `./concierge.toml` (local directory)
/// 5. `CONCIERGE_*` environment variables
pub fn load_config() -> Result<ConciergeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ConciergeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConciergeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ConciergeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConciergeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ConciergeConfig::default()))
        .merge(Toml::file("/etc/concierge/concierge.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("concierge/concierge.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("concierge.toml"))
        .merge(env_provider())
}

/// Maps `CONCIERGE_DELEGATE_API_KEY` to `delegate.api_key`.
///
/// Uses an explicit section table rather than `Env::split("_")`, which would
/// turn `api_key` into `api.key`.
fn env_provider() -> Env {
    Env::prefixed("CONCIERGE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for (prefix, section) in ENV_SECTIONS {
        if let Some(field) = key.strip_prefix(prefix) {
            return format!("{section}{field}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("delegate_api_key"), "delegate.api_key");
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(
            map_env_key("polling_conversation_base_interval_ms"),
            "polling.conversation.base_interval_ms"
        );
        assert_eq!(
            map_env_key("polling_notifications_multiplier"),
            "polling.notifications.multiplier"
        );
        assert_eq!(map_env_key("unknown"), "unknown");
    }

    #[test]
    fn env_override_applies() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CONCIERGE_DELEGATE_TIMEOUT_SECS", "7");
            jail.set_env("CONCIERGE_LOGGING_LEVEL", "debug");
            let config = load_config()?;
            assert_eq!(config.delegate.timeout_secs, 7);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "concierge.toml",
                r#"
[polling.notifications]
base_interval_ms = 4000
"#,
            )?;
            let config = load_config()?;
            assert_eq!(config.polling.notifications.base_interval_ms, 4000);
            assert_eq!(config.polling.notifications.max_interval_ms, 30_000);
            Ok(())
        });
    }
}
