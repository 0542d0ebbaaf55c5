// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checks on values that deserialize fine but cannot work, such as a poll cap
//! below its base or a non-HTTP assistant endpoint.

use crate::diagnostic::ConfigError;
use crate::model::{ConciergeConfig, PollProfile};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Runs every check and returns all failures together.
pub fn validate_config(config: &ConciergeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.storage.push_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "storage.push_capacity must be at least 1".to_string(),
        });
    }

    validate_profile("polling.conversation", &config.polling.conversation, &mut errors);
    validate_profile("polling.notifications", &config.polling.notifications, &mut errors);

    if let Some(endpoint) = &config.delegate.endpoint
        && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        errors.push(ConfigError::Validation {
            message: format!("delegate.endpoint `{endpoint}` must be an http:// or https:// URL"),
        });
    }

    if config.delegate.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "delegate.timeout_secs must be greater than 0".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_profile(section: &str, profile: &PollProfile, errors: &mut Vec<ConfigError>) {
    if profile.base_interval_ms == 0 {
        errors.push(ConfigError::Validation {
            message: format!("{section}.base_interval_ms must be greater than 0"),
        });
    }

    if profile.max_interval_ms < profile.base_interval_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "{section}.max_interval_ms ({}) must not be below base_interval_ms ({})",
                profile.max_interval_ms, profile.base_interval_ms
            ),
        });
    }

    if !profile.multiplier.is_finite() || profile.multiplier < 1.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "{section}.multiplier must be a finite number >= 1.0, got {}",
                profile.multiplier
            ),
        });
    }
}
