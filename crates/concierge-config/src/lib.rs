// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Concierge conversation engine.
//!
//! Sections are strict (`deny_unknown_fields`). Files are merged from the
//! system, user and working directories, then `CONCIERGE_*` variables. Errors
//! come back as miette diagnostics pointing into the offending file.
//!
//! # Usage
//!
//! ```no_run
//! use concierge_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Guest poll base: {} ms", config.polling.conversation.base_interval_ms);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, ConfigSources, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ConciergeConfig;

use std::path::Path;

/// Loads the layered configuration (system, user, local, env) and validates it.
///
/// Deserialization errors are reported with spans into whichever TOML file
/// contained the bad key.
pub fn load_and_validate() -> Result<ConciergeConfig, Vec<ConfigError>> {
    let config = loader::load_config().map_err(|err| {
        diagnostic::figment_to_config_errors(err, &layered_sources())
    })?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Loads one explicit file plus env overrides and validates it.
pub fn load_and_validate_path(path: &Path) -> Result<ConciergeConfig, Vec<ConfigError>> {
    let config = loader::load_config_from_path(path).map_err(|err| {
        let mut sources = ConfigSources::new();
        sources.read(path);
        diagnostic::figment_to_config_errors(err, &sources)
    })?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Parses and validates a TOML document with no file or env layers.
pub fn load_and_validate_str(toml_content: &str) -> Result<ConciergeConfig, Vec<ConfigError>> {
    let config = loader::load_config_from_str(toml_content).map_err(|err| {
        diagnostic::figment_to_config_errors(err, &ConfigSources::inline(toml_content))
    })?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// The files `load_config` merges, in the paths figment reports them under.
fn layered_sources() -> ConfigSources {
    let mut sources = ConfigSources::new();
    sources.read(Path::new("/etc/concierge/concierge.toml"));
    if let Some(config_dir) = dirs::config_dir() {
        sources.read(&config_dir.join("concierge/concierge.toml"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        sources.read(&cwd.join("concierge.toml"));
    }
    sources
}
