// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config errors as miette diagnostics.
//!
//! Figment reports what went wrong; this module finds where, by looking the
//! offending key up in the TOML files that were merged, and proposes the
//! nearest valid key for typos.

#![allow(unused_assignments)] // emitted by the miette Diagnostic derive

use std::path::Path;

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key needs before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(concierge::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest valid key, when one is close enough.
        suggestion: Option<String>,
        /// Comma-separated keys accepted by the section.
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(concierge::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `polling.conversation.multiplier`.
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(concierge::config::missing_key),
        help("set `{key}` in concierge.toml")
    )]
    MissingKey { key: String },

    /// Post-load check failure; see `validation`.
    #[error("validation error: {message}")]
    #[diagnostic(code(concierge::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(concierge::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(key) => format!("did you mean `{key}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Contents of the TOML files a figment was built from, keyed by the path
/// figment records in error metadata.
#[derive(Debug, Default)]
pub struct ConfigSources {
    files: Vec<(String, String)>,
}

impl ConfigSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single in-memory document, for `load_and_validate_str`.
    pub fn inline(content: &str) -> Self {
        Self {
            files: vec![("<inline>".to_string(), content.to_string())],
        }
    }

    /// Records `path` if it can be read. Missing files are skipped, matching
    /// figment's treatment of absent optional config files.
    pub fn read(&mut self, path: &Path) {
        if let Ok(content) = std::fs::read_to_string(path) {
            self.files.push((path.display().to_string(), content));
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Span of `field` in the file the error came from, if it can be located.
    fn locate(
        &self,
        error: &figment::Error,
        field: &str,
    ) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
        let origin = error
            .metadata
            .as_ref()
            .and_then(|meta| meta.source.as_ref())
            .and_then(|source| match source {
                figment::Source::File(path) => Some(path.display().to_string()),
                _ => None,
            });
        // Inline documents carry no file source; fall back to the only entry.
        let file = match origin {
            Some(origin) => self.files.iter().find(|(path, _)| *path == origin),
            None if self.files.len() == 1 => self.files.first(),
            None => None,
        };
        let Some((path, content)) = file else {
            return (None, None);
        };

        let section: Vec<String> = error.path.iter().map(ToString::to_string).collect();
        match find_key_offset(content, &section, field) {
            Some(offset) => (
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(path, content.clone())),
            ),
            None => (None, None),
        }
    }
}

/// Converts every error inside a figment error into a `ConfigError`.
pub fn figment_to_config_errors(err: figment::Error, sources: &ConfigSources) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = sources.locate(&error, field);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.to_string(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error
                    .path
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.clone(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Byte offset of `field` as a key inside the TOML table named by `section`.
///
/// An empty `section` searches from the top of the document. The search stops
/// at the next table header, so a key of the same name in a later table is
/// not matched.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let start = if section.is_empty() {
        0
    } else {
        let header = format!("[{}]", section.join("."));
        content.find(&header)? + header.len()
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let body = &line[indent..];
        if body.starts_with('[') && !section.is_empty() {
            return None;
        }
        if let Some(rest) = body.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Closest entry of `valid_keys` to `unknown` by Jaro-Winkler similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints each error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_multiplier_for_typo() {
        let valid = &["base_interval_ms", "max_interval_ms", "multiplier"];
        assert_eq!(suggest_key("multipler", valid), Some("multiplier".to_string()));
    }

    #[test]
    fn suggests_database_path_for_typo() {
        let valid = &["database_path", "wal_mode", "push_capacity"];
        assert_eq!(suggest_key("databse_path", valid), Some("database_path".to_string()));
    }

    #[test]
    fn no_suggestion_for_distant_key() {
        let valid = &["endpoint", "api_key", "timeout_secs"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn finds_key_in_nested_table() {
        let content = "[storage]\nwal_mode = true\n\n[polling.conversation]\n  multipler = 2.0\n";
        let section = vec!["polling".to_string(), "conversation".to_string()];
        let offset = find_key_offset(content, &section, "multipler").unwrap();
        assert_eq!(&content[offset..offset + 9], "multipler");
    }

    #[test]
    fn does_not_match_key_in_a_later_table() {
        let content = "[storage]\nwal_mode = true\n\n[delegate]\nendpoint = \"x\"\n";
        let section = vec!["storage".to_string()];
        assert_eq!(find_key_offset(content, &section, "endpoint"), None);
    }

    #[test]
    fn missing_table_has_no_offset() {
        let content = "[storage]\nwal_mode = true\n";
        let section = vec!["delegate".to_string()];
        assert_eq!(find_key_offset(content, &section, "endpont"), None);
    }

    #[test]
    fn key_prefix_is_not_a_match() {
        let content = "[delegate]\napi_key_extra = 1\napi_key = \"k\"\n";
        let section = vec!["delegate".to_string()];
        let offset = find_key_offset(content, &section, "api_key").unwrap();
        assert!(content[offset..].starts_with("api_key = "));
    }
}
