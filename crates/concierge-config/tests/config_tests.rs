// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading, validation and diagnostics.

use concierge_config::diagnostic::suggest_key;
use concierge_config::model::{ConciergeConfig, PollProfile};
use concierge_config::{ConfigError, load_and_validate_str, load_config_from_str};

/// Full config with every section parses into the expected values.
#[test]
fn full_config_parses() {
    let toml = r#"
[storage]
database_path = "/var/lib/concierge/hotel.db"
wal_mode = false
push_capacity = 64

[polling.conversation]
base_interval_ms = 2000
max_interval_ms = 10000
multiplier = 2.0

[polling.notifications]
base_interval_ms = 6000

[delegate]
endpoint = "https://functions.example.com/assistant"
api_key = "secret"
timeout_secs = 12

[logging]
level = "debug"

[messages]
assistant_name = "Aria"
staff_team_name = "Front Desk"
"#;

    let config = load_config_from_str(toml).expect("valid config");
    assert_eq!(config.storage.database_path, "/var/lib/concierge/hotel.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.push_capacity, 64);
    assert_eq!(config.polling.conversation.multiplier, 2.0);
    assert_eq!(config.polling.notifications.base_interval_ms, 6000);
    assert_eq!(config.polling.notifications.max_interval_ms, 30_000);
    assert_eq!(
        config.delegate.endpoint.as_deref(),
        Some("https://functions.example.com/assistant")
    );
    assert_eq!(config.delegate.timeout_secs, 12);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.messages.assistant_name, "Aria");
    assert_eq!(config.messages.staff_team_name, "Front Desk");
}

/// Empty TOML falls back to the compiled defaults.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.polling.conversation, PollProfile::conversation());
    assert_eq!(config.polling.notifications, PollProfile::notifications());
    assert_eq!(config.polling.conversation.base_interval_ms, 3_000);
    assert_eq!(config.polling.conversation.max_interval_ms, 15_000);
    assert_eq!(config.polling.notifications.base_interval_ms, 5_000);
    assert_eq!(config.polling.notifications.max_interval_ms, 30_000);
    assert!(config.delegate.endpoint.is_none());
    assert_eq!(config.delegate.timeout_secs, 30);
    assert!(config.storage.wal_mode);
    assert_eq!(config.messages.assistant_name, "AI Assistant");
}

#[test]
fn unknown_field_in_section_is_rejected() {
    let toml = r#"
[delegate]
endpont = "https://functions.example.com"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("endpont"),
        "error should mention unknown field, got: {err_str}"
    );
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[telemetry]
enabled = true
"#;

    let err = load_config_from_str(toml).expect_err("unknown section should be rejected");
    assert!(format!("{err}").contains("telemetry") || format!("{err}").contains("unknown"));
}

#[test]
fn dotted_override_reaches_nested_profile() {
    use figment::{Figment, providers::Serialized};

    let config: ConciergeConfig = Figment::new()
        .merge(Serialized::defaults(ConciergeConfig::default()))
        .merge(("polling.conversation.max_interval_ms", 20_000))
        .extract()
        .expect("should merge override");

    assert_eq!(config.polling.conversation.max_interval_ms, 20_000);
    assert_eq!(config.polling.conversation.base_interval_ms, 3_000);
}

#[test]
fn diagnostic_suggests_close_key() {
    let valid_keys = &["endpoint", "api_key", "timeout_secs"];
    assert_eq!(suggest_key("endpont", valid_keys), Some("endpoint".to_string()));
    assert!(suggest_key("zzzzzz", valid_keys).is_none());
}

#[test]
fn diagnostic_error_names_unknown_key_and_valid_keys() {
    let toml = r#"
[messages]
asistant_name = "Aria"
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "asistant_name"
                && suggestion.as_deref() == Some("assistant_name")
                && valid_keys.contains("staff_team_name")
        })
    });
    assert!(found, "expected UnknownKey for asistant_name, got: {errors:?}");
}

#[test]
fn unknown_key_in_inline_toml_gets_a_span() {
    let toml = "[storage]\nwal_mode = true\n\n[polling.conversation]\nmultipler = 2.0\n";
    let errors = load_and_validate_str(toml).expect_err("typo should fail");
    let span = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { span, .. } => *span,
        _ => None,
    });
    let span = span.expect("span into the inline document");
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "multipler");
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "endpont".to_string(),
        suggestion: Some("endpoint".to_string()),
        valid_keys: "endpoint, api_key, timeout_secs".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `endpoint`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("endpont"));
}

#[test]
fn validation_errors_surface_through_load_and_validate() {
    let toml = r#"
[polling.notifications]
base_interval_ms = 40000
max_interval_ms = 30000
"#;

    let errors = load_and_validate_str(toml).expect_err("cap below base should fail");
    assert!(errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("polling.notifications.max_interval_ms"))
    }));
}

#[test]
fn valid_toml_validates() {
    let toml = r#"
[delegate]
endpoint = "http://localhost:8787/assistant"
"#;
    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert!(config.delegate.endpoint.is_some());
}
