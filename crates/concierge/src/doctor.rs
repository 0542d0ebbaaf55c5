// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `concierge doctor` command implementation.
//!
//! Checks that the configuration is usable, the database opens with its
//! schema applied, and the assistant endpoint answers.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use colored::Colorize;
use concierge_config::ConciergeConfig;
use concierge_config::model::PollProfile;
use concierge_core::{ConciergeError, ConversationStore, HealthStatus, PluginAdapter};
use concierge_storage::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Outcome of one diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn finish(name: &'static str, start: Instant, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }

    fn line(&self, use_color: bool) -> String {
        let duration_ms = self.duration.as_millis();
        if !use_color {
            let tag = match self.status {
                CheckStatus::Pass => "[OK]  ",
                CheckStatus::Warn => "[WARN]",
                CheckStatus::Fail => "[FAIL]",
            };
            return format!("    {tag} {:<16} {} ({duration_ms}ms)", self.name, self.message);
        }
        let (symbol, message) = match self.status {
            CheckStatus::Pass => ("✓".green(), self.message.normal()),
            CheckStatus::Warn => ("!".yellow(), self.message.yellow()),
            CheckStatus::Fail => ("✗".red(), self.message.red()),
        };
        format!("    {symbol} {:<16} {message} ({duration_ms}ms)", self.name)
    }
}

/// Runs the checks and prints a report. With `deep`, also runs
/// `PRAGMA integrity_check` on the database.
pub async fn run_doctor(
    config: &ConciergeConfig,
    deep: bool,
    plain: bool,
) -> Result<(), ConciergeError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let mut results = vec![
        check_config(config),
        check_database(config).await,
        check_delegate(config).await,
        check_polling(config),
    ];
    if deep {
        results.push(check_db_integrity(&config.storage.database_path).await);
    }

    println!();
    println!("  concierge doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", result.line(use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    match issues {
        0 => println!("  All checks passed."),
        1 => println!("  1 issue found."),
        n => println!("  {n} issues found."),
    }
    if issues > 0 && !deep {
        println!("  Run with --deep to include the database integrity check.");
    }
    println!();

    Ok(())
}

fn check_config(config: &ConciergeConfig) -> CheckResult {
    let start = Instant::now();
    match concierge_config::validation::validate_config(config) {
        Ok(()) => CheckResult::finish("Configuration", start, CheckStatus::Pass, "valid"),
        Err(errors) => CheckResult::finish(
            "Configuration",
            start,
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
        ),
    }
}

/// Opens the store the way the clients do, which applies pending migrations.
async fn check_database(config: &ConciergeConfig) -> CheckResult {
    let start = Instant::now();
    let db_path = &config.storage.database_path;
    if !Path::new(db_path).exists() {
        return CheckResult::finish(
            "Database",
            start,
            CheckStatus::Warn,
            format!("not found: {db_path} (created on first use)"),
        );
    }

    let store = SqliteStore::new(config.storage.clone());
    if let Err(e) = store.initialize().await {
        return CheckResult::finish("Database", start, CheckStatus::Fail, format!("open failed: {e}"));
    }
    let health = store.health_check().await;
    let _ = store.close().await;
    match health {
        Ok(HealthStatus::Healthy) => {
            CheckResult::finish("Database", start, CheckStatus::Pass, "connected, schema current")
        }
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::finish("Database", start, CheckStatus::Warn, reason)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::finish("Database", start, CheckStatus::Fail, reason)
        }
        Err(e) => CheckResult::finish("Database", start, CheckStatus::Fail, format!("query failed: {e}")),
    }
}

/// A HEAD request against the assistant endpoint. Any HTTP answer counts as
/// reachable; the function may reject HEAD.
async fn check_delegate(config: &ConciergeConfig) -> CheckResult {
    let start = Instant::now();
    let Some(endpoint) = &config.delegate.endpoint else {
        return CheckResult::finish(
            "Assistant",
            start,
            CheckStatus::Warn,
            "no endpoint configured (assisted chats escalate on first message)",
        );
    };

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return CheckResult::finish(
                "Assistant",
                start,
                CheckStatus::Fail,
                format!("HTTP client error: {e}"),
            );
        }
    };

    match client.head(endpoint).send().await {
        Ok(resp) if resp.status().is_server_error() => CheckResult::finish(
            "Assistant",
            start,
            CheckStatus::Warn,
            format!("reachable, status {}", resp.status()),
        ),
        Ok(_) => CheckResult::finish("Assistant", start, CheckStatus::Pass, "reachable"),
        Err(e) => {
            let message = if e.is_timeout() {
                "timeout (5s)".to_string()
            } else if e.is_connect() {
                "connection refused".to_string()
            } else {
                format!("error: {e}")
            };
            CheckResult::finish("Assistant", start, CheckStatus::Fail, message)
        }
    }
}

fn check_polling(config: &ConciergeConfig) -> CheckResult {
    let start = Instant::now();
    let describe = |p: &PollProfile| format!("{}-{}ms", p.base_interval_ms, p.max_interval_ms);
    CheckResult::finish(
        "Polling",
        start,
        CheckStatus::Pass,
        format!(
            "messages {}, notifications {}",
            describe(&config.polling.conversation),
            describe(&config.polling.notifications)
        ),
    )
}

async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::finish(
            "DB integrity",
            start,
            CheckStatus::Warn,
            "database not found (skipped)",
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::finish(
                "DB integrity",
                start,
                CheckStatus::Fail,
                format!("open failed: {e}"),
            );
        }
    };
    let rows = conn
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .await;

    match rows {
        Ok(rows) if rows == ["ok"] => CheckResult::finish("DB integrity", start, CheckStatus::Pass, "ok"),
        Ok(rows) => CheckResult::finish(
            "DB integrity",
            start,
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
        ),
        Err(e) => CheckResult::finish(
            "DB integrity",
            start,
            CheckStatus::Fail,
            format!("check failed: {e}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use concierge_config::model::StorageConfig;

    use super::*;

    fn config_with_db(path: &str) -> ConciergeConfig {
        ConciergeConfig {
            storage: StorageConfig {
                database_path: path.to_string(),
                ..StorageConfig::default()
            },
            ..ConciergeConfig::default()
        }
    }

    #[tokio::test]
    async fn missing_database_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let result = check_database(&config_with_db(path.to_str().unwrap())).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(!path.exists(), "doctor must not create the database");
    }

    #[tokio::test]
    async fn initialized_database_passes_both_checks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.db");
        let config = config_with_db(path.to_str().unwrap());
        let store = SqliteStore::new(config.storage.clone());
        store.initialize().await.unwrap();
        store.close().await.unwrap();

        assert_eq!(check_database(&config).await.status, CheckStatus::Pass);
        assert_eq!(
            check_db_integrity(path.to_str().unwrap()).await.status,
            CheckStatus::Pass
        );
    }

    #[tokio::test]
    async fn unconfigured_delegate_is_a_warning() {
        let result = check_delegate(&ConciergeConfig::default()).await;
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn plain_lines_use_bracket_tags() {
        let result = CheckResult::finish("Polling", Instant::now(), CheckStatus::Warn, "slow");
        assert!(result.line(false).starts_with("    [WARN] Polling"));
    }
}
