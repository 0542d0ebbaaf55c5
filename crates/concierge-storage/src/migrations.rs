// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!`. Migrations run automatically on database open.

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
///
/// Refinery tracks applied migrations in its own `refinery_schema_history` table.
/// The error is flattened to a message so it can cross the connection thread.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<usize, String> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| format!("migration failed: {e}"))?;
    Ok(report.applied_migrations().len())
}
