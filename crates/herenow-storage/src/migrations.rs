//! Database schema migrations.
//!
//! Applies the page_events schema and tracks applied versions in a
//! schema_migrations table.

use rusqlite::Connection;
use tracing::info;

use herenow_core::error::HereNowError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future
/// migrations can be added by checking the current version and applying
/// incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), HereNowError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| HereNowError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| HereNowError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: page_events");
    }

    Ok(())
}

/// Version 1: the append-only page-event log.
fn apply_v1(conn: &Connection) -> Result<(), HereNowError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS page_events (
            id          TEXT PRIMARY KEY NOT NULL,
            domain      TEXT NOT NULL,
            path        TEXT NOT NULL,
            visitor_id  TEXT NOT NULL,
            session_id  TEXT NOT NULL,
            user_agent  TEXT NOT NULL DEFAULT '',
            occurred_at INTEGER NOT NULL
        );

        -- The aggregation query filters on (domain, path) and compares
        -- occurred_at against the window cutoff.
        CREATE INDEX IF NOT EXISTS idx_page_events_page
            ON page_events (domain, path);

        CREATE INDEX IF NOT EXISTS idx_page_events_page_time
            ON page_events (domain, path, occurred_at);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'page_events');
        ",
    )
    .map_err(|e| HereNowError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
