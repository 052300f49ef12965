//! Schema migrations.
//!
//! The schema version lives in SQLite's `user_version` pragma. Each entry in
//! [`MIGRATIONS`] is applied once, inside its own transaction, in version
//! order.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Append only.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "workflows and app_state tables",
    sql: r#"
        CREATE TABLE workflows (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            steps         TEXT NOT NULL DEFAULT '[]',
            is_favorite   BOOLEAN NOT NULL DEFAULT 0,
            display_order INTEGER,
            created_at    INTEGER NOT NULL,
            updated_at    INTEGER NOT NULL
        );
        CREATE INDEX idx_workflows_display ON workflows(is_favorite, display_order);

        CREATE TABLE app_state (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    "#,
}];

// ── public API ───────────────────────────────────────────────────────

/// Bring `conn` up to the latest schema. Synchronous; run it from
/// `spawn_blocking` (see [`crate::Database::run_migrations`]).
pub fn run_all(conn: &mut Connection) -> StoreResult<()> {
    let from = current_version(conn)?;
    let mut applied = 0usize;

    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(version = from, "schema up to date");
    } else {
        info!(from, to = current_version(conn)?, applied, "schema migrated");
    }
    Ok(())
}

/// The schema version recorded in the database (0 for a fresh file).
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("cannot read user_version: {e}"),
        })
}

// ── internals ────────────────────────────────────────────────────────

fn apply(conn: &mut Connection, migration: &Migration) -> StoreResult<()> {
    let failed = |e: rusqlite::Error| StoreError::Migration {
        version: migration.version,
        message: e.to_string(),
    };

    debug!(version = migration.version, description = migration.description, "applying migration");

    // Dropping the transaction without commit rolls it back.
    let tx = conn.transaction().map_err(failed)?;
    tx.execute_batch(migration.sql).map_err(failed)?;
    tx.pragma_update(None, "user_version", migration.version)
        .map_err(failed)?;
    tx.commit().map_err(failed)
}

// ── tests ────────────────────────────────────────────────────────────
