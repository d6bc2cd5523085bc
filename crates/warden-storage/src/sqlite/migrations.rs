//! Schema migrations, tracked through `PRAGMA user_version`.

use rusqlite::Connection;
use warden_core::errors::PersistenceError;

use crate::to_persistence_err;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    "
    CREATE TABLE IF NOT EXISTS governance_log (
        seq         INTEGER PRIMARY KEY AUTOINCREMENT,
        kind        TEXT NOT NULL,
        key         TEXT NOT NULL,
        payload     TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_governance_log_kind_key
        ON governance_log (kind, key);
    ",
)];

pub fn current_version(conn: &Connection) -> Result<u32, PersistenceError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(to_persistence_err)
}

/// Apply every migration newer than the database's `user_version`.
pub fn run_migrations(conn: &Connection) -> Result<u32, PersistenceError> {
    let start = current_version(conn)?;
    let mut version = start;
    for (target, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > start) {
        conn.execute_batch(sql).map_err(|e| PersistenceError::SqliteError {
            message: format!("migration v{target:03} failed: {e}"),
        })?;
        conn.pragma_update(None, "user_version", target)
            .map_err(to_persistence_err)?;
        tracing::info!(version = target, "storage: applied migration");
        version = *target;
    }
    Ok(version)
}
