//! PRAGMA configuration applied to every connection.

use rusqlite::Connection;
use warden_core::errors::PersistenceError;

use crate::to_persistence_err;

/// WAL journal, NORMAL sync, 5s busy timeout.
pub fn apply_pragmas(conn: &Connection) -> Result<(), PersistenceError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(to_persistence_err)
}
