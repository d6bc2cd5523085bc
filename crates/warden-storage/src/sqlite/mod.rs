//! SQLite-backed record log.

pub mod migrations;
pub mod pragmas;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection};
use warden_core::errors::PersistenceError;
use warden_core::traits::{PersistedRecord, PersistedState, Persistence, RetentionPolicy};

use self::pragmas::apply_pragmas;
use self::writer::with_immediate_transaction;
use crate::retention::retained;
use crate::to_persistence_err;

/// One row of `governance_log`.
struct Row {
    seq: i64,
    kind: String,
    payload: String,
}

/// Append-only `governance_log` table behind a single serialized connection.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqlitePersistence {
    /// Open (or create) a database file, apply pragmas, run migrations.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(|e| PersistenceError::SqliteError {
            message: format!("open {}: {e}", path.display()),
        })?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(to_persistence_err)?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, PersistenceError> {
        apply_pragmas(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file path. `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every record in append order. Fails on the first undecodable row.
    pub fn records(&self) -> Result<Vec<PersistedRecord>, PersistenceError> {
        self.rows()?.into_iter().map(|row| decode(&row)).collect()
    }

    /// Row count per record kind.
    pub fn count_by_kind(&self) -> Result<Vec<(String, u64)>, PersistenceError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn
            .prepare_cached(
                "SELECT kind, COUNT(*) FROM governance_log GROUP BY kind ORDER BY kind",
            )
            .map_err(to_persistence_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(to_persistence_err)?;
        let counts = rows
            .map(|r| {
                r.map(|(kind, n)| (kind, u64::try_from(n).unwrap_or(0)))
                    .map_err(to_persistence_err)
            })
            .collect::<Result<Vec<_>, _>>();
        counts
    }

    fn rows(&self) -> Result<Vec<Row>, PersistenceError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn
            .prepare_cached("SELECT seq, kind, payload FROM governance_log ORDER BY seq")
            .map_err(to_persistence_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Row {
                    seq: row.get(0)?,
                    kind: row.get(1)?,
                    payload: row.get(2)?,
                })
            })
            .map_err(to_persistence_err)?;
        let rows = rows
            .map(|r| r.map_err(to_persistence_err))
            .collect::<Result<Vec<_>, _>>();
        rows
    }
}

fn decode(row: &Row) -> Result<PersistedRecord, PersistenceError> {
    serde_json::from_str(&row.payload).map_err(|e| PersistenceError::DecodeFailed {
        kind: row.kind.clone(),
        reason: e.to_string(),
    })
}

fn insert(conn: &Connection, record: &PersistedRecord) -> Result<(), PersistenceError> {
    let payload = serde_json::to_string(record).map_err(|e| PersistenceError::EncodeFailed {
        reason: e.to_string(),
    })?;
    conn.prepare_cached(
        "INSERT INTO governance_log (kind, key, payload, recorded_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            record.kind().as_str(),
            record.key(),
            payload,
            record.recorded_at().to_rfc3339(),
        ])
    })
    .map_err(to_persistence_err)?;
    Ok(())
}

impl Persistence for SqlitePersistence {
    /// Replay the log. Undecodable rows are skipped with a warning.
    fn load(&self) -> Result<PersistedState, PersistenceError> {
        let mut state = PersistedState::default();
        for row in self.rows()? {
            match decode(&row) {
                Ok(record) => state.apply(record),
                Err(e) => tracing::warn!(seq = row.seq, error = %e, "storage: skipping record"),
            }
        }
        Ok(state)
    }

    fn append(&self, record: &PersistedRecord) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        insert(&conn, record)
    }

    /// All-or-nothing: a failed batch leaves no rows behind.
    fn append_batch(&self, records: &[PersistedRecord]) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        with_immediate_transaction(&mut conn, |tx| {
            for record in records {
                insert(tx, record)?;
            }
            Ok(())
        })
    }

    /// Delete rows outside `policy`. Undecodable rows are left alone.
    fn compact(&self, policy: &RetentionPolicy) -> Result<usize, PersistenceError> {
        let rows = self.rows()?;
        let decoded: Vec<(i64, PersistedRecord)> = rows
            .iter()
            .filter_map(|row| decode(row).ok().map(|record| (row.seq, record)))
            .collect();
        let records: Vec<PersistedRecord> = decoded.iter().map(|(_, r)| r.clone()).collect();
        let keep = retained(&records, policy, Utc::now());
        let doomed: Vec<i64> = decoded
            .iter()
            .zip(keep)
            .filter(|(_, keep)| !keep)
            .map(|((seq, _), _)| *seq)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = with_immediate_transaction(&mut conn, |tx| {
            let mut stmt = tx
                .prepare_cached("DELETE FROM governance_log WHERE seq = ?1")
                .map_err(to_persistence_err)?;
            let mut removed = 0;
            for seq in &doomed {
                removed += stmt.execute(params![seq]).map_err(to_persistence_err)?;
            }
            Ok(removed)
        })?;
        tracing::info!(
            removed,
            kept = records.len() - removed,
            "storage: compacted governance log"
        );
        Ok(removed)
    }
}

impl std::fmt::Debug for SqlitePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePersistence")
            .field("path", &self.path)
            .finish()
    }
}
