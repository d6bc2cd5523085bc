//! Write helpers: BEGIN IMMEDIATE transactions.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use warden_core::errors::PersistenceError;

/// Run `f` inside a BEGIN IMMEDIATE transaction, taking the write lock up
/// front. Rolled back if `f` fails.
pub fn with_immediate_transaction<F, T>(
    conn: &mut Connection,
    f: F,
) -> Result<T, PersistenceError>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, PersistenceError>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| PersistenceError::SqliteError {
            message: format!("failed to begin immediate transaction: {e}"),
        })?;

    let result = f(&tx)?;

    tx.commit().map_err(|e| PersistenceError::SqliteError {
        message: format!("failed to commit: {e}"),
    })?;
    Ok(result)
}
