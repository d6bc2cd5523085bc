//! # warden-storage
//!
//! Durable backends for the governance record log. Everything here sits
//! behind [`Persistence`](warden_core::traits::Persistence); components only
//! ever see the non-blocking [`WriteBehind`] sink.

pub mod memory;
pub mod retention;
pub mod sqlite;
pub mod write_behind;

pub use memory::MemoryPersistence;
pub use retention::retained;
pub use sqlite::SqlitePersistence;
pub use write_behind::{WriteBehind, WriterStats};

use warden_core::errors::PersistenceError;

/// Map a rusqlite (or any displayable) error into a `PersistenceError`.
pub(crate) fn to_persistence_err(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::SqliteError {
        message: e.to_string(),
    }
}
