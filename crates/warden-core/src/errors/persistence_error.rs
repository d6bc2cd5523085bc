/// Write-behind / load failures. Logged and retried; never blocks the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("failed to encode record: {reason}")]
    EncodeFailed { reason: String },

    #[error("failed to decode record {kind}: {reason}")]
    DecodeFailed { kind: String, reason: String },

    #[error("persistence backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("write-behind queue closed")]
    QueueClosed,
}
