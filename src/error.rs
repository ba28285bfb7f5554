//! Error taxonomy for the sync engine, per §7.
//!
//! Sync entry points never propagate these to their caller (§7's
//! propagation policy) — they are consumed by a single `match`/`if let Err`
//! at the push/pull/prune boundary and turned into a log line plus an
//! unchanged `is_synced` flag. Internal helpers stay `Result`-typed so that
//! boundary is explicit and easy to audit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local store is closed")]
    Closed,

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    #[cfg(feature = "sqlite")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid id: {0}")]
    InvalidId(#[from] uuid::Error),
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("local file not found: {0}")]
    LocalFileMissing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
