// error.rs — Store error type.

use thiserror::Error;

/// Errors from the SQL store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite call failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
