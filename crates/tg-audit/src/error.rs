// error.rs — Audit error type.

use thiserror::Error;

/// Errors from the audit writer.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Persisting the entry failed.
    #[error("audit store error: {0}")]
    Store(#[from] tg_store::StoreError),

    /// The entry could not be serialized.
    #[error("audit serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
