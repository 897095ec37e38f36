// error.rs — Approval coordinator errors.

use thiserror::Error;

/// Errors from the approval coordinator.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The KV backend failed.
    #[error("kv error: {0}")]
    Kv(#[from] tg_kv::KvError),

    /// Decide was called on an unknown or expired pending id.
    #[error("pending approval not found: {0}")]
    PendingNotFound(String),

    /// A stored record did not round-trip (missing/garbled fields).
    #[error("corrupt approval record '{id}': {detail}")]
    Corrupt { id: String, detail: String },
}
