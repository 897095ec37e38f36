// error.rs — Rollout and registration errors.

use thiserror::Error;

/// Errors from version registration or tenant resolution.
#[derive(Debug, Error)]
pub enum RolloutError {
    /// The bundle failed signature verification (always fatal here).
    #[error("policy signature invalid: {0}")]
    SignatureInvalid(#[from] tg_signing::SigningError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] tg_store::StoreError),

    /// A referenced version has no registered payload.
    #[error("policy version not found: {0}")]
    VersionNotFound(String),

    /// The bundle file exists but does not parse.
    #[error(transparent)]
    Policy(#[from] tg_policy::PolicyError),

    /// Copying bundle files into the versions directory failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
