// error.rs — Gateway errors and JSON-RPC error codes.

use thiserror::Error;

/// JSON-RPC 2.0 error codes used by the dispatcher.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32000;
    pub const AUTH_FAILED: i64 = -32003;
}

/// Errors raised while constructing or running the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The builtin bundle's signature failed and signatures are required.
    #[error("policy signature invalid: {0}")]
    PolicySignatureInvalid(tg_signing::SigningError),

    #[error(transparent)]
    Policy(#[from] tg_policy::PolicyError),

    #[error(transparent)]
    Store(#[from] tg_store::StoreError),

    #[error(transparent)]
    Rollout(#[from] tg_rollout::RolloutError),

    #[error(transparent)]
    Audit(#[from] tg_audit::AuditError),

    #[error(transparent)]
    Kv(#[from] tg_kv::KvError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
