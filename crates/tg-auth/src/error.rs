// error.rs — Authentication/authorization failures.

use thiserror::Error;

/// Errors from token verification or role checks.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization: Bearer ...` header.
    #[error("missing bearer token")]
    MissingBearer,

    /// The token is expired.
    #[error("token expired")]
    Expired,

    /// The token failed verification.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The caller is authenticated but lacks the required role.
    #[error("{0}")]
    Forbidden(String),

    /// Reading or writing role bindings failed.
    #[error("role store error: {0}")]
    Store(#[from] tg_kv::KvError),
}
