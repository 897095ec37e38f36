// error.rs — Typed verification failures.
//
// The distinction matters operationally: digest_mismatch means the file
// changed after signing, bad_signature means the wrong key (or a forgery),
// bad_algorithm means an envelope we refuse on principle.

use thiserror::Error;

/// Errors from signing or verifying a bundle.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Envelope `alg` is anything other than "Ed25519".
    #[error("unsupported algorithm '{0}'")]
    BadAlgorithm(String),

    /// The payload's SHA-256 does not match the envelope's digest.
    #[error("sha256 mismatch between payload and envelope")]
    DigestMismatch,

    /// The Ed25519 signature did not verify against the supplied key.
    #[error("signature invalid")]
    BadSignature,

    /// The envelope is not parseable JSON / base64.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Reading the payload or envelope failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A signing key could not be loaded or generated.
    #[error("key error: {0}")]
    Key(String),
}

impl SigningError {
    /// Stable machine-readable reason, returned by `policy/apply` when a
    /// bundle fails verification. One token per variant — a garbled
    /// envelope is not a forgery and a key-loading failure is not an I/O
    /// problem with the bundle.
    pub fn reason(&self) -> &'static str {
        match self {
            SigningError::BadAlgorithm(_) => "bad_algorithm",
            SigningError::DigestMismatch => "digest_mismatch",
            SigningError::BadSignature => "bad_signature",
            SigningError::MalformedEnvelope(_) => "malformed_envelope",
            SigningError::Io(_) => "io_error",
            SigningError::Key(_) => "key_error",
        }
    }
}
