// error.rs — KV error type.

use thiserror::Error;

/// Errors from the key-value backend.
#[derive(Debug, Error)]
pub enum KvError {
    /// Could not reach or authenticate to the backend.
    #[error("kv connection error: {0}")]
    Connection(String),

    /// An individual operation failed.
    #[error("kv error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for KvError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
            KvError::Connection(e.to_string())
        } else {
            KvError::Backend(e.to_string())
        }
    }
}
