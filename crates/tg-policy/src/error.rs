// error.rs — Error types for the policy subsystem.

use thiserror::Error;

/// Errors that can occur while loading or compiling a policy bundle.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The bundle file could not be read.
    #[error("failed to read bundle '{path}': {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    /// The bundle is not valid YAML (or violates the document shape).
    #[error("failed to parse bundle: {0}")]
    Parse(#[from] serde_yaml::Error),
}
