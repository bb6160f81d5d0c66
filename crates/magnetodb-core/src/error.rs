//! Error types for the MagnetoDB core.

/// Core error type for MagnetoDB infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum MagnetoCoreError {
    /// Invalid project identifier.
    #[error("invalid project id: '{0}' (must be 1-64 characters of [a-zA-Z0-9_-])")]
    InvalidProjectId(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for core operations.
pub type MagnetoCoreResult<T> = Result<T, MagnetoCoreError>;
