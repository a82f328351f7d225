//! Error types for identity loading

use std::path::PathBuf;
use thiserror::Error;

/// Identity error types
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Key pair file could not be read
    #[error("failed to load key file {path}: {source}")]
    KeyLoadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// User list file could not be read
    #[error("failed to load user file {path}: {source}")]
    UserFileLoadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Commitment material is not exactly 32 bytes
    #[error("invalid commitment length: expected {expected} bytes, got {got}")]
    InvalidCommitment { expected: usize, got: usize },
}

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;
