//! Error types for VoxelFuse

use thiserror::Error;

/// Main error type for VoxelFuse operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input for {op}: {reason}")]
    InvalidInput { op: &'static str, reason: String },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Contract error for a kernel argument, naming the op it was passed to.
    pub fn invalid_input(op: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            op,
            reason: reason.into(),
        }
    }
}

/// Result type alias for VoxelFuse operations
pub type Result<T> = std::result::Result<T, Error>;
