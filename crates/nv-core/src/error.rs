//! Error types for nemoval

use thiserror::Error;

/// nemoval error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error (shape mismatch, malformed input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// A requested branch is absent from a dataset.
    #[error("branch '{branch}' not found in dataset '{dataset}'")]
    MissingBranch {
        /// Branch name.
        branch: String,
        /// Dataset name.
        dataset: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
