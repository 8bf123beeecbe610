//! Error types for configuration and suite loading

use thiserror::Error;

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    /// I/O error reading a manifest file
    #[error("I/O error: {0}")]
    Io(String),

    /// TOML or JSON parsing error
    #[error("Failed to parse manifest: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
