//! Error types for the printer library

use thiserror::Error;

/// Printer library error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Text encoding name not recognised
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Invalid builder configuration (paper width, feed lines, ...)
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
