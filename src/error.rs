//! Error types for the Tessera index engine.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`TesseraError`] enum. Build steps propagate errors immediately; the query
//! path treats [`TesseraError::Timeout`] as recoverable and drops the affected
//! document or term instead of failing the whole query.
//!
//! # Examples
//!
//! ```
//! use tessera::error::{Result, TesseraError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(TesseraError::journal("truncated page"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// I/O errors (file operations, mmap, fsync)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Index structure errors (bad layout, unsorted input, format mismatch)
    #[error("Index error: {0}")]
    Index(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed journal data
    #[error("Journal error: {0}")]
    Journal(String),

    /// Term dictionary errors
    #[error("Dictionary error: {0}")]
    Dictionary(String),

    /// A fixed-capacity structure ran out of room. Not recoverable; the
    /// structure was sized too small for its input.
    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// A deadline budget expired before a lookup could complete
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        TesseraError::Index(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        TesseraError::Storage(msg.into())
    }

    /// Create a new journal error.
    pub fn journal<S: Into<String>>(msg: S) -> Self {
        TesseraError::Journal(msg.into())
    }

    /// Create a new dictionary error.
    pub fn dictionary<S: Into<String>>(msg: S) -> Self {
        TesseraError::Dictionary(msg.into())
    }

    /// Create a new capacity exhausted error.
    pub fn capacity_exhausted<S: Into<String>>(msg: S) -> Self {
        TesseraError::CapacityExhausted(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        TesseraError::Timeout(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TesseraError::Config(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(format!("Invalid argument: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(msg.into())
    }

    /// Whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TesseraError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = TesseraError::index("Test index error");
        assert_eq!(error.to_string(), "Index error: Test index error");

        let error = TesseraError::journal("bad page");
        assert_eq!(error.to_string(), "Journal error: bad page");

        let error = TesseraError::capacity_exhausted("table full");
        assert_eq!(error.to_string(), "Capacity exhausted: table full");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let tessera_error = TesseraError::from(io_error);

        match tessera_error {
            TesseraError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_timeout_detection() {
        assert!(TesseraError::timeout("spans").is_timeout());
        assert!(!TesseraError::index("x").is_timeout());
    }
}
