//! Common error types for breath QA

use thiserror::Error;

/// Common result type for breath QA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every pipeline stage
///
/// No-detection (zero breaths, absent phase markers) is never an error; it is
/// represented as an empty or partial result.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Recording lacks a required channel (structural, aborts the run)
    #[error("Missing required channel: {0}")]
    MissingChannel(String),

    /// Malformed sample data (non-increasing time, non-finite values)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Index range is empty or outside the sample sequence
    #[error("Index range out of bounds: {0}")]
    OutOfRange(String),

    /// Invalid caller-supplied argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Breath number not present in the QA table
    #[error("Breath not found: {0}")]
    BreathNotFound(u32),
}

impl Error {
    /// True for errors that describe the recording as a whole rather than a
    /// single breath
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::MissingChannel(_) | Error::Io(_) | Error::Config(_))
    }
}
