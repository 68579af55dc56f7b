//! Error module for the Rusty Ephys library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum EphysError {
    /// Error for out of bounds access, e.g., reading past the end of a recording.
    OutOfBounds(String),
    /// Error for invalid channel.
    InvalidChannel(String),
    /// Error for invalid parameters.
    InvalidParameter(String),
    /// Error for invalid operation, e.g., restarting a consumed analysis runner.
    InvalidOperation(String),
    /// Error for I/O operations of the underlying sample source.
    IOError(String),
    /// The analysis was cancelled before it could complete. Not a failure;
    /// the runner maps this to a cancellation notice.
    Cancelled,
}

impl fmt::Display for EphysError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EphysError::OutOfBounds(e) => write!(f, "Index out of bounds: {}", e),
            EphysError::InvalidChannel(e) => write!(f, "Invalid channel: {}", e),
            EphysError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            EphysError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            EphysError::IOError(e) => write!(f, "I/O error: {}", e),
            EphysError::Cancelled => write!(f, "The analysis was cancelled"),
        }
    }
}

impl Error for EphysError {}
