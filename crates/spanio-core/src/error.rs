//! Stream error types

use std::io;
use thiserror::Error;

/// The main error type for spanio stream operations
#[derive(Error, Debug)]
pub enum Error {
    /// Failure reported by an underlying source
    #[error("Source I/O error: {0}")]
    Io(#[from] io::Error),

    /// Programmer error: double close, reference underflow, negative length
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// The resource behind a stream has already been released
    #[error("Stream closed: {0}")]
    StreamClosed(String),

    /// Offset, window or bit address outside of its container
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// A thread panicked while holding a stream lock
    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type alias for spanio operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a contract violation error
    pub fn contract_violation(msg: impl Into<String>) -> Self {
        Error::ContractViolation(msg.into())
    }

    /// Create a stream closed error
    pub fn stream_closed(msg: impl Into<String>) -> Self {
        Error::StreamClosed(msg.into())
    }

    /// Create an out of bounds error
    pub fn out_of_bounds(msg: impl Into<String>) -> Self {
        Error::OutOfBounds(msg.into())
    }

    /// Create an unexpected end-of-data I/O error
    pub fn unexpected_eof(msg: impl Into<String>) -> Self {
        Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, msg.into()))
    }

    /// True for programmer errors, as opposed to I/O failures
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::ContractViolation(_))
    }

    /// True when the error originates from an underlying source
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// True when the stream's resource is gone
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::StreamClosed(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::Poisoned(err.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::OutOfBounds(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::contract_violation("double close").is_contract_violation());
        assert!(Error::stream_closed("gone").is_closed());
        assert!(Error::unexpected_eof("short").is_io());
        assert!(!Error::stream_closed("gone").is_io());
    }

    #[test]
    fn test_into_io_error_keeps_cause() {
        let err: io::Error = Error::unexpected_eof("short read").into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err: io::Error = Error::out_of_bounds("window").into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err: io::Error = Error::contract_violation("underflow").into();
        assert!(err.to_string().contains("underflow"));
    }
}
