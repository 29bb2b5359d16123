//! Error types for the iidfile container format.

use std::fmt;
use std::io;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for iidfile operations.
#[derive(Debug)]
pub enum Error {
    /// The header declares a format version this crate does not support.
    BadVersion {
        /// The version field found in the header.
        found: u32,
    },

    /// A declared length runs past the end of the available bytes.
    Truncated(String),

    /// An internal inconsistency was detected while decoding.
    Corrupt(String),

    /// The requested key, address, or group is not present.
    NotFound(String),

    /// Adding the entry would violate global `(domain, address)` uniqueness.
    DuplicateIid(String),

    /// The operation needs data that has not been materialized, and the
    /// caller forbade I/O. Advisory; the handle remains usable.
    NotLoaded(String),

    /// An invalid argument was provided.
    InvalidArgument(String),

    /// An I/O error occurred.
    Io(io::Error),
}

impl Error {
    /// Creates a new truncation error.
    pub fn truncated(msg: impl Into<String>) -> Self {
        Error::Truncated(msg.into())
    }

    /// Creates a new corruption error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new not loaded error.
    pub fn not_loaded(msg: impl Into<String>) -> Self {
        Error::NotLoaded(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadVersion { found } => {
                write!(f, "Unsupported format version: {}", found)
            }
            Error::Truncated(msg) => write!(f, "Truncated data: {}", msg),
            Error::Corrupt(msg) => write!(f, "Corrupt data: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::DuplicateIid(msg) => write!(f, "Duplicate IID: {}", msg),
            Error::NotLoaded(msg) => write!(f, "Not loaded: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corrupt("lookup table length is not a multiple of 20");
        assert_eq!(
            err.to_string(),
            "Corrupt data: lookup table length is not a multiple of 20"
        );

        let err = Error::BadVersion { found: 7 };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
