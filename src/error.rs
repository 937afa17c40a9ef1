//! Error types for the SimpleDB storage engine.

use std::io;

use thiserror::Error;

/// The result type used throughout SimpleDB.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for SimpleDB operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption was detected.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The table is in an invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The database file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The database file already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A row with the same key is already stored.
    #[error("Key already exists: {0}")]
    DuplicateKey(u32),

    /// The pager reached its configured page limit.
    #[error("Table full: page limit of {max_pages} reached")]
    TableFull {
        /// The configured page limit.
        max_pages: usize,
    },

    /// A text column exceeded its maximum length.
    #[error("String too long for {column}: {len} bytes (max {max})")]
    StringTooLong {
        /// The column name.
        column: &'static str,
        /// The rejected length in bytes.
        len: usize,
        /// The column capacity in bytes.
        max: usize,
    },

    /// A leaf split would overflow its parent, and internal nodes cannot split.
    #[error("Need to implement splitting internal node")]
    InternalSplitNotImplemented,
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("bad node type 7");
        assert_eq!(err.to_string(), "Data corruption: bad node type 7");

        let err = Error::StringTooLong { column: "username", len: 33, max: 32 };
        assert!(err.to_string().contains("username"));
        assert!(err.to_string().contains("33"));

        let err = Error::InternalSplitNotImplemented;
        assert_eq!(err.to_string(), "Need to implement splitting internal node");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
