//! Error types for lrucache

use std::fmt;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Construction was given a capacity below 1
    InvalidArgument(String),

    /// Lookup key is not resident
    KeyNotFound,
}

impl Error {
    /// True for a plain cache miss, which callers usually recover from
    pub fn is_miss(&self) -> bool {
        matches!(self, Error::KeyNotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::KeyNotFound => write!(f, "Key not found in cache"),
        }
    }
}

impl std::error::Error for Error {}
