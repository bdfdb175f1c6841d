//! Error types for grpcache

use std::fmt;

/// Result type alias for grpcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache and codec operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Capacity must be at least one entry
    InvalidCapacity(u32),

    /// Stored values are single decimal digits
    ValueOutOfRange(u8),

    /// Malformed serialized cache
    Parse(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCapacity(cap) => write!(f, "Invalid capacity: {} (must be > 0)", cap),
            Error::ValueOutOfRange(value) => write!(f, "Value out of range: {} (max 9)", value),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<nom::Err<nom::error::Error<&str>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Error::Parse("unexpected end of input".to_string()),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                let near: String = e.input.chars().take(12).collect();
                Error::Parse(format!("{:?} near {:?}", e.code, near))
            }
        }
    }
}
