//! Error types for the compliance ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// The three leading variants form the regulatory taxonomy: `Validation`
/// for malformed input, `Conflict` for business-rule violations, and
/// `NotFound` for missing referenced entities. Every check is a hard gate;
/// nothing is recovered internally.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range input
    #[error("validation error: {0}")]
    Validation(String),

    /// Business-rule or state violation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage error (RocksDB)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Fleet directory lookup failed
    #[error("directory error: {0}")]
    Directory(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Validation error from any message
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Conflict error from any message
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    /// Not-found error from any message
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
