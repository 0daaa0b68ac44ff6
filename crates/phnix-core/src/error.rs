use thiserror::Error;

/// Errors raised while building or checking identifiers.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
    #[error("character '{character}' at position {position} is not in the alphabet")]
    InvalidCharacter { character: char, position: usize },
    #[error("invalid poi code: {0}")]
    InvalidPoiCode(String),
    #[error("invalid phn scheme: {0}")]
    InvalidScheme(String),
    #[error("invalid subject: {0}")]
    InvalidSubject(String),
}

/// Errors returned by ledger and authority stores.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}
