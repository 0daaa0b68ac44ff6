use thiserror::Error;

/// Token issuance failed; the whole cycle is abandoned.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),
    #[error("identity provider rejected the credentials (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// A read against the resource server failed.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("resource server unreachable: {0}")]
    Unavailable(String),
    #[error("resource server answered HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid resource server response: {0}")]
    InvalidResponse(String),
}

/// The transaction bundle was not accepted.
#[derive(Debug, Clone, Error)]
pub enum PostError {
    #[error("resource server unreachable: {0}")]
    Unreachable(String),
    #[error("bundle rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid bundle response: {0}")]
    InvalidResponse(String),
}
