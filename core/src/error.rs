//! Error types shared by every component of the client.
//!
//! # Design
//! Each variant is terminal for the single operation that produced it. The
//! caller decides how to present it; nothing here panics or retries.
//! `SessionExpired` is the only variant that requires a follow-up action
//! (forcing a logout), see `SessionManager::handle_error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Local input check failed; no request was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An authorized operation was attempted without a token.
    #[error("not authenticated")]
    Unauthenticated,

    /// No response reached the client (connect failure, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the bearer token (401 or 403).
    #[error("session expired")]
    SessionExpired,

    /// The server answered with a non-success status.
    #[error("{message}")]
    RemoteRejected { status: u16, message: String },

    /// The persisted credential record could not be read or written.
    #[error("credential storage failed: {0}")]
    Storage(String),

    /// A session transition was requested from a state that does not allow it.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ApiError {
    /// True when the caller must drive a logout.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
