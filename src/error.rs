//! Error types for BRIT operations
//!
//! Protocol and crypto failures surface as typed errors. Only the fee scheduler
//! turns them into a policy decision (fallback to the hardwired address list).

use thiserror::Error;

/// Core error type for BRIT operations
#[derive(Error, Debug)]
pub enum BritError {
    /// Null/empty seed or malformed parameters, rejected before any crypto work
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No usable Matcher key is available
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// Ciphertext was tampered with or encrypted under a different key
    #[error("Integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    /// Malformed Matcher response (bad version, too few rows)
    #[error("Matcher response error: {0}")]
    MatcherResponse(String),

    /// Malformed persisted encounter record
    #[error("Matcher store error: {0}")]
    MatcherStore(String),

    /// Another exchange for this wallet id is still outstanding
    #[error("Exchange already in progress for wallet {0}")]
    ExchangeInProgress(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BritError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn matcher_response(msg: impl Into<String>) -> Self {
        Self::MatcherResponse(msg.into())
    }

    pub fn matcher_store(msg: impl Into<String>) -> Self {
        Self::MatcherStore(msg.into())
    }

    /// Whether this error ends the current Matcher exchange as a `Failure`
    ///
    /// Store and input errors are surfaced to the caller and never touch fee state.
    pub fn is_exchange_failure(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound(_)
                | Self::EncryptionFailure(_)
                | Self::DecryptionFailure(_)
                | Self::IntegrityCheckFailed(_)
                | Self::MatcherResponse(_)
                | Self::Transport(_)
        )
    }
}
