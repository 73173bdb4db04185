//! Error types for share-dl
//!
//! This module provides the error handling for the library, including:
//! - The crate-wide [`Error`] type for fatal and run-level failures
//! - The per-attempt [`TransferError`] taxonomy used by the retry machinery
//! - Process exit code mapping for embedding binaries

use crate::types::NodeId;
use thiserror::Error;

/// Result type alias for share-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for share-dl
///
/// Configuration errors abort before any scheduling starts; the remaining
/// variants describe run-level failures surfaced after the final report.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "chunk_size")
        key: Option<String>,
    },

    /// Network error talking to the metadata service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The root node cannot be resolved, so there is nothing to mirror
    #[error("root node {id} is not downloadable: {reason}")]
    RootUnavailable {
        /// The root node ID that could not be resolved
        id: NodeId,
        /// Why the root could not be resolved
        reason: String,
    },

    /// A directory listing failed; a partial listing is not safe to
    /// mirror against, so the run aborts
    #[error("failed to list children of {id}: {reason}")]
    Listing {
        /// The directory node whose listing failed
        id: NodeId,
        /// Why the listing failed
        reason: String,
    },

    /// One or more transfers failed after exhausting their attempt budget
    #[error("{failed} transfer(s) failed after exhausting retries")]
    TransfersFailed {
        /// Number of terminally failed transfers
        failed: usize,
    },

    /// The run was interrupted before completion
    #[error("run interrupted before completion")]
    Interrupted,
}

impl Error {
    /// Build a configuration error for a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Outcome taxonomy of one failed transfer attempt
///
/// Decoded once at the HTTP boundary (status code plus the service's
/// `{error:{details:{errno}}}` envelope) so the scheduler only ever deals
/// with typed variants.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The remote denied access to the node content
    #[error("permission denied")]
    PermissionDenied,

    /// The remote does not know the node
    #[error("not found")]
    NotFound,

    /// Any other non-success HTTP status
    #[error("HTTP error {0}")]
    Http(u16),

    /// A staged partial file does not match the remote size after a
    /// rejected range request; the partial is discarded before this is
    /// returned so the next attempt restarts from offset zero
    #[error("staged {staged} bytes but remote reports {remote}")]
    RangeMismatch {
        /// Bytes already staged in the partial file
        staged: u64,
        /// Total size the remote reports for the node
        remote: u64,
    },

    /// Transport-level failure before or during the response stream
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Local I/O failure while streaming to the partial file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The finished partial file could not be renamed to its final name
    #[error("rename failed: {0}")]
    RenameFailed(std::io::Error),

    /// The attempt was cancelled by an external interrupt
    #[error("cancelled")]
    Cancelled,
}

/// Map errors to process exit codes
///
/// Embedding binaries use this to turn a run result into an exit status:
/// `0` on full success, a distinct code per fatal configuration error, and
/// a generic `1` when individual transfers ultimately failed.
pub trait ToExitCode {
    /// The process exit code this error maps to
    fn exit_code(&self) -> u8;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> u8 {
        match self {
            Error::Config { key, .. } => match key.as_deref() {
                Some("chunk_size") => 2,
                _ => 3,
            },
            Error::Network(e) if e.is_connect() || e.is_timeout() => 4,
            Error::RootUnavailable { .. } => 5,
            Error::TransfersFailed { .. }
            | Error::Listing { .. }
            | Error::Interrupted
            | Error::Network(_)
            | Error::Io(_)
            | Error::Serialization(_) => 1,
        }
    }
}
