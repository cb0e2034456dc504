//! Error types for the blobcache client.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a single client operation.
///
/// Every error is fatal for the invocation that raised it; nothing in this
/// crate retries. The one partial-failure case is [`Error::ContentEdit`],
/// which records whether the metadata half of an edit was already committed
/// when the content half failed.
#[derive(Debug, Error)]
pub enum Error {
    /// The server response is missing a field the client requires. This
    /// indicates an incompatible server version and is never retried.
    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    /// The caller combined list filters in an unsupported way.
    #[error("invalid filter combination: {0}")]
    InvalidFilterCombination(String),

    /// A scope string was not one of `user`, `group` or `public`.
    #[error("unknown scope {0:?}: expected user, group or public")]
    InvalidScope(String),

    /// No usable filename was supplied or derivable.
    #[error("missing filename: supply an explicit filename")]
    MissingFilename,

    /// No auth token could be resolved from the environment or config.
    #[error("cannot determine your credentials as you are not logged in")]
    MissingToken,

    /// The download destination already exists and no override applies.
    #[error("refusing to overwrite existing file: {}", .0.display())]
    ExistingFile(PathBuf),

    /// Network-level failure talking to the server.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server rejected the request; `message` is the server's own text.
    #[error("server rejected request (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The external content editor could not be run or exited nonzero.
    #[error("editor failed: {0}")]
    Editor(String),

    /// The content half of an edit failed. `metadata_updated` tells the
    /// caller whether the metadata half had already been committed, so only
    /// the content step needs retrying.
    #[error("content update failed (metadata committed: {metadata_updated}): {source}")]
    ContentEdit {
        metadata_updated: bool,
        #[source]
        source: Box<Error>,
    },

    /// Local filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for client-side usage errors that never reach the
    /// server.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::InvalidFilterCombination(_)
                | Self::InvalidScope(_)
                | Self::MissingFilename
        )
    }

    /// Returns `true` if the server rejected the request.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Returns the server's HTTP status if this is a server rejection.
    pub fn server_status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
