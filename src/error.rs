//! Error taxonomy for replication runs.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Source/destination roles cannot be resolved. Raised before any
    /// connection attempt and never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication failed for {user} on {host}: {message}")]
    Authentication {
        host: String,
        user: String,
        message: String,
    },

    #[error("connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    #[error("folder not found: {0}")]
    FolderNotFound(String),

    #[error("folder already exists: {0}")]
    FolderExists(String),

    /// The server refused the flags attached to an append.
    #[error("server rejected message flags: {0}")]
    FlagRejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("store write failed: {0}")]
    StoreWrite(#[source] rusqlite::Error),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("{action} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        action: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn connection(host: &str, err: impl std::fmt::Display) -> Self {
        Error::Connection {
            host: host.to_string(),
            message: err.to_string(),
        }
    }
}
