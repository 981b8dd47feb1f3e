//! Error types for openrelay

use thiserror::Error;

/// openrelay error type
#[derive(Error, Debug)]
pub enum RelayError {
    /// Address has no entry in the subnet database
    #[error("address not in subnet database: {0}")]
    UnresolvedAddress(String),

    /// Bad line in the subnet database file
    #[error("malformed subnet record: {0}")]
    MalformedRecord(String),

    /// Server already registered for this role
    #[error("server already registered: {0}")]
    DuplicateServer(String),

    /// Role name or code not recognized
    #[error("unknown server role: {0}")]
    UnknownRole(String),

    /// Persistence store rejected the write
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Health poll failed; previous snapshot kept
    #[error("poll failure for {host}: {reason}")]
    PollFailure { host: String, reason: String },

    /// Remote server API call failed
    #[error("remote call to {host} failed: {reason}")]
    RemoteCall { host: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for openrelay
pub type RelayResult<T> = Result<T, RelayError>;
