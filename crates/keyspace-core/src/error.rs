//! Error types for keyspace

use std::fmt;

use thiserror::Error;

/// Classification of an error reported by the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The store refuses writes (replica, failover in progress)
    ReadOnly,
    /// Generic error reply from the store (wrong type, bad syntax, ...)
    Response,
    /// Authentication was rejected
    Auth,
    /// I/O, timeout or dropped connection
    Connection,
    /// The reply could not be understood
    Protocol,
    /// Anything the client could not classify
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorKind::ReadOnly => "read-only",
            StoreErrorKind::Response => "response",
            StoreErrorKind::Auth => "auth",
            StoreErrorKind::Connection => "connection",
            StoreErrorKind::Protocol => "protocol",
            StoreErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// An error raised by the backing store while executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The rejection a replica sends for any write.
    pub fn read_only() -> Self {
        Self::new(
            StoreErrorKind::ReadOnly,
            "READONLY You can't write against a read only replica.",
        )
    }

    /// Whether this error means the store is in read-only mode.
    ///
    /// Clients do not always classify the reply, so the message prefix is
    /// checked as well.
    pub fn is_read_only(&self) -> bool {
        self.kind == StoreErrorKind::ReadOnly || self.message.contains("READONLY")
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unexpected reply to {command}: {reason}")]
    UnexpectedReply { command: String, reason: String },

    // Multi-tenancy errors
    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),

    #[error("Tenant required: {0}")]
    TenantRequired(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration not found")]
    ConfigNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is a store rejection caused by read-only mode.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_read_only())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
