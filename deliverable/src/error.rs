//! Error types for routing and backend lookups.

use std::{io, time::Duration};

use thiserror::Error;

/// No usable connection target could be derived from the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Neither the domain section nor `[main]` names a socket path or host/port.
    #[error("No auth backend configured for domain '{domain}'")]
    NoTarget { domain: String },

    /// A host was configured without the port to reach it on.
    #[error("Auth backend host {host} has no port configured")]
    MissingPort { host: String },
}

/// Errors that stop a lookup from producing a classification.
///
/// Every variant is treated as a transport failure by the verification
/// policy: the SMTP command is soft-deferred rather than judged.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Routing failed before any connection was attempted.
    #[error("{0}")]
    Route(#[from] RouteError),

    /// IO error while connecting, reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backend closed the connection before sending a line.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// The backend did not connect or answer in time.
    #[error("Auth backend timed out after {0:?}")]
    Timeout(Duration),

    /// The address contains a field or line separator and cannot be sent.
    #[error("Address {0:?} contains a protocol separator")]
    InvalidAddress(String),
}

impl CheckError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns `true` if the backend could not be reached at all.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Route(_) | Self::Io(_) | Self::ConnectionClosed)
    }
}

/// Specialized `Result` type for backend lookups.
pub type Result<T> = std::result::Result<T, CheckError>;
