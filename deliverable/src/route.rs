//! Pick the auth backend to ask for a given domain.

use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use crate::{
    config::{RouteConfig, RouteEntry},
    error::RouteError,
};

/// Host used when a route only names a port.
const DEFAULT_HOST: &str = "localhost";

/// A single place to open a connection to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

impl Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

impl RouteEntry {
    /// The target this entry describes, or `None` if it describes nothing.
    fn target(&self) -> Option<Result<ConnectionTarget, RouteError>> {
        if let Some(path) = &self.path {
            return Some(Ok(ConnectionTarget::Unix(path.clone())));
        }

        match (&self.host, self.port) {
            (Some(host), Some(port)) => Some(Ok(ConnectionTarget::Tcp {
                host: host.clone(),
                port,
            })),
            (Some(host), None) => Some(Err(RouteError::MissingPort { host: host.clone() })),
            (None, Some(port)) => Some(Ok(ConnectionTarget::Tcp {
                host: DEFAULT_HOST.to_string(),
                port,
            })),
            (None, None) => None,
        }
    }
}

/// Resolve the connection target for an already lower-cased `domain`.
///
/// The domain's own section is consulted first, then `[main]`. A domain
/// section that names nothing falls through to `[main]` as well.
///
/// # Errors
///
/// Returns a [`RouteError`] if neither section yields a usable target.
pub fn resolve(domain: &str, config: &RouteConfig) -> Result<ConnectionTarget, RouteError> {
    config
        .domain(domain)
        .and_then(RouteEntry::target)
        .or_else(|| config.main.route.target())
        .unwrap_or_else(|| {
            Err(RouteError::NoTarget {
                domain: domain.to_string(),
            })
        })
}
