//! Routing configuration for the auth backend.
//!
//! ```toml
//! [main]
//! check_outbound = true
//! path = "/var/run/dovecot/auth-master"
//! exchange_secs = 5
//!
//! [domains."example.com"]
//! host = "10.0.0.5"
//! port = 12345
//! ```
//!
//! Domain keys are lower-cased on load, lookups are exact.

use std::{collections::HashMap, path::Path, path::PathBuf, str::FromStr};

use deliverable_common::{
    config::{ConfigHandle, LookupTimeouts, Reloadable},
    error::ConfigError,
};
use serde::{Deserialize, Serialize};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/deliverable/deliverable.toml";

/// Where to reach the auth backend for a domain.
///
/// A `path` wins over `host`/`port` when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteEntry {
    /// Unix socket of the auth-master listener
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl RouteEntry {
    /// Route over a unix socket
    #[must_use]
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Route over TCP
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    /// Returns `true` if this entry names no socket path, host or port.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.path.is_none() && self.host.is_none() && self.port.is_none()
    }
}

/// The `[main]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainSection {
    /// Also verify MAIL FROM addresses, marking verified senders as local.
    #[serde(default, alias = "check_outbound_mail")]
    pub check_outbound: bool,

    /// Route used for any domain without its own section
    #[serde(flatten)]
    pub route: RouteEntry,

    #[serde(flatten)]
    pub timeouts: LookupTimeouts,
}

/// Immutable snapshot of the routing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub main: MainSection,

    #[serde(default)]
    domains: HashMap<String, RouteEntry>,
}

/// Shared, reloadable routing configuration.
pub type RouteConfigHandle = ConfigHandle<RouteConfig>;

impl RouteConfig {
    #[must_use]
    pub fn new(main: MainSection) -> Self {
        Self {
            main,
            domains: HashMap::new(),
        }
    }

    /// Add or replace the route for `domain`.
    #[must_use]
    pub fn with_domain(mut self, domain: &str, entry: RouteEntry) -> Self {
        self.domains.insert(domain.to_ascii_lowercase(), entry);
        self
    }

    /// Route override for a lower-cased domain, if one is configured.
    #[must_use]
    pub fn domain(&self, domain: &str) -> Option<&RouteEntry> {
        self.domains.get(domain)
    }

    /// Number of domains with their own section
    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    fn normalise(mut self) -> Result<Self, ConfigError> {
        let mut domains = HashMap::with_capacity(self.domains.len());

        for (domain, entry) in self.domains.drain() {
            let lowered = domain.to_ascii_lowercase();
            if domains.insert(lowered.clone(), entry).is_some() {
                return Err(ConfigError::InvalidConfiguration {
                    field: format!("domains.{lowered}"),
                    reason: "configured more than once".to_string(),
                });
            }
        }

        self.domains = domains;
        Ok(self)
    }
}

impl FromStr for RouteConfig {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        toml::from_str::<Self>(contents)?.normalise()
    }
}

impl Reloadable for RouteConfig {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .parse()
    }
}
