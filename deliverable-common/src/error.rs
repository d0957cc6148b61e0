//! Error types for the deliverable-common crate.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while loading or reloading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Unable to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML, or does not match the schema.
    #[error("Unable to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configuration value is invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

impl ConfigError {
    /// Returns `true` if the error came from reading the file rather than its contents.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
