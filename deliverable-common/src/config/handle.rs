//! Atomically swappable configuration snapshots.
//!
//! Readers take an `Arc` snapshot at the start of a request and keep using
//! it until the request finishes, even if a reload lands in the meantime.
//! A reload always replaces the whole value.

use std::{path::Path, sync::Arc};

use tokio::sync::watch;

use crate::{error::ConfigError, internal};

/// Configuration that can be (re)loaded from a file on disk.
pub trait Reloadable: Sized + Send + Sync + 'static {
    /// Load a fresh value from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn load(path: &Path) -> Result<Self, ConfigError>;
}

/// Shared handle to the current configuration snapshot.
pub struct ConfigHandle<T> {
    sender: Arc<watch::Sender<Arc<T>>>,
}

impl<T> Clone for ConfigHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Send + Sync + 'static> ConfigHandle<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        let (sender, _receiver) = watch::channel(Arc::new(initial));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// The configuration as it is right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.sender.borrow())
    }

    /// Swap in a new configuration. Snapshots already handed out are unaffected.
    pub fn replace(&self, value: T) {
        self.sender.send_replace(Arc::new(value));
    }
}

impl<T: Reloadable> ConfigHandle<T> {
    /// Load the configuration at `path` into a new handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial load fails.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        T::load(path).map(Self::new)
    }

    /// Reload from `path`. On failure the previous snapshot stays current.
    ///
    /// # Errors
    ///
    /// Returns the load error, after which nothing has changed.
    pub fn reload(&self, path: &Path) -> Result<(), ConfigError> {
        match T::load(path) {
            Ok(value) => {
                internal!(level = INFO, "Reloaded configuration from {}", path.display());
                self.replace(value);
                Ok(())
            }
            Err(err) => {
                internal!(
                    level = WARN,
                    "Keeping previous configuration, reload of {} failed: {err}",
                    path.display()
                );
                Err(err)
            }
        }
    }
}
