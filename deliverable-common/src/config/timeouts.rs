//! Timeouts for a single mailbox lookup.
//!
//! The auth backend protocol has no timeouts of its own: a backend that
//! accepts the connection and then stays silent would otherwise stall the
//! SMTP transaction forever. Both phases of a lookup are bounded separately:
//!
//! - **connect**: opening the unix or TCP socket
//! - **exchange**: banner, request and reply, measured as one span

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts applied to every lookup against the auth backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTimeouts {
    /// Timeout for establishing the connection.
    ///
    /// Default: 5 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Timeout for the banner/request/reply exchange once connected.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::exchange_secs")]
    pub exchange_secs: u64,
}

impl LookupTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn exchange(&self) -> Duration {
        Duration::from_secs(self.exchange_secs)
    }

    /// Upper bound on how long a single lookup can take.
    #[must_use]
    pub const fn total(&self) -> Duration {
        Duration::from_secs(self.connect_secs + self.exchange_secs)
    }
}

impl Default for LookupTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            exchange_secs: defaults::exchange_secs(),
        }
    }
}

mod defaults {
    pub const fn connect_secs() -> u64 {
        5
    }

    pub const fn exchange_secs() -> u64 {
        10
    }
}
