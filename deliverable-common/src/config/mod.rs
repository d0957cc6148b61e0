//! Configuration plumbing shared by the deliverable crates.
//!
//! - [`timeouts`]: bounds applied to every backend lookup
//! - [`handle`]: atomically swapped configuration snapshots

pub mod handle;
pub mod timeouts;

pub use handle::{ConfigHandle, Reloadable};
pub use timeouts::LookupTimeouts;
