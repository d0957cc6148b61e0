use async_trait::async_trait;
use deliverable_common::config::LookupTimeouts;

use crate::{error::Result, protocol::Classification, route::ConnectionTarget};

/// Something that can tell whether an address belongs to a local mailbox.
///
/// [`crate::protocol::AuthClient`] is the real implementation; the policy only
/// ever sees this trait.
#[async_trait]
pub trait MailboxLookup: Send + Sync {
    /// Look `address` up at `target`, using exactly one connection.
    ///
    /// # Errors
    ///
    /// Returns an error if no classification could be produced.
    async fn lookup(
        &self,
        target: &ConnectionTarget,
        address: &str,
        timeouts: &LookupTimeouts,
    ) -> Result<Classification>;
}
