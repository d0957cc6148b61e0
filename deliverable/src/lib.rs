//! Mailbox verification for SMTP senders and recipients.
//!
//! Addresses are checked against the Dovecot auth-master userdb. The MAIL FROM
//! check only marks the transaction when the sender is local; the RCPT TO check
//! accepts local mailboxes, and accepts any recipient from a relaying client
//! whose sender was marked local. Everything else is left to the rest of the
//! hook chain.

pub mod config;
pub mod error;
pub mod lookup;
pub mod policy;
pub mod protocol;
pub mod route;
pub mod transaction;

pub use config::{RouteConfig, RouteConfigHandle};
pub use error::{CheckError, RouteError};
pub use lookup::MailboxLookup;
pub use policy::{Decision, VerificationRequest, Verifier};
pub use protocol::{AuthClient, Classification};
pub use route::ConnectionTarget;
pub use transaction::Transaction;
