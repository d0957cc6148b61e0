//! Turn a lookup into a decision for the SMTP command being checked.
//!
//! Nothing here ever rejects outright. A verified mailbox is accepted, a
//! backend that cannot be reached defers, and everything else is left for
//! the other checks in the chain to decide.

use std::fmt::{self, Display};

use deliverable_common::{internal, tracing};

use crate::{
    config::RouteConfig,
    error::Result,
    lookup::MailboxLookup,
    protocol::{AuthClient, Classification},
    route,
    transaction::{Annotation, Transaction},
};

/// Reply text when a recipient could not be checked.
pub const RCPT_DEFER_MESSAGE: &str = "error validating email address";

/// What the hook layer should do with the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Accept, no further checks needed
    Accept,
    /// Temporary failure, the client should retry later
    SoftDefer(String),
    /// No opinion, carry on with the next check
    Proceed,
    /// No verdict, but pass a note along to the next check
    ProceedWithNote(String),
}

impl Decision {
    #[must_use]
    pub const fn is_soft_defer(&self) -> bool {
        matches!(self, Self::SoftDefer(_))
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("accept"),
            Self::SoftDefer(message) => write!(f, "soft-defer ({message})"),
            Self::Proceed => f.write_str("proceed"),
            Self::ProceedWithNote(note) => write!(f, "proceed ({note})"),
        }
    }
}

/// A single address to verify, with the SMTP phase it was seen in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationRequest {
    MailFrom {
        address: String,
        domain: String,
    },
    RcptTo {
        address: String,
        domain: String,
        /// The client is allowed to relay through us
        relaying: bool,
    },
}

impl VerificationRequest {
    /// A MAIL FROM check, taking the domain from the address.
    #[must_use]
    pub fn mail_from(address: &str) -> Self {
        Self::MailFrom {
            address: address.to_string(),
            domain: domain_of(address),
        }
    }

    /// A RCPT TO check, taking the domain from the address.
    #[must_use]
    pub fn rcpt_to(address: &str, relaying: bool) -> Self {
        Self::RcptTo {
            address: address.to_string(),
            domain: domain_of(address),
            relaying,
        }
    }
}

fn domain_of(address: &str) -> String {
    address
        .rsplit_once('@')
        .map_or("", |(_, domain)| domain)
        .to_ascii_lowercase()
}

/// Runs lookups and interprets them per SMTP phase.
pub struct Verifier<L = AuthClient> {
    lookup: L,
}

impl Verifier {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lookup: AuthClient::new(),
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: MailboxLookup> Verifier<L> {
    pub const fn with_lookup(lookup: L) -> Self {
        Self { lookup }
    }

    /// Verify a single request against `config`.
    ///
    /// Returns `None` when there is no active transaction; nothing is checked
    /// and no decision is made in that case.
    pub async fn verify(
        &self,
        txn: Option<&mut Transaction>,
        config: &RouteConfig,
        request: &VerificationRequest,
    ) -> Option<Decision> {
        match request {
            VerificationRequest::MailFrom { address, domain } => {
                Some(self.mail_from(txn?, config, address, domain).await)
            }
            VerificationRequest::RcptTo {
                address,
                domain,
                relaying,
            } => self.rcpt_to(txn, config, address, domain, *relaying).await,
        }
    }

    /// MAIL FROM: mark the transaction when the sender is a local mailbox.
    ///
    /// Skipped entirely unless `check_outbound` is set. A sender is never
    /// rejected from here.
    pub async fn mail_from(
        &self,
        txn: &mut Transaction,
        config: &RouteConfig,
        sender: &str,
        domain: &str,
    ) -> Decision {
        if !config.main.check_outbound {
            return Decision::Proceed;
        }

        // Bounces, or a relay client without an envelope sender
        if sender.is_empty() {
            txn.annotate(Annotation::skip("mail_from.null").emitted());
            return Decision::Proceed;
        }

        let decision = match self.check(txn, config, domain, sender).await {
            Err(err) => {
                let message = err.to_string();
                txn.annotate(Annotation::err(message.clone()));
                Decision::SoftDefer(message)
            }
            Ok(Classification::Verified(detail)) => {
                txn.annotate(Annotation::pass(format!("mail_from.{detail}")));
                txn.mark_local_sender();
                Decision::Proceed
            }
            Ok(Classification::Unclassified(detail)) => {
                txn.annotate(Annotation::err(format!("mail_from.{detail}")));
                Decision::Proceed
            }
            Ok(other) => {
                let note = format!("mail_from.{}", other.detail());
                txn.annotate(Annotation::msg(note.clone()));
                Decision::ProceedWithNote(note)
            }
        };

        internal!(level = DEBUG, "MAIL FROM:<{sender}> => {decision}");
        decision
    }

    /// RCPT TO: accept local mailboxes, and anything from a relaying local sender.
    pub async fn rcpt_to(
        &self,
        txn: Option<&mut Transaction>,
        config: &RouteConfig,
        recipient: &str,
        domain: &str,
        relaying: bool,
    ) -> Option<Decision> {
        let txn = txn?;

        let decision = match self.check(txn, config, domain, recipient).await {
            Err(err) => {
                tracing::error!("Unable to verify {recipient}: {err}");
                txn.annotate(Annotation::err(err.to_string()));
                Decision::SoftDefer(RCPT_DEFER_MESSAGE.to_string())
            }
            Ok(Classification::Verified(detail)) => {
                txn.annotate(Annotation::pass(format!("rcpt.{detail}")));
                Decision::Accept
            }
            Ok(_) if relaying && txn.local_sender() => {
                txn.annotate(Annotation::pass("relaying local_sender"));
                Decision::Accept
            }
            Ok(Classification::Unclassified(detail)) => {
                txn.annotate(Annotation::err(format!("rcpt.{detail}")));
                Decision::Proceed
            }
            Ok(other) => {
                txn.annotate(Annotation::msg(format!("rcpt.{}", other.detail())));
                Decision::ProceedWithNote(other.detail().to_string())
            }
        };

        internal!(level = DEBUG, "RCPT TO:<{recipient}> => {decision}");
        Some(decision)
    }

    async fn check(
        &self,
        txn: &mut Transaction,
        config: &RouteConfig,
        domain: &str,
        address: &str,
    ) -> Result<Classification> {
        let target = route::resolve(&domain.to_ascii_lowercase(), config)?;
        txn.annotate(Annotation::msg(format!("sock: {target}")));

        internal!(
            level = DEBUG,
            "Checking {address} against {target}, allowing up to {:?}",
            config.main.timeouts.total()
        );
        self.lookup
            .lookup(&target, address, &config.main.timeouts)
            .await
    }
}
