//! The Dovecot auth-master userdb lookup.
//!
//! The exchange is two lines each way, tab separated and newline terminated:
//!
//! ```text
//! S: VERSION\t1\t1
//! S: SPID\t1234            (optional)
//! C: VERSION\t1\t0
//! C: USER\t1\tuser@example.com\tservice=smtp
//! S: USER\t1\tuser@example.com\t...   | FAIL\t1\t...   | NOTFOUND\t1
//! ```

mod classify;
pub mod client;

use std::fmt::{self, Display};

pub use classify::classify;
pub use client::AuthClient;

/// How a completed exchange turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The backend announced itself, the lookup can be sent
    Continue(&'static str),
    /// The mailbox exists
    Verified(&'static str),
    /// The backend could not answer right now
    TemporarilyUnavailable(&'static str),
    /// Anything else, including "not found" and garbage
    Unclassified(&'static str),
}

impl Classification {
    #[must_use]
    pub const fn detail(&self) -> &'static str {
        match self {
            Self::Continue(detail)
            | Self::Verified(detail)
            | Self::TemporarilyUnavailable(detail)
            | Self::Unclassified(detail) => detail,
        }
    }

    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.detail())
    }
}

/// Where a single connection is in the exchange. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolState {
    AwaitingBanner,
    AwaitingUserResult,
    Done,
}

/// What the client should do after feeding a line to [`ProtocolState::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the lookup request and keep reading
    SendRequest,
    /// Nothing to do, read the next line
    Ignore,
    /// The exchange is over
    Complete(Classification),
}

impl ProtocolState {
    /// Feed one received line (newline included) and move forward.
    ///
    /// Only a `VERSION` banner lets the request go out; any other first line
    /// ends the exchange as [`Classification::Unclassified`]. `SPID` lines
    /// trail the banner and are skipped.
    pub fn advance(&mut self, line: &str) -> Transition {
        match self {
            Self::AwaitingBanner => match classify(line) {
                Classification::Continue(_) => {
                    *self = Self::AwaitingUserResult;
                    Transition::SendRequest
                }
                _ => {
                    *self = Self::Done;
                    Transition::Complete(Classification::Unclassified(
                        classify::MAILBOX_NOT_FOUND,
                    ))
                }
            },
            Self::AwaitingUserResult if classify::starts_with_ignore_case(line, "SPID\t") => {
                Transition::Ignore
            }
            Self::AwaitingUserResult => {
                *self = Self::Done;
                Transition::Complete(classify(line))
            }
            Self::Done => Transition::Ignore,
        }
    }
}

/// The bytes sent once the banner has been accepted.
///
/// The address goes out verbatim, callers must keep tabs and newlines out of it.
#[must_use]
pub fn lookup_request(address: &str) -> String {
    format!("VERSION\t1\t0\nUSER\t1\t{address}\tservice=smtp\n")
}
