//! Run one SMTP transaction's worth of mailbox checks from the command line
//!
//! Useful for checking a configuration against a live Dovecot before
//! wiring it into the MTA:
//!
//! ```text
//! deliverable -c deliverable.toml --mail-from me@example.com \
//!     --rcpt-to you@example.com --rcpt-to them@remote.example --relaying
//! ```

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use deliverable::{
    RouteConfigHandle, Transaction, VerificationRequest, Verifier, config::DEFAULT_CONFIG_PATH,
};
use deliverable_common::logging;

/// Exit status when any address could not be checked (`EX_TEMPFAIL`)
const EXIT_TEMPFAIL: u8 = 75;

/// Verify envelope addresses against the Dovecot auth-master userdb
#[derive(Parser, Debug)]
#[command(name = "deliverable")]
#[command(about = "Verify envelope addresses against Dovecot", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Envelope sender; pass an empty string for the null sender
    #[arg(long)]
    mail_from: Option<String>,

    /// Envelope recipient, may be repeated
    #[arg(long = "rcpt-to", required = true)]
    rcpt_to: Vec<String>,

    /// Treat the client as allowed to relay
    #[arg(long)]
    relaying: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    logging::init();

    let cli = Cli::parse();
    let config = RouteConfigHandle::open(&cli.config)?.snapshot();
    let verifier = Verifier::new();
    let mut txn = Transaction::new();

    let mut requests = Vec::with_capacity(cli.rcpt_to.len() + 1);
    if let Some(sender) = &cli.mail_from {
        requests.push(VerificationRequest::mail_from(sender));
    }
    requests.extend(
        cli.rcpt_to
            .iter()
            .map(|rcpt| VerificationRequest::rcpt_to(rcpt, cli.relaying)),
    );

    let mut deferred = false;
    for request in &requests {
        let (phase, address) = match request {
            VerificationRequest::MailFrom { address, .. } => ("MAIL FROM", address),
            VerificationRequest::RcptTo { address, .. } => ("RCPT TO", address),
        };

        if let Some(decision) = verifier.verify(Some(&mut txn), &config, request).await {
            deferred |= decision.is_soft_defer();
            println!("{phase}:<{address}> {decision}");
        }
    }

    if !txn.results().is_empty() {
        println!("annotations:");
    }
    for annotation in txn.results().iter() {
        println!("  {annotation}");
    }

    Ok(if deferred {
        ExitCode::from(EXIT_TEMPFAIL)
    } else {
        ExitCode::SUCCESS
    })
}
