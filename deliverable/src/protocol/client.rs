//! Async client for a single auth-master lookup.

#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use async_trait::async_trait;
use deliverable_common::{config::LookupTimeouts, incoming, internal, outgoing, tracing};

use super::{
    Classification, ProtocolState, Transition, classify::MAILBOX_NOT_FOUND, lookup_request,
};
use crate::{
    error::{CheckError, Result},
    lookup::MailboxLookup,
    route::ConnectionTarget,
};

/// Size of each read from the socket.
const READ_SIZE: usize = 1024;

/// Longest line accepted from the backend before giving up.
pub const MAX_LINE_LENGTH: usize = 16 * 1024;

/// A connection to the auth backend over either transport.
enum AuthConnection {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl AuthConnection {
    async fn open(target: &ConnectionTarget) -> Result<Self> {
        match target {
            #[cfg(unix)]
            ConnectionTarget::Unix(path) => Ok(Self::Unix(UnixStream::connect(path).await?)),
            #[cfg(not(unix))]
            ConnectionTarget::Unix(_) => Err(CheckError::Io(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            ))),
            ConnectionTarget::Tcp { host, port } => {
                Ok(Self::Tcp(TcpStream::connect((host.as_str(), *port)).await?))
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.write_all(data).await?,
            Self::Tcp(stream) => stream.write_all(data).await?,
        }
        Ok(())
    }

    /// Reads into `buf`, returning 0 once the peer has closed.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf).await?,
            Self::Tcp(stream) => stream.read(buf).await?,
        };
        Ok(n)
    }

    async fn close(&mut self) {
        let result = match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown().await,
            Self::Tcp(stream) => stream.shutdown().await,
        };

        if let Err(err) = result {
            tracing::debug!("Error closing auth backend connection: {err}");
        }
    }
}

/// Accumulates bytes until whole lines are available.
///
/// The backend may split a line over several reads, or pack several lines
/// into one, so nothing is classified until its `\n` has arrived.
#[derive(Debug, Default)]
struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Pops the next complete line, newline included.
    fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whatever is left once the peer has closed, if anything.
    fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }

        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    const fn len(&self) -> usize {
        self.buffer.len()
    }
}

/// Reads one line from `connection`, buffering partial reads.
///
/// A partial line left when the peer closes is returned as-is, without a
/// newline, so that it classifies as unmatched. `None` means the backend
/// sent more than [`MAX_LINE_LENGTH`] bytes without ending the line.
async fn read_line(
    connection: &mut AuthConnection,
    lines: &mut LineBuffer,
) -> Result<Option<String>> {
    let mut chunk = [0u8; READ_SIZE];

    loop {
        if let Some(line) = lines.next_line() {
            return Ok(Some(line));
        }

        if lines.len() > MAX_LINE_LENGTH {
            return Ok(None);
        }

        let n = connection.read(&mut chunk).await?;
        if n == 0 {
            return lines
                .take_remainder()
                .map(Some)
                .ok_or(CheckError::ConnectionClosed);
        }

        lines.extend(&chunk[..n]);
    }
}

/// Client for looking up a single address against the auth backend.
///
/// Every lookup opens its own connection and closes it again, nothing is
/// pooled or pipelined.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthClient;

impl AuthClient {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Ask the backend at `target` whether `address` is a known user.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be put on the wire, the
    /// connection cannot be established or breaks, or either timeout expires.
    /// Unexpected or oversized replies are not errors: they classify as
    /// [`Classification::Unclassified`].
    pub async fn check(
        &self,
        target: &ConnectionTarget,
        address: &str,
        timeouts: &LookupTimeouts,
    ) -> Result<Classification> {
        if address.contains(['\t', '\r', '\n']) {
            return Err(CheckError::InvalidAddress(address.to_string()));
        }

        let mut connection = timeout(timeouts.connect(), AuthConnection::open(target))
            .await
            .map_err(|_| CheckError::Timeout(timeouts.connect()))??;

        internal!(level = DEBUG, "Connected to auth backend at {target}");

        let result = timeout(timeouts.exchange(), exchange(&mut connection, address))
            .await
            .map_err(|_| CheckError::Timeout(timeouts.exchange()))
            .and_then(|result| result);

        connection.close().await;
        internal!("Closed connection to auth backend at {target}");

        result
    }
}

async fn exchange(connection: &mut AuthConnection, address: &str) -> Result<Classification> {
    let mut lines = LineBuffer::default();
    let mut state = ProtocolState::AwaitingBanner;

    loop {
        let Some(line) = read_line(connection, &mut lines).await? else {
            internal!(
                level = WARN,
                "Auth backend line exceeds {MAX_LINE_LENGTH} bytes, treating as unmatched"
            );
            return Ok(Classification::Unclassified(MAILBOX_NOT_FOUND));
        };
        incoming!("{}", line.escape_debug());

        match state.advance(&line) {
            Transition::SendRequest => {
                let request = lookup_request(address);
                outgoing!("{}", request.escape_debug());
                connection.send(request.as_bytes()).await?;
            }
            Transition::Ignore => {}
            Transition::Complete(classification) => return Ok(classification),
        }
    }
}

#[async_trait]
impl MailboxLookup for AuthClient {
    async fn lookup(
        &self,
        target: &ConnectionTarget,
        address: &str,
        timeouts: &LookupTimeouts,
    ) -> Result<Classification> {
        self.check(target, address, timeouts).await
    }
}
