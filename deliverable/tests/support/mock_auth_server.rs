//! Mock Dovecot auth-master backend for testing lookups
#![allow(dead_code)] // Test utility module - not all methods used in every test
//!
//! The mock can:
//! - Send an arbitrary banner, optionally split into delayed fragments
//! - Answer the lookup request with an arbitrary reply, or hang up
//! - Stay silent to exercise timeouts
//! - Record every request it received for verification
//!
//! # Example
//!
//! ```rust,no_run
//! let server = MockAuthServer::builder()
//!     .with_banner("VERSION\t1\t1\n")
//!     .with_reply("FAIL\t1\n")
//!     .build()
//!     .await?;
//!
//! let config = server.route_config(true);
//! ```

use std::{
    io,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use deliverable::{
    ConnectionTarget, RouteConfig,
    config::{MainSection, RouteEntry},
};
use deliverable_common::{config::LookupTimeouts, tracing};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::{TcpListener, UnixListener},
    sync::RwLock,
    time::timeout,
};

/// Dovecot's usual auth-master greeting
pub const DOVECOT_BANNER: &str = "VERSION\t1\t1\nSPID\t4242\n";

trait AuthStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AuthStream for T {}

enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    async fn accept(&self) -> io::Result<Box<dyn AuthStream>> {
        Ok(match self {
            Self::Tcp(listener) => Box::new(listener.accept().await?.0),
            Self::Unix(listener) => Box::new(listener.accept().await?.0),
        })
    }
}

#[derive(Clone)]
struct MockServerConfig {
    banner: Vec<String>,
    fragment_delay: Option<Duration>,
    reply: Option<String>,
    reply_delay: Option<Duration>,
    silent: bool,
    hang_up_after_banner: bool,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            banner: vec![DOVECOT_BANNER.to_string()],
            fragment_delay: None,
            reply: Some("USER\t1\tuser@example.com\tuid=1000\tgid=1000\n".to_string()),
            reply_delay: None,
            silent: false,
            hang_up_after_banner: false,
        }
    }
}

/// Mock auth-master backend
pub struct MockAuthServer {
    target: ConnectionTarget,
    config: Arc<MockServerConfig>,
    requests: Arc<RwLock<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    // Keeps the unix socket directory alive for as long as the server
    _socket_dir: Option<tempfile::TempDir>,
}

impl MockAuthServer {
    #[must_use]
    pub fn builder() -> MockAuthServerBuilder {
        MockAuthServerBuilder::new()
    }

    #[must_use]
    pub const fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// A route entry pointing at this server
    #[must_use]
    pub fn route(&self) -> RouteEntry {
        match &self.target {
            ConnectionTarget::Unix(path) => RouteEntry::unix(path.clone()),
            ConnectionTarget::Tcp { host, port } => RouteEntry::tcp(host.clone(), *port),
        }
    }

    /// A configuration routing every domain to this server
    #[must_use]
    pub fn route_config(&self, check_outbound: bool) -> RouteConfig {
        RouteConfig::new(MainSection {
            check_outbound,
            route: self.route(),
            timeouts: test_timeouts(),
        })
    }

    /// Number of connections accepted so far
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Wait until `count` sessions have finished and return what each received
    ///
    /// A session that never got a request records an empty string.
    pub async fn requests(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            {
                let requests = self.requests.read().await;
                if requests.len() >= count {
                    return requests.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        self.requests.read().await.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle_client(
        stream: Box<dyn AuthStream>,
        config: Arc<MockServerConfig>,
        requests: Arc<RwLock<Vec<String>>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if config.silent {
            // Accept the connection and never say anything
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Ok(());
        }

        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        for fragment in &config.banner {
            writer.write_all(fragment.as_bytes()).await?;
            writer.flush().await?;

            if let Some(delay) = config.fragment_delay {
                tokio::time::sleep(delay).await;
            }
        }

        if config.hang_up_after_banner {
            writer.shutdown().await?;
            requests.write().await.push(String::new());
            return Ok(());
        }

        // VERSION and USER lines, or whatever arrives before the client hangs up
        let mut received = String::new();
        let mut lines = 0;
        while lines < 2 {
            match timeout(Duration::from_secs(5), reader.read_line(&mut received)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(_)) => lines += 1,
                Ok(Err(e)) => return Err(e.into()),
            }
        }

        tracing::debug!("Mock auth server received: {received:?}");
        requests.write().await.push(received);

        if lines < 2 {
            return Ok(());
        }

        if let Some(delay) = config.reply_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reply) = &config.reply {
            writer.write_all(reply.as_bytes()).await?;
            writer.flush().await?;
        }

        writer.shutdown().await?;
        Ok(())
    }
}

impl Drop for MockAuthServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for configuring a `MockAuthServer`
pub struct MockAuthServerBuilder {
    config: MockServerConfig,
}

impl MockAuthServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
        }
    }

    /// Send `banner` in a single write
    #[must_use]
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.config.banner = vec![banner.into()];
        self
    }

    /// Send the banner as separate writes, pausing between each
    #[must_use]
    pub fn with_banner_fragments(mut self, fragments: &[&str], delay: Duration) -> Self {
        self.config.banner = fragments.iter().map(ToString::to_string).collect();
        self.config.fragment_delay = Some(delay);
        self
    }

    /// Reply to the lookup request with `reply`, sent verbatim
    #[must_use]
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.config.reply = Some(reply.into());
        self
    }

    /// Close the connection after the request instead of replying
    #[must_use]
    pub fn without_reply(mut self) -> Self {
        self.config.reply = None;
        self
    }

    #[must_use]
    pub const fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.config.reply_delay = Some(delay);
        self
    }

    /// Accept connections but never send anything
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.config.silent = true;
        self
    }

    /// Close the connection right after the banner
    #[must_use]
    pub const fn hang_up_after_banner(mut self) -> Self {
        self.config.hang_up_after_banner = true;
        self
    }

    /// Start the server on a random TCP port
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind
    pub async fn build(self) -> io::Result<MockAuthServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;

        let target = ConnectionTarget::Tcp {
            host: addr.ip().to_string(),
            port: addr.port(),
        };

        Ok(self.spawn(Listener::Tcp(listener), target, None))
    }

    /// Start the server on a unix socket in a fresh temporary directory
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created
    pub async fn build_unix(self) -> io::Result<MockAuthServer> {
        let dir = tempfile::tempdir()?;
        let path: PathBuf = dir.path().join("auth-master");
        let listener = UnixListener::bind(&path)?;

        Ok(self.spawn(
            Listener::Unix(listener),
            ConnectionTarget::Unix(path),
            Some(dir),
        ))
    }

    fn spawn(
        self,
        listener: Listener,
        target: ConnectionTarget,
        socket_dir: Option<tempfile::TempDir>,
    ) -> MockAuthServer {
        let config = Arc::new(self.config);
        let requests = Arc::new(RwLock::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let config_clone = Arc::clone(&config);
        let requests_clone = Arc::clone(&requests);
        let connections_clone = Arc::clone(&connections);
        let shutdown_clone = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                // Accept with a timeout so the shutdown flag gets checked
                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok(stream)) = accept_result {
                    connections_clone.fetch_add(1, Ordering::Relaxed);

                    let config = Arc::clone(&config_clone);
                    let requests = Arc::clone(&requests_clone);

                    tokio::spawn(async move {
                        let result = MockAuthServer::handle_client(stream, config, requests).await;
                        if let Err(e) = result {
                            tracing::debug!("Mock auth server client error: {e}");
                        }
                    });
                }
            }
        });

        MockAuthServer {
            target,
            config,
            requests,
            connections,
            shutdown,
            _socket_dir: socket_dir,
        }
    }
}

/// Short timeouts so that failing tests fail quickly
#[must_use]
pub const fn test_timeouts() -> LookupTimeouts {
    LookupTimeouts {
        connect_secs: 2,
        exchange_secs: 2,
    }
}

/// A TCP target that nothing is listening on
///
/// # Errors
///
/// Returns an error if no port could be reserved
pub async fn refused_target() -> io::Result<ConnectionTarget> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    Ok(ConnectionTarget::Tcp {
        host: addr.ip().to_string(),
        port: addr.port(),
    })
}
