//! RtlTcpBuilder -- fluent builder for constructing [`RtlTcpClient`] instances.
//!
//! Separates configuration from construction so that callers can set
//! timeouts, handshake strictness, and the logging span before the TCP
//! connection is opened.
//!
//! # Example
//!
//! ```no_run
//! use rtltcp::RtlTcpBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> rtltcp::Result<()> {
//! let client = RtlTcpBuilder::new("192.168.1.50:1234")
//!     .connect_timeout(Duration::from_secs(2))
//!     .read_timeout(Some(Duration::from_secs(1)))
//!     .strict_handshake(true)
//!     .span(tracing::info_span!("dongle", name = "roof"))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::Instrument;

use rtltcp_core::error::Result;
use rtltcp_core::transport::RtlTcpTransport;
use rtltcp_transport::tcp::{self, DEFAULT_CONNECT_TIMEOUT};

use crate::client::{self, ClientOptions, DEFAULT_HANDSHAKE_TIMEOUT, RtlTcpClient};

/// Fluent builder for [`RtlTcpClient`].
///
/// Only the server address is required:
///
/// ```ignore
/// let client = RtlTcpBuilder::new("127.0.0.1:1234").build().await?;
/// ```
pub struct RtlTcpBuilder {
    addr: String,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    read_timeout: Option<Duration>,
    strict_handshake: bool,
    nodelay: bool,
    span: Option<tracing::Span>,
}

impl RtlTcpBuilder {
    /// Create a builder for the server at `addr` (`host:port`).
    pub fn new(addr: &str) -> Self {
        RtlTcpBuilder {
            addr: addr.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            read_timeout: None,
            strict_handshake: false,
            nodelay: true,
            span: None,
        }
    }

    /// Set the TCP connect timeout (default: 5s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long to wait for the 12-byte greeting (default: 5s).
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set a deadline for each sample read (default: none, reads block
    /// until data arrives).
    ///
    /// A read that hits the deadline fails with
    /// [`Error::Timeout`](rtltcp_core::Error::Timeout) and leaves the
    /// sample stream unusable.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Reject a greeting whose magic is not `RTL0` (default: false).
    ///
    /// When disabled, a bad magic is logged at `warn` and reported only
    /// through [`RtlTcpClient::check_handshake`].
    pub fn strict_handshake(mut self, strict: bool) -> Self {
        self.strict_handshake = strict;
        self
    }

    /// Enable or disable `TCP_NODELAY` (default: true).
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Span that all log events of this client are emitted in.
    ///
    /// Defaults to a `debug`-level span named `rtl_tcp` carrying the
    /// address.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Connect to the server and complete the handshake.
    pub async fn build(self) -> Result<RtlTcpClient> {
        let options = self.options();
        let transport = tcp::connect_with_timeout(&self.addr, self.connect_timeout, self.nodelay)
            .instrument(options.span.clone())
            .await?;
        client::establish(transport, options).await
    }

    /// Complete the handshake over an already-connected transport.
    ///
    /// This is the primary entry point for testing: pass the halves of a
    /// [`tokio::io::duplex`] pair, or a stream connected to a mock server.
    ///
    /// # Example (testing with `tokio::io::duplex`)
    ///
    /// ```no_run
    /// use rtltcp::RtlTcpBuilder;
    /// use rtltcp_core::transport::RtlTcpTransport;
    ///
    /// # async fn example() -> rtltcp::Result<()> {
    /// let (client_stream, _server_stream) = tokio::io::duplex(4096);
    /// let transport = RtlTcpTransport::from_stream(client_stream, "duplex");
    /// let client = RtlTcpBuilder::new("duplex")
    ///     .build_with_transport(transport)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn build_with_transport(self, transport: RtlTcpTransport) -> Result<RtlTcpClient> {
        client::establish(transport, self.options()).await
    }

    fn options(&self) -> ClientOptions {
        let span = self
            .span
            .clone()
            .unwrap_or_else(|| tracing::debug_span!("rtl_tcp", addr = %self.addr));
        ClientOptions {
            handshake_timeout: self.handshake_timeout,
            read_timeout: self.read_timeout,
            strict_handshake: self.strict_handshake,
            span,
        }
    }
}
