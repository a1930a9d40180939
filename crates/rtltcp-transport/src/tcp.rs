//! TCP transport for rtl_tcp servers.
//!
//! rtl_tcp listens on TCP (port 1234 by default) and speaks a single
//! stream: handshake and samples flow from the server, commands flow to it.
//! This module opens that stream with a bounded connect time and hands it
//! back as an [`RtlTcpTransport`] split into read and write halves.
//!
//! # Example
//!
//! ```no_run
//! use rtltcp_transport::tcp;
//! use std::time::Duration;
//!
//! # async fn example() -> rtltcp_core::Result<()> {
//! let transport = tcp::connect("192.168.1.50:1234").await?;
//! println!("connected to {}", transport.peer);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use rtltcp_core::error::{Error, Result};
use rtltcp_core::transport::RtlTcpTransport;
use tokio::net::TcpStream;

/// Default TCP port of the rtl_tcp server.
pub const DEFAULT_PORT: u16 = 1234;

/// Default connection timeout (5 seconds).
///
/// Long enough for LAN and most internet links, short enough that an
/// unreachable server is reported promptly.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to an rtl_tcp server using the default timeout, with Nagle's
/// algorithm disabled.
pub async fn connect(addr: &str) -> Result<RtlTcpTransport> {
    connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT, true).await
}

/// Connect to an rtl_tcp server with a specified timeout.
///
/// # Arguments
///
/// * `addr` - A `host:port` string (e.g., `"192.168.1.50:1234"`)
/// * `timeout` - Maximum time to wait for the connection to be established
/// * `nodelay` - Disable Nagle's algorithm so 5-byte commands go out at once
pub async fn connect_with_timeout(
    addr: &str,
    timeout: Duration,
    nodelay: bool,
) -> Result<RtlTcpTransport> {
    let stream = open_stream(addr, timeout).await?;

    if nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "Failed to set TCP_NODELAY (continuing anyway)"
            );
        }
    }

    tracing::info!(addr = %addr, "TCP connection established");

    Ok(from_stream(stream, addr))
}

/// Open the raw TCP stream, mapping failures to [`Error::Timeout`] or
/// [`Error::ConnectionFailed`].
pub async fn open_stream(addr: &str, timeout: Duration) -> Result<TcpStream> {
    tracing::debug!(
        addr = %addr,
        timeout_ms = timeout.as_millis(),
        "Connecting to rtl_tcp server"
    );

    tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            tracing::error!(addr = %addr, "TCP connection timed out");
            Error::Timeout
        })?
        .map_err(|e| {
            tracing::error!(addr = %addr, error = %e, "TCP connection failed");
            Error::ConnectionFailed {
                addr: addr.to_string(),
                source: e,
            }
        })
}

/// Wrap an existing `TcpStream` as an [`RtlTcpTransport`].
///
/// Useful when the connection was established externally (e.g., accepted
/// from a listener in tests). `label` is used for logging.
pub fn from_stream(stream: TcpStream, label: &str) -> RtlTcpTransport {
    let (read, write) = stream.into_split();
    RtlTcpTransport::new(Box::new(read), Box::new(write), label)
}
