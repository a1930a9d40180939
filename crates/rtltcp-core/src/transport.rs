//! Byte-stream transport seam for rtl_tcp sessions.
//!
//! rtl_tcp runs over one ordered, bidirectional byte stream. Commands travel
//! client to server and samples travel server to client, and the two
//! directions are independent. [`RtlTcpTransport`] therefore carries the
//! stream as two owned halves so that the command writer and the sample
//! reader can live on different tasks.
//!
//! Any `AsyncRead`/`AsyncWrite` pair works: a split `TcpStream` in
//! production, or the halves of [`tokio::io::duplex`] in tests.

use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed read half of a transport.
pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send + Sync + 'static>;

/// Boxed write half of a transport.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>;

/// A connected byte stream, split into its two directions.
pub struct RtlTcpTransport {
    /// Server-to-client direction (handshake, then samples).
    pub read: BoxedReader,
    /// Client-to-server direction (commands).
    pub write: BoxedWriter,
    /// Label for logging, typically the peer address.
    pub peer: String,
}

impl RtlTcpTransport {
    /// Build a transport from already-split halves.
    pub fn new(read: BoxedReader, write: BoxedWriter, peer: impl Into<String>) -> Self {
        RtlTcpTransport {
            read,
            write,
            peer: peer.into(),
        }
    }

    /// Split any bidirectional stream into a transport.
    ///
    /// ```
    /// use rtltcp_core::transport::RtlTcpTransport;
    ///
    /// let (client, _server) = tokio::io::duplex(64);
    /// let transport = RtlTcpTransport::from_stream(client, "duplex");
    /// assert_eq!(transport.peer, "duplex");
    /// ```
    pub fn from_stream<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        RtlTcpTransport::new(Box::new(read), Box::new(write), peer)
    }
}

impl std::fmt::Debug for RtlTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtlTcpTransport")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
