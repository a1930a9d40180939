//! Error types for rtltcp.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Connection setup, wire framing, and
//! client-side argument checks all report through this one enum.
//!
//! Nothing in the library retries. Any framing failure (short read, short
//! write, transport error, read deadline) leaves the byte stream at an
//! unknown position, and the connection must be discarded by the caller.

use std::fmt;

/// The error type for all rtltcp operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport connection could not be opened.
    #[error("connection to {addr} failed: {source}")]
    ConnectionFailed {
        /// The address that was dialed.
        addr: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Timed out connecting, waiting for the handshake, or waiting for
    /// sample data.
    #[error("timeout waiting for server")]
    Timeout,

    /// The stream ended before a fixed-size frame was complete.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead {
        /// Size of the frame that was requested.
        expected: usize,
        /// Bytes that arrived before the stream ended.
        received: usize,
    },

    /// The transport stopped accepting bytes before a frame was fully written.
    #[error("short write: expected {expected} bytes, wrote {written}")]
    ShortWrite {
        /// Size of the frame being written.
        expected: usize,
        /// Bytes accepted before the transport stopped.
        written: usize,
    },

    /// The handshake magic did not match `RTL0`.
    ///
    /// The server is most likely speaking a different protocol.
    #[error("invalid magic: expected {} received {}", Magic(expected), Magic(received))]
    ProtocolMismatch {
        /// The magic this client understands.
        expected: [u8; 4],
        /// The magic the server actually sent.
        received: [u8; 4],
    },

    /// An argument failed a client-side bounds check and was not sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying I/O error from the transport.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A previous read or write on this connection failed, so the framing
    /// position is unknown and the connection can no longer be used.
    #[error("connection is no longer usable after an earlier failure")]
    ConnectionBroken,

    /// The connection was closed by this client.
    #[error("not connected")]
    NotConnected,
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Renders a 4-byte magic as a quoted string, escaping non-printable bytes.
///
/// `b"RTL0"` renders as `"RTL0"`, `[0x00, 0x01, b'A', 0xFF]` as
/// `"\x00\x01A\xff"`.
pub struct Magic<'a>(pub &'a [u8; 4]);

impl fmt::Display for Magic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for b in self.0.iter() {
            write!(f, "{}", std::ascii::escape_default(*b))?;
        }
        f.write_str("\"")
    }
}
