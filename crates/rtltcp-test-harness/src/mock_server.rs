//! Mock rtl_tcp server for protocol-level testing.
//!
//! [`MockRtlTcpServer`] is a localhost TCP listener that plays the server
//! side of one rtl_tcp session from a script: it sends a greeting, then an
//! optional block of sample bytes, and records every byte the client writes
//! until the client disconnects.
//!
//! Because rtl_tcp commands are fire-and-forget, assertions are made after
//! the fact on the recorded bytes returned by [`wait`](MockRtlTcpServer::wait).
//!
//! # Example
//!
//! ```
//! use rtltcp_test_harness::MockRtlTcpServer;
//!
//! # async fn example() -> rtltcp_core::Result<()> {
//! let mut server = MockRtlTcpServer::new().await?;
//! server.dongle(5, 29);
//! server.samples(&[127, 128, 0, 255]);
//! server.start();
//!
//! let addr = server.addr().to_string();
//! // ... connect a client to `addr`, send commands, close ...
//! # Ok(())
//! # }
//! ```

use rtltcp_core::DONGLE_MAGIC;
use rtltcp_core::error::{Error, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Size of one encoded command frame.
const COMMAND_LEN: usize = 5;

/// Build a 12-byte rtl_tcp greeting.
///
/// ```
/// use rtltcp_test_harness::greeting_bytes;
///
/// assert_eq!(
///     greeting_bytes(*b"RTL0", 5, 32),
///     [0x52, 0x54, 0x4C, 0x30, 0, 0, 0, 5, 0, 0, 0, 0x20],
/// );
/// ```
pub fn greeting_bytes(magic: [u8; 4], tuner_id: u32, gain_count: u32) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[..4].copy_from_slice(&magic);
    out[4..8].copy_from_slice(&tuner_id.to_be_bytes());
    out[8..].copy_from_slice(&gain_count.to_be_bytes());
    out
}

/// What the mock server observed during one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockSession {
    /// Every byte the client wrote, in order.
    pub received: Vec<u8>,
}

impl MockSession {
    /// The received bytes cut into 5-byte command frames.
    ///
    /// Trailing bytes that do not make up a whole frame are ignored; check
    /// [`trailing`](MockSession::trailing) to detect a torn command.
    pub fn commands(&self) -> Vec<[u8; COMMAND_LEN]> {
        self.received
            .chunks_exact(COMMAND_LEN)
            .map(|c| [c[0], c[1], c[2], c[3], c[4]])
            .collect()
    }

    /// Bytes left over after the last whole command frame.
    pub fn trailing(&self) -> &[u8] {
        let whole = self.received.len() / COMMAND_LEN * COMMAND_LEN;
        &self.received[whole..]
    }
}

/// A scripted rtl_tcp server for testing clients over real TCP.
///
/// The server listens on a random port on localhost. Once
/// [`start`](MockRtlTcpServer::start) is called it accepts a single
/// connection and plays the script in a background task.
pub struct MockRtlTcpServer {
    /// The address the server is listening on (e.g., "127.0.0.1:54321").
    addr: String,
    /// The bound listener, moved into the server task on start.
    listener: Option<TcpListener>,
    /// Bytes sent immediately after accepting.
    greeting: Vec<u8>,
    /// Bytes sent after the greeting.
    samples: Vec<u8>,
    /// Shut down the server's write direction once the script is sent.
    close_after_script: bool,
    /// Handle to the server task once started.
    server_handle: Option<JoinHandle<std::result::Result<MockSession, String>>>,
}

impl MockRtlTcpServer {
    /// Create a new mock server listening on a random port.
    ///
    /// The default script is a valid greeting for an R820T dongle with 29
    /// gain steps, no samples, and the write direction left open.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|e| {
            Error::ConnectionFailed {
                addr: "127.0.0.1:0".into(),
                source: e,
            }
        })?;
        let addr = listener.local_addr()?.to_string();

        Ok(Self {
            addr,
            listener: Some(listener),
            greeting: greeting_bytes(DONGLE_MAGIC, 5, 29).to_vec(),
            samples: Vec::new(),
            close_after_script: false,
            server_handle: None,
        })
    }

    /// Replace the greeting with arbitrary bytes (which may be short or
    /// carry the wrong magic).
    pub fn greeting(&mut self, bytes: &[u8]) -> &mut Self {
        self.greeting = bytes.to_vec();
        self
    }

    /// Send a valid greeting for the given tuner id and gain count.
    pub fn dongle(&mut self, tuner_id: u32, gain_count: u32) -> &mut Self {
        self.greeting = greeting_bytes(DONGLE_MAGIC, tuner_id, gain_count).to_vec();
        self
    }

    /// Interleaved I/Q bytes to stream after the greeting.
    pub fn samples(&mut self, bytes: &[u8]) -> &mut Self {
        self.samples = bytes.to_vec();
        self
    }

    /// Close the server's sending direction once the greeting and samples
    /// are out, so the client sees end-of-stream on its next read.
    pub fn close_after_script(&mut self, close: bool) -> &mut Self {
        self.close_after_script = close;
        self
    }

    /// Get the address the server is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Start the server task.
    ///
    /// Calling `start` a second time has no effect.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let greeting = std::mem::take(&mut self.greeting);
        let samples = std::mem::take(&mut self.samples);
        let close_after_script = self.close_after_script;

        let handle = tokio::spawn(async move {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;
            tracing::debug!(peer = %peer, "Mock rtl_tcp server accepted client");

            let (mut reader, mut writer) = stream.into_split();

            // A client that gives up on a short greeting may close before we
            // finish writing, so write errors here are not test failures.
            let script = async {
                writer.write_all(&greeting).await?;
                writer.write_all(&samples).await?;
                writer.flush().await
            };
            if let Err(e) = script.await {
                tracing::debug!(error = %e, "Mock server could not send full script");
            }

            if close_after_script {
                let _ = writer.shutdown().await;
            }

            let mut session = MockSession::default();
            let mut buf = [0u8; 1024];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => session.received.extend_from_slice(&buf[..n]),
                    Err(e) => {
                        tracing::debug!(error = %e, "Mock server read ended with error");
                        break;
                    }
                }
            }

            tracing::debug!(bytes = session.received.len(), "Mock rtl_tcp session ended");
            drop(writer);
            Ok(session)
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the client to disconnect and return what it sent.
    ///
    /// Returns an empty session if the server was never started.
    pub async fn wait(self) -> std::result::Result<MockSession, String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?,
            None => Ok(MockSession::default()),
        }
    }
}
