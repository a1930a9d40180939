//! RtlTcpClient -- one live session with an rtl_tcp server.
//!
//! A session starts with the server's 12-byte greeting and then splits into
//! two independent directions: fire-and-forget commands going out and an
//! endless I/Q sample stream coming in. The client owns one [`Commander`]
//! for the first and one [`SampleReader`] for the second.
//!
//! # Example
//!
//! ```no_run
//! use rtltcp::{GainMode, RtlTcpClient, SdrControl};
//! use num_complex::Complex64;
//!
//! # async fn example() -> rtltcp::Result<()> {
//! let mut client = RtlTcpClient::connect("127.0.0.1:1234").await?;
//! println!("tuner {}", client.info().tuner);
//!
//! client
//!     .set_sample_rate(2_048_000)
//!     .await?
//!     .set_center_freq(100_000_000)
//!     .await?
//!     .set_gain_mode(GainMode::Automatic)
//!     .await?;
//!
//! let mut block = vec![Complex64::new(0.0, 0.0); 16_384];
//! client.read_complex(&mut block).await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use num_complex::Complex64;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use rtltcp_core::error::{Error, Result};
use rtltcp_core::transport::{BoxedWriter, RtlTcpTransport};
use rtltcp_core::types::IqSample;
use rtltcp_core::{DONGLE_MAGIC, Magic};

use crate::builder::RtlTcpBuilder;
use crate::command::Command;
use crate::control::{Commander, SdrControl};
use crate::handshake::DongleInfo;
use crate::samples::SampleReader;

/// Default time allowed for the greeting to arrive after connecting.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Session settings applied after the transport is open.
#[derive(Debug, Clone)]
pub(crate) struct ClientOptions {
    pub handshake_timeout: Duration,
    pub read_timeout: Option<Duration>,
    pub strict_handshake: bool,
    pub span: tracing::Span,
}

/// A connected rtl_tcp session.
///
/// Implements [`SdrControl`] for the 13 tuning commands and exposes the
/// sample stream through [`read_raw`](Self::read_raw),
/// [`read_bytes`](Self::read_bytes) and [`read_complex`](Self::read_complex).
/// Use [`into_split`](Self::into_split) to drive the two directions from
/// separate tasks.
#[derive(Debug)]
pub struct RtlTcpClient {
    info: DongleInfo,
    commander: Commander,
    samples: SampleReader,
    peer: String,
}

impl RtlTcpClient {
    /// Connect with default settings.
    ///
    /// Shorthand for `RtlTcpBuilder::new(addr).build()`.
    pub async fn connect(addr: &str) -> Result<Self> {
        RtlTcpBuilder::new(addr).build().await
    }

    /// The dongle description from the server greeting.
    pub fn info(&self) -> &DongleInfo {
        &self.info
    }

    /// The peer label of the underlying transport.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Report an invalid greeting magic as [`Error::ProtocolMismatch`].
    ///
    /// Only relevant for clients built without
    /// [`strict_handshake`](RtlTcpBuilder::strict_handshake), which keep the
    /// connection open regardless of the magic.
    pub fn check_handshake(&self) -> Result<()> {
        self.info.check()
    }

    /// A handle for sending commands. Clones share the connection.
    pub fn commander(&self) -> &Commander {
        &self.commander
    }

    /// Total I/Q pairs read from the stream so far.
    pub fn samples_read(&self) -> u64 {
        self.samples.samples_read()
    }

    /// Read exactly `out.len()` raw I/Q pairs.
    pub async fn read_raw(&mut self, out: &mut [IqSample]) -> Result<()> {
        self.samples.read_raw(out).await
    }

    /// Read interleaved `I Q I Q ...` bytes; `buf.len()` must be even.
    pub async fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.samples.read_bytes(buf).await
    }

    /// Read exactly `out.len()` pairs normalized to `[-1.0, 1.0]`.
    pub async fn read_complex(&mut self, out: &mut [Complex64]) -> Result<()> {
        self.samples.read_complex(out).await
    }

    /// Split into the command and sample directions.
    ///
    /// The connection stays open until both halves are dropped or the
    /// commander is shut down.
    pub fn into_split(self) -> (Commander, SampleReader) {
        (self.commander, self.samples)
    }

    /// Gracefully close the session.
    ///
    /// Shuts down the command direction so the server sees end-of-stream,
    /// then drops the sample stream.
    pub async fn close(self) -> Result<()> {
        let span = self.commander.span().clone();
        let peer = self.peer;
        self.commander.shutdown().await?;
        drop(self.samples);
        span.in_scope(|| tracing::info!(peer = %peer, "Connection closed"));
        Ok(())
    }
}

#[async_trait]
impl SdrControl for RtlTcpClient {
    async fn execute(&self, command: Command) -> Result<()> {
        self.commander.execute(command).await
    }

    fn dongle_info(&self) -> &DongleInfo {
        &self.info
    }
}

/// Read and validate the greeting, then assemble the client.
///
/// On any failure the write half is shut down and both halves are dropped
/// before the error is returned, so the peer sees the connection close.
pub(crate) async fn establish(
    transport: RtlTcpTransport,
    options: ClientOptions,
) -> Result<RtlTcpClient> {
    let RtlTcpTransport {
        mut read,
        write,
        peer,
    } = transport;
    let span = options.span.clone();

    async move {
        tracing::debug!(
            peer = %peer,
            timeout_ms = options.handshake_timeout.as_millis(),
            "Waiting for handshake"
        );

        let handshake =
            tokio::time::timeout(options.handshake_timeout, DongleInfo::read_from(&mut read)).await;
        let info = match handshake {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                tracing::error!(peer = %peer, error = %e, "Handshake failed");
                abandon(write).await;
                return Err(e);
            }
            Err(_) => {
                tracing::error!(peer = %peer, "Timed out waiting for handshake");
                abandon(write).await;
                return Err(Error::Timeout);
            }
        };

        if !info.is_valid() {
            if options.strict_handshake {
                tracing::error!(
                    peer = %peer,
                    magic = %Magic(&info.magic),
                    "Invalid handshake magic; closing connection"
                );
                abandon(write).await;
                return Err(Error::ProtocolMismatch {
                    expected: DONGLE_MAGIC,
                    received: info.magic,
                });
            }
            tracing::warn!(
                peer = %peer,
                magic = %Magic(&info.magic),
                "Invalid handshake magic; server may not be rtl_tcp"
            );
        }

        tracing::info!(
            peer = %peer,
            tuner = %info.tuner,
            gain_count = info.gain_count,
            "Connected to rtl_tcp server"
        );

        Ok(RtlTcpClient {
            info,
            commander: Commander::new(write, info, options.span.clone()),
            samples: SampleReader::new(read, options.read_timeout, options.span.clone()),
            peer,
        })
    }
    .instrument(span)
    .await
}

async fn abandon(mut write: BoxedWriter) {
    if let Err(e) = write.shutdown().await {
        tracing::debug!(error = %e, "Shutdown after failed handshake did not complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtltcp_core::types::{DirectSampling, GainMode, TunerKind};
    use rtltcp_test_harness::{MockRtlTcpServer, greeting_bytes};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const R820T_GREETING: [u8; 12] = [
        0x52, 0x54, 0x4C, 0x30, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x20,
    ];

    /// Wait for the mock server, failing the test instead of hanging.
    async fn finish(server: MockRtlTcpServer) -> rtltcp_test_harness::MockSession {
        tokio::time::timeout(Duration::from_secs(5), server.wait())
            .await
            .expect("mock server did not see the client disconnect")
            .unwrap()
    }

    #[test]
    fn client_halves_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RtlTcpClient>();
        assert_send_sync::<Commander>();
        assert_send_sync::<SampleReader>();
    }

    #[tokio::test]
    async fn client_usable_as_shared_control() {
        let (client_end, mut server_end) = tokio::io::duplex(64);
        server_end.write_all(&R820T_GREETING).await.unwrap();
        let client = RtlTcpBuilder::new("duplex")
            .build_with_transport(RtlTcpTransport::from_stream(client_end, "duplex"))
            .await
            .unwrap();

        let shared = std::sync::Arc::new(client);
        let task = {
            let shared = shared.clone();
            tokio::spawn(async move { shared.set_test_mode(true).await.map(|_| ()) })
        };
        task.await.unwrap().unwrap();
        drop(shared);

        let mut received = Vec::new();
        server_end.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, vec![0x07, 0, 0, 0, 1]);
    }

    #[tokio::test]
    async fn handshake_and_center_freq() {
        let mut server = MockRtlTcpServer::new().await.unwrap();
        server.greeting(&R820T_GREETING);
        server.start();

        let client = RtlTcpClient::connect(server.addr()).await.unwrap();
        assert_eq!(client.info().tuner, TunerKind::R820t);
        assert_eq!(client.info().gain_count, 32);
        assert!(client.check_handshake().is_ok());
        assert_eq!(client.peer(), server.addr());

        client.set_center_freq(100_000_000).await.unwrap();
        client.close().await.unwrap();

        let session = finish(server).await;
        assert_eq!(session.received, vec![0x01, 0x05, 0xF5, 0xE1, 0x00]);
    }

    #[tokio::test]
    async fn tuning_sequence_over_tcp() {
        let mut server = MockRtlTcpServer::new().await.unwrap();
        server.dongle(1, 14);
        server.start();

        let client = RtlTcpClient::connect(server.addr()).await.unwrap();
        client
            .set_sample_rate(2_048_000)
            .await
            .unwrap()
            .set_gain_mode(GainMode::Manual)
            .await
            .unwrap()
            .set_gain_by_index(14)
            .await
            .unwrap()
            .set_direct_sampling(DirectSampling::Disabled)
            .await
            .unwrap();
        assert!(matches!(
            client.set_gain_by_index(15).await,
            Err(Error::InvalidArgument(_))
        ));
        client.close().await.unwrap();

        let session = finish(server).await;
        assert_eq!(
            session.commands(),
            vec![
                [0x02, 0x00, 0x1F, 0x40, 0x00],
                [0x03, 0x00, 0x00, 0x00, 0x01],
                [0x0D, 0x00, 0x00, 0x00, 0x0E],
                [0x09, 0x00, 0x00, 0x00, 0x00],
            ]
        );
        assert!(session.trailing().is_empty());
    }

    #[tokio::test]
    async fn short_greeting_fails_and_closes_socket() {
        let mut server = MockRtlTcpServer::new().await.unwrap();
        server.greeting(&R820T_GREETING[..7]).close_after_script(true);
        server.start();

        let err = RtlTcpClient::connect(server.addr()).await.unwrap_err();
        assert!(
            matches!(
                err,
                Error::ShortRead {
                    expected: 12,
                    received: 7
                }
            ),
            "got {err:?}"
        );

        // The server only returns once the client side has closed.
        let session = finish(server).await;
        assert!(session.received.is_empty());
    }

    #[tokio::test]
    async fn invalid_magic_is_reported_but_not_fatal() {
        let mut server = MockRtlTcpServer::new().await.unwrap();
        server.greeting(&greeting_bytes(*b"HTTP", 5, 29));
        server.start();

        let client = RtlTcpClient::connect(server.addr()).await.unwrap();
        assert!(!client.info().is_valid());
        assert!(matches!(
            client.check_handshake(),
            Err(Error::ProtocolMismatch { .. })
        ));
        client.set_test_mode(true).await.unwrap();
        client.close().await.unwrap();

        let session = finish(server).await;
        assert_eq!(session.commands(), vec![[0x07, 0, 0, 0, 1]]);
    }

    #[tokio::test]
    async fn strict_handshake_rejects_invalid_magic() {
        let mut server = MockRtlTcpServer::new().await.unwrap();
        server.greeting(&greeting_bytes(*b"RTL1", 5, 29));
        server.start();

        let err = RtlTcpBuilder::new(server.addr())
            .strict_handshake(true)
            .build()
            .await
            .unwrap_err();
        match err {
            Error::ProtocolMismatch { expected, received } => {
                assert_eq!(&expected, b"RTL0");
                assert_eq!(&received, b"RTL1");
            }
            other => panic!("expected ProtocolMismatch, got {other:?}"),
        }

        let session = finish(server).await;
        assert!(session.received.is_empty());
    }

    #[tokio::test]
    async fn samples_follow_greeting() {
        let mut server = MockRtlTcpServer::new().await.unwrap();
        server
            .samples(&[0, 255, 255, 0, 10, 20])
            .close_after_script(true);
        server.start();

        let mut client = RtlTcpClient::connect(server.addr()).await.unwrap();

        let mut complex = [Complex64::new(0.0, 0.0); 2];
        client.read_complex(&mut complex).await.unwrap();
        assert_eq!(complex[0], Complex64::new(-1.0, 1.0));
        assert_eq!(complex[1], Complex64::new(1.0, -1.0));

        let mut raw = [IqSample::default(); 1];
        client.read_raw(&mut raw).await.unwrap();
        assert_eq!(raw[0], IqSample::new(10, 20));
        assert_eq!(client.samples_read(), 3);

        // The server closed after the script, so one more pair is short.
        let err = client.read_raw(&mut raw).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                expected: 2,
                received: 0
            }
        ));

        client.close().await.unwrap();
        finish(server).await;
    }

    #[tokio::test]
    async fn split_halves_run_on_separate_tasks() {
        let samples: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let mut server = MockRtlTcpServer::new().await.unwrap();
        server.samples(&samples);
        server.start();

        let client = RtlTcpClient::connect(server.addr()).await.unwrap();
        let (commander, mut reader) = client.into_split();

        let read_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            reader.read_bytes(&mut buf).await.unwrap();
            (buf, reader.samples_read())
        });

        for k in 0..10u32 {
            commander.set_center_freq(100_000_000 + k).await.unwrap();
        }

        let (buf, pairs) = read_task.await.unwrap();
        assert_eq!(buf, samples);
        assert_eq!(pairs, 2048);

        commander.shutdown().await.unwrap();
        let session = finish(server).await;
        let freqs: Vec<u32> = session
            .commands()
            .iter()
            .map(|c| {
                assert_eq!(c[0], 0x01);
                u32::from_be_bytes([c[1], c[2], c[3], c[4]])
            })
            .collect();
        assert_eq!(freqs, (0..10).map(|k| 100_000_000 + k).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn handshake_timeout_over_duplex() {
        let (client_end, mut server_end) = tokio::io::duplex(64);
        let transport = RtlTcpTransport::from_stream(client_end, "duplex");

        let err = RtlTcpBuilder::new("duplex")
            .handshake_timeout(Duration::from_millis(30))
            .build_with_transport(transport)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout), "got {err:?}");

        // Both halves are gone, so the server end reads end-of-stream.
        let mut buf = [0u8; 1];
        let n = server_end.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn closing_twice_via_commander_is_harmless() {
        let (client_end, mut server_end) = tokio::io::duplex(64);
        server_end.write_all(&R820T_GREETING).await.unwrap();

        let client = RtlTcpBuilder::new("duplex")
            .build_with_transport(RtlTcpTransport::from_stream(client_end, "duplex"))
            .await
            .unwrap();
        let commander = client.commander().clone();
        client.close().await.unwrap();

        commander.shutdown().await.unwrap();
        assert!(matches!(
            commander.set_agc_mode(true).await,
            Err(Error::NotConnected)
        ));
    }
}
