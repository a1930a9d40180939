//! Typed control operations for an rtl_tcp session.
//!
//! [`SdrControl`] exposes one method per protocol opcode. Each method encodes
//! exactly one 5-byte [`Command`] and writes it; nothing is read back, since
//! the protocol has no acknowledgements. The methods return `&Self` so that
//! settings can be chained:
//!
//! ```no_run
//! use rtltcp::{GainMode, RtlTcpClient, SdrControl};
//!
//! # async fn example() -> rtltcp::Result<()> {
//! let client = RtlTcpClient::connect("127.0.0.1:1234").await?;
//! client
//!     .set_sample_rate(2_048_000).await?
//!     .set_center_freq(100_000_000).await?
//!     .set_gain_mode(GainMode::Manual).await?
//!     .set_gain(197).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Commander`] is the concrete writer. Clones share one write half behind
//! an async mutex, so commands issued from different tasks never interleave
//! on the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::Instrument;

use rtltcp_core::error::{Error, Result};
use rtltcp_core::transport::BoxedWriter;
use rtltcp_core::types::{DirectSampling, GainMode};
use rtltcp_transport::io::write_frame;

use crate::command::{Command, Opcode};
use crate::handshake::DongleInfo;

fn flag(enabled: bool) -> u32 {
    u32::from(enabled)
}

/// The rtl_tcp control surface.
///
/// Implementors supply [`execute`](SdrControl::execute) and
/// [`dongle_info`](SdrControl::dongle_info); every typed operation is a
/// provided method built on those two.
#[async_trait]
pub trait SdrControl: Send + Sync {
    /// Encode and send one command frame.
    ///
    /// A failed write leaves the wire position unknown. Implementations must
    /// refuse further commands afterwards rather than retry in place.
    async fn execute(&self, command: Command) -> Result<()>;

    /// Device description from this connection's handshake.
    fn dongle_info(&self) -> &DongleInfo;

    /// Set the center frequency in Hz.
    async fn set_center_freq(&self, freq_hz: u32) -> Result<&Self> {
        self.execute(Command::new(Opcode::CenterFreq, freq_hz)).await?;
        Ok(self)
    }

    /// Set the sample rate in Hz.
    async fn set_sample_rate(&self, rate_hz: u32) -> Result<&Self> {
        self.execute(Command::new(Opcode::SampleRate, rate_hz)).await?;
        Ok(self)
    }

    /// Select automatic or manual tuner gain.
    async fn set_gain_mode(&self, mode: GainMode) -> Result<&Self> {
        self.execute(Command::new(Opcode::GainMode, mode.wire_value()))
            .await?;
        Ok(self)
    }

    /// Set the tuner gain in tenths of a dB (197 => 19.7 dB).
    ///
    /// Only takes effect in [`GainMode::Manual`]. The server rounds to the
    /// nearest step the tuner supports.
    async fn set_gain(&self, tenths_db: i32) -> Result<&Self> {
        self.execute(Command::new(Opcode::TunerGain, tenths_db as u32))
            .await?;
        Ok(self)
    }

    /// Set the frequency correction in parts per million.
    async fn set_freq_correction(&self, ppm: i32) -> Result<&Self> {
        self.execute(Command::new(Opcode::FreqCorrection, ppm as u32))
            .await?;
        Ok(self)
    }

    /// Set the gain of one tuner IF stage, in tenths of a dB.
    ///
    /// Packed on the wire as `(stage << 16) | gain`.
    async fn set_if_gain(&self, stage: u16, tenths_db: i16) -> Result<&Self> {
        let param = (u32::from(stage) << 16) | u32::from(tenths_db as u16);
        self.execute(Command::new(Opcode::TunerIfGain, param)).await?;
        Ok(self)
    }

    /// Enable the RTL2832U test mode, which streams a counter instead of
    /// samples.
    async fn set_test_mode(&self, enabled: bool) -> Result<&Self> {
        self.execute(Command::new(Opcode::TestMode, flag(enabled)))
            .await?;
        Ok(self)
    }

    /// Enable the RTL2832U digital AGC.
    async fn set_agc_mode(&self, enabled: bool) -> Result<&Self> {
        self.execute(Command::new(Opcode::AgcMode, flag(enabled)))
            .await?;
        Ok(self)
    }

    /// Select direct sampling.
    ///
    /// For on/off use, `DirectSampling::from(bool)` maps `true` to the I
    /// branch (wire value 1).
    async fn set_direct_sampling(&self, mode: DirectSampling) -> Result<&Self> {
        self.execute(Command::new(Opcode::DirectSampling, mode.wire_value()))
            .await?;
        Ok(self)
    }

    /// Enable offset tuning (zero-IF tuners only).
    async fn set_offset_tuning(&self, enabled: bool) -> Result<&Self> {
        self.execute(Command::new(Opcode::OffsetTuning, flag(enabled)))
            .await?;
        Ok(self)
    }

    /// Set the RTL2832U reference crystal frequency in Hz.
    async fn set_rtl_xtal_freq(&self, freq_hz: u32) -> Result<&Self> {
        self.execute(Command::new(Opcode::RtlXtalFreq, freq_hz))
            .await?;
        Ok(self)
    }

    /// Set the tuner reference crystal frequency in Hz.
    async fn set_tuner_xtal_freq(&self, freq_hz: u32) -> Result<&Self> {
        self.execute(Command::new(Opcode::TunerXtalFreq, freq_hz))
            .await?;
        Ok(self)
    }

    /// Select a tuner gain by its index in the dongle's gain table.
    ///
    /// Fails with [`Error::InvalidArgument`], without writing anything, if
    /// `index` is greater than the handshake's gain count.
    async fn set_gain_by_index(&self, index: u32) -> Result<&Self> {
        let gain_count = self.dongle_info().gain_count;
        if index > gain_count {
            return Err(Error::InvalidArgument(format!(
                "gain index {index} exceeds gain count {gain_count}"
            )));
        }
        self.execute(Command::new(Opcode::GainByIndex, index)).await?;
        Ok(self)
    }
}

/// Marks the shared flag broken when dropped, unless disarmed first.
struct PoisonOnDrop<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl<'a> PoisonOnDrop<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        PoisonOnDrop { flag, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PoisonOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::Release);
        }
    }
}

/// Serialized command writer for one connection.
///
/// Cheap to clone; all clones share the same write half and failure state.
///
/// A command future dropped before its frame is fully written (for example
/// by `tokio::time::timeout` or `select!`) breaks the connection, just like
/// a failed write.
#[derive(Clone)]
pub struct Commander {
    /// Write half of the transport, `None` after `shutdown()`.
    writer: Arc<Mutex<Option<BoxedWriter>>>,
    /// Set once any write fails or is cancelled; the wire position is
    /// unknown after that.
    broken: Arc<AtomicBool>,
    info: DongleInfo,
    span: tracing::Span,
}

impl Commander {
    pub(crate) fn new(writer: BoxedWriter, info: DongleInfo, span: tracing::Span) -> Self {
        Commander {
            writer: Arc::new(Mutex::new(Some(writer))),
            broken: Arc::new(AtomicBool::new(false)),
            info,
            span,
        }
    }

    /// Returns `true` once a write has failed on this connection.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    pub(crate) fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Close the client-to-server direction.
    ///
    /// Later commands fail with [`Error::NotConnected`]. Closing twice is a
    /// no-op.
    pub async fn shutdown(&self) -> Result<()> {
        async {
            let Some(mut writer) = self.writer.lock().await.take() else {
                return Ok(());
            };
            if let Err(e) = writer.shutdown().await {
                tracing::warn!(
                    error = %e,
                    "Failed to shut down command stream (continuing anyway)"
                );
            }
            tracing::debug!("Command stream closed");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }
}

impl std::fmt::Debug for Commander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commander")
            .field("info", &self.info)
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SdrControl for Commander {
    async fn execute(&self, command: Command) -> Result<()> {
        async {
            if self.is_broken() {
                return Err(Error::ConnectionBroken);
            }

            let mut guard = self.writer.lock().await;
            // Another clone may have failed while we waited for the lock.
            if self.is_broken() {
                return Err(Error::ConnectionBroken);
            }
            let Some(writer) = guard.as_mut() else {
                return Err(Error::NotConnected);
            };

            tracing::debug!(command = %command, "Sending command");
            // Dropping this future mid-write leaves a partial frame on the
            // wire, so the connection counts as broken until the write ends.
            let mut poison = PoisonOnDrop::new(&self.broken);
            if let Err(e) = write_frame(writer, &command.encode()).await {
                tracing::error!(command = %command, error = %e, "Command write failed");
                return Err(e);
            }
            poison.disarm();
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    fn dongle_info(&self) -> &DongleInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rtltcp_core::TunerKind;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWrite};

    /// Writer that appends to a shared buffer so tests can inspect exactly
    /// what reached the "wire".
    #[derive(Clone, Default)]
    struct RecordingWriter(Arc<std::sync::Mutex<Vec<u8>>>);

    impl RecordingWriter {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl AsyncWrite for RecordingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn info(gain_count: u32) -> DongleInfo {
        DongleInfo {
            magic: *b"RTL0",
            tuner: TunerKind::R820t,
            gain_count,
        }
    }

    fn recording_commander(gain_count: u32) -> (Commander, RecordingWriter) {
        let recorder = RecordingWriter::default();
        let commander = Commander::new(
            Box::new(recorder.clone()),
            info(gain_count),
            tracing::Span::none(),
        );
        (commander, recorder)
    }

    #[tokio::test]
    async fn center_freq_bytes() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_center_freq(100_000_000).await.unwrap();
        assert_eq!(rec.bytes(), vec![0x01, 0x05, 0xF5, 0xE1, 0x00]);
    }

    #[tokio::test]
    async fn every_operation_writes_one_frame() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_center_freq(1)
            .await
            .unwrap()
            .set_sample_rate(2)
            .await
            .unwrap()
            .set_gain_mode(GainMode::Manual)
            .await
            .unwrap()
            .set_gain(4)
            .await
            .unwrap()
            .set_freq_correction(5)
            .await
            .unwrap()
            .set_if_gain(0, 6)
            .await
            .unwrap()
            .set_test_mode(true)
            .await
            .unwrap()
            .set_agc_mode(true)
            .await
            .unwrap()
            .set_direct_sampling(DirectSampling::from(true))
            .await
            .unwrap()
            .set_offset_tuning(true)
            .await
            .unwrap()
            .set_rtl_xtal_freq(11)
            .await
            .unwrap()
            .set_tuner_xtal_freq(12)
            .await
            .unwrap()
            .set_gain_by_index(13)
            .await
            .unwrap();

        let bytes = rec.bytes();
        assert_eq!(bytes.len(), 13 * 5);
        for (i, frame) in bytes.chunks_exact(5).enumerate() {
            let cmd = Command::decode(frame.try_into().unwrap());
            assert_eq!(cmd.opcode as usize, i + 1);
        }
    }

    #[tokio::test]
    async fn gain_mode_polarity() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_gain_mode(GainMode::Manual).await.unwrap();
        cmd.set_gain_mode(GainMode::Automatic).await.unwrap();
        assert_eq!(
            rec.bytes(),
            vec![0x03, 0, 0, 0, 1, 0x03, 0, 0, 0, 0],
            "manual must be 1 and automatic 0, both on opcode 3"
        );
    }

    #[tokio::test]
    async fn boolean_flags_map_to_one_and_zero() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_agc_mode(true).await.unwrap();
        cmd.set_agc_mode(false).await.unwrap();
        cmd.set_offset_tuning(true).await.unwrap();
        cmd.set_test_mode(false).await.unwrap();
        let params: Vec<(u8, u32)> = rec
            .bytes()
            .chunks_exact(5)
            .map(|f| {
                let c = Command::decode(f.try_into().unwrap());
                (c.opcode, c.param)
            })
            .collect();
        assert_eq!(params, vec![(8, 1), (8, 0), (10, 1), (7, 0)]);
    }

    #[tokio::test]
    async fn direct_sampling_q_branch() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_direct_sampling(DirectSampling::QBranch)
            .await
            .unwrap();
        assert_eq!(rec.bytes(), vec![0x09, 0, 0, 0, 2]);
    }

    #[tokio::test]
    async fn if_gain_packing() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_if_gain(3, 90).await.unwrap();
        cmd.set_if_gain(1, -30).await.unwrap();
        assert_eq!(
            rec.bytes(),
            vec![0x06, 0x00, 0x03, 0x00, 0x5A, 0x06, 0x00, 0x01, 0xFF, 0xE2]
        );
    }

    #[tokio::test]
    async fn negative_freq_correction_is_twos_complement() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_freq_correction(-1).await.unwrap();
        assert_eq!(rec.bytes(), vec![0x05, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[tokio::test]
    async fn gain_index_equal_to_count_is_sent() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_gain_by_index(29).await.unwrap();
        cmd.set_gain_by_index(0).await.unwrap();
        assert_eq!(rec.bytes(), vec![0x0D, 0, 0, 0, 29, 0x0D, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn gain_index_out_of_range_is_rejected() {
        let (cmd, rec) = recording_commander(29);
        let err = cmd.set_gain_by_index(30).await.unwrap_err();
        match err {
            Error::InvalidArgument(msg) => {
                assert_eq!(msg, "gain index 30 exceeds gain count 29");
            }
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
        assert!(rec.bytes().is_empty());
        assert!(!cmd.is_broken());
    }

    #[tokio::test]
    async fn failed_write_poisons_all_clones() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let cmd = Commander::new(Box::new(client), info(29), tracing::Span::none());
        let other = cmd.clone();

        let err = cmd.set_center_freq(100).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got {err:?}");
        assert!(cmd.is_broken());

        let err = other.set_sample_rate(1).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionBroken), "got {err:?}");
    }

    #[tokio::test]
    async fn cancelled_write_breaks_connection() {
        // Room for two bytes only, so the 5-byte frame stalls part way.
        let (client, mut server) = tokio::io::duplex(2);
        let cmd = Commander::new(Box::new(client), info(29), tracing::Span::none());

        let stalled =
            tokio::time::timeout(Duration::from_millis(20), cmd.set_center_freq(100_000_000))
                .await;
        assert!(stalled.is_err());
        assert!(cmd.is_broken());

        let err = cmd.set_sample_rate(2_048_000).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionBroken), "got {err:?}");

        drop(cmd);
        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, vec![0x01, 0x05]);
    }

    #[tokio::test]
    async fn completed_write_under_timeout_stays_usable() {
        let (cmd, rec) = recording_commander(29);
        tokio::time::timeout(Duration::from_secs(1), cmd.set_offset_tuning(true))
            .await
            .unwrap()
            .unwrap();
        assert!(!cmd.is_broken());
        cmd.set_offset_tuning(false).await.unwrap();
        assert_eq!(rec.bytes(), vec![0x0A, 0, 0, 0, 1, 0x0A, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn direct_sampling_accepts_bool_conversion() {
        let (cmd, rec) = recording_commander(29);
        cmd.set_direct_sampling(true.into())
            .await
            .unwrap()
            .set_direct_sampling(DirectSampling::from(false))
            .await
            .unwrap();
        assert_eq!(rec.bytes(), vec![0x09, 0, 0, 0, 1, 0x09, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn commands_after_shutdown_fail() {
        let (client, mut server) = tokio::io::duplex(64);
        let cmd = Commander::new(Box::new(client), info(29), tracing::Span::none());
        cmd.set_center_freq(1).await.unwrap();
        cmd.shutdown().await.unwrap();
        cmd.shutdown().await.unwrap();

        let err = cmd.set_center_freq(2).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected), "got {err:?}");

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, vec![0x01, 0, 0, 0, 1]);
    }

    #[tokio::test]
    async fn concurrent_commands_do_not_interleave() {
        let (cmd, rec) = recording_commander(29);
        let mut tasks = Vec::new();
        for i in 0..16u32 {
            let c = cmd.clone();
            tasks.push(tokio::spawn(async move {
                c.set_center_freq(i * 1_000_000).await.map(|_| ())
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let bytes = rec.bytes();
        assert_eq!(bytes.len(), 16 * 5);
        let mut freqs: Vec<u32> = bytes
            .chunks_exact(5)
            .map(|f| {
                let c = Command::decode(f.try_into().unwrap());
                assert_eq!(c.opcode, 0x01);
                c.param
            })
            .collect();
        freqs.sort_unstable();
        let expected: Vec<u32> = (0..16).map(|i| i * 1_000_000).collect();
        assert_eq!(freqs, expected);
    }

    proptest! {
        #[test]
        fn out_of_range_gain_index_never_writes(gain_count in 0u32..u32::MAX, offset in 1u32..1000) {
            let index = gain_count.saturating_add(offset);
            prop_assume!(index > gain_count);

            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (cmd, rec) = recording_commander(gain_count);
            let result = rt.block_on(cmd.set_gain_by_index(index)).map(|_| ());
            prop_assert!(matches!(result, Err(Error::InvalidArgument(_))));
            prop_assert!(rec.bytes().is_empty());
        }

        #[test]
        fn in_range_gain_index_is_sent(gain_count in 0u32..1000, pick in any::<u32>()) {
            let index = pick % (gain_count + 1);
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (cmd, rec) = recording_commander(gain_count);
            rt.block_on(cmd.set_gain_by_index(index)).map(|_| ()).unwrap();
            let mut expected = vec![0x0D];
            expected.extend_from_slice(&index.to_be_bytes());
            prop_assert_eq!(rec.bytes(), expected);
        }
    }
}
