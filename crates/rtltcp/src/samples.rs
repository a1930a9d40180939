//! I/Q sample stream decoder.
//!
//! After the handshake the server streams unframed pairs of offset-binary
//! bytes, `I0 Q0 I1 Q1 ...`, for as long as the connection is open. There
//! is no length prefix, so the reader decides how many pairs it wants and
//! the decoder reads exactly that many.
//!
//! Sample rates run to a few megasamples per second, so every read method
//! fills a caller-owned buffer. Reusing the same buffer across calls keeps
//! the steady state allocation-free.

use std::time::Duration;

use num_complex::Complex64;
use tracing::Instrument;

use rtltcp_core::error::{Error, Result};
use rtltcp_core::transport::BoxedReader;
use rtltcp_core::types::IqSample;
use rtltcp_transport::io::read_frame_timeout;

pub use rtltcp_core::types::normalize;

/// Bytes per I/Q pair on the wire.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Convert raw pairs into normalized complex samples.
///
/// `raw` and `out` must be the same length.
pub fn convert(raw: &[IqSample], out: &mut [Complex64]) -> Result<()> {
    if raw.len() != out.len() {
        return Err(Error::InvalidArgument(format!(
            "{} raw samples cannot fill {} complex samples",
            raw.len(),
            out.len()
        )));
    }
    for (dst, src) in out.iter_mut().zip(raw) {
        *dst = src.to_complex();
    }
    Ok(())
}

/// Convert interleaved `I Q I Q ...` bytes into normalized complex samples.
///
/// `bytes` must hold exactly two bytes per element of `out`.
pub fn convert_interleaved(bytes: &[u8], out: &mut [Complex64]) -> Result<()> {
    if bytes.len() != out.len() * BYTES_PER_SAMPLE {
        return Err(Error::InvalidArgument(format!(
            "{} bytes cannot fill {} complex samples",
            bytes.len(),
            out.len()
        )));
    }
    for (dst, pair) in out.iter_mut().zip(bytes.chunks_exact(BYTES_PER_SAMPLE)) {
        *dst = Complex64::new(normalize(pair[0]), normalize(pair[1]));
    }
    Ok(())
}

/// Exclusive reader for the server-to-client sample stream.
///
/// Not `Clone`: rtl_tcp has no framing beyond the pair size, so two readers
/// racing on one stream would tear pairs apart. Every read takes `&mut self`.
///
/// Any failed read (short read, transport error, deadline) leaves the stream
/// at an unknown offset, so the reader refuses further reads with
/// [`Error::ConnectionBroken`]. The same holds for a read future that is
/// dropped before it completes, e.g. under `tokio::time::timeout`.
pub struct SampleReader {
    stream: PairStream,
    /// Reusable byte buffer for the raw and complex read paths. Only grows.
    scratch: Vec<u8>,
    span: tracing::Span,
}

/// The read half plus the framing state that must move together with it.
struct PairStream {
    reader: BoxedReader,
    read_timeout: Option<Duration>,
    broken: bool,
    samples_read: u64,
}

impl PairStream {
    async fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.broken {
            return Err(Error::ConnectionBroken);
        }
        // Stays set if this future is dropped part way through the frame.
        self.broken = true;
        match read_frame_timeout(&mut self.reader, buf, self.read_timeout).await {
            Ok(()) => {
                self.broken = false;
                let pairs = (buf.len() / BYTES_PER_SAMPLE) as u64;
                self.samples_read += pairs;
                tracing::trace!(pairs, total = self.samples_read, "Samples read");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    requested = buf.len(),
                    "Sample stream read failed; stream is no longer usable"
                );
                Err(e)
            }
        }
    }
}

impl SampleReader {
    pub(crate) fn new(
        reader: BoxedReader,
        read_timeout: Option<Duration>,
        span: tracing::Span,
    ) -> Self {
        SampleReader {
            stream: PairStream {
                reader,
                read_timeout,
                broken: false,
                samples_read: 0,
            },
            scratch: Vec::new(),
            span,
        }
    }

    /// Per-read deadline, if one is set.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.stream.read_timeout
    }

    /// Set or clear the per-read deadline.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.stream.read_timeout = timeout;
    }

    /// Total I/Q pairs delivered so far.
    pub fn samples_read(&self) -> u64 {
        self.stream.samples_read
    }

    /// Returns `true` once a read has failed or been cancelled on this
    /// stream.
    pub fn is_broken(&self) -> bool {
        self.stream.broken
    }

    /// Read interleaved `I Q I Q ...` bytes straight into `buf`.
    ///
    /// `buf.len()` must be even. Fails with [`Error::ShortRead`] if the
    /// stream ends before `buf` is full.
    pub async fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() % BYTES_PER_SAMPLE != 0 {
            return Err(Error::InvalidArgument(format!(
                "sample buffer length {} is not a whole number of I/Q pairs",
                buf.len()
            )));
        }
        self.stream.fill(buf).instrument(self.span.clone()).await
    }

    /// Read exactly `out.len()` raw I/Q pairs.
    pub async fn read_raw(&mut self, out: &mut [IqSample]) -> Result<()> {
        let len = out.len() * BYTES_PER_SAMPLE;
        self.fill_scratch(len).await?;
        for (dst, pair) in out
            .iter_mut()
            .zip(self.scratch[..len].chunks_exact(BYTES_PER_SAMPLE))
        {
            *dst = IqSample::new(pair[0], pair[1]);
        }
        Ok(())
    }

    /// Read exactly `out.len()` pairs and normalize them to `[-1.0, 1.0]`.
    pub async fn read_complex(&mut self, out: &mut [Complex64]) -> Result<()> {
        let len = out.len() * BYTES_PER_SAMPLE;
        self.fill_scratch(len).await?;
        convert_interleaved(&self.scratch[..len], out)
    }

    async fn fill_scratch(&mut self, len: usize) -> Result<()> {
        if self.scratch.len() < len {
            self.scratch.resize(len, 0);
        }
        self.stream
            .fill(&mut self.scratch[..len])
            .instrument(self.span.clone())
            .await
    }
}

impl std::fmt::Debug for SampleReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleReader")
            .field("read_timeout", &self.stream.read_timeout)
            .field("broken", &self.stream.broken)
            .field("samples_read", &self.stream.samples_read)
            .finish_non_exhaustive()
    }
}
