//! Exact-size framed I/O over a byte stream.
//!
//! Every rtl_tcp unit has a fixed size known in advance: the 12-byte
//! handshake, the 5-byte command, and a caller-chosen block of 2-byte I/Q
//! pairs. These helpers move exactly one such unit and report precisely how
//! far they got when the stream gives out, so that errors can say "expected
//! 12 bytes, received 7" instead of a bare end-of-file.

use std::io::ErrorKind;
use std::time::Duration;

use rtltcp_core::error::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Fill `buf` completely from `reader`.
///
/// Returns [`Error::ShortRead`] if the stream ends before `buf.len()` bytes
/// arrive, and [`Error::Transport`] for any other I/O failure. On error the
/// contents of `buf` are unspecified and must not be used.
pub async fn read_frame<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let expected = buf.len();
    let mut received = 0;

    while received < expected {
        match reader.read(&mut buf[received..]).await {
            Ok(0) => {
                tracing::debug!(expected, received, "Stream ended mid-frame");
                return Err(Error::ShortRead { expected, received });
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                tracing::debug!(expected, received, "Stream ended mid-frame");
                return Err(Error::ShortRead { expected, received });
            }
            Err(e) => {
                tracing::error!(error = %e, expected, received, "Failed to read frame");
                return Err(Error::Transport(e));
            }
        }
    }

    tracing::trace!(bytes = expected, "Frame read");
    Ok(())
}

/// Like [`read_frame`], but gives up with [`Error::Timeout`] if the whole
/// frame has not arrived within `timeout`.
///
/// A `None` timeout waits indefinitely.
pub async fn read_frame_timeout<R>(
    reader: &mut R,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let bytes = buf.len();
    match timeout {
        None => read_frame(reader, buf).await,
        Some(limit) => tokio::time::timeout(limit, read_frame(reader, buf))
            .await
            .map_err(|_| {
                tracing::debug!(
                    bytes,
                    timeout_ms = limit.as_millis(),
                    "Timeout waiting for frame"
                );
                Error::Timeout
            })?,
    }
}

/// Write all of `frame` to `writer` and flush it.
///
/// Returns [`Error::ShortWrite`] if the transport stops accepting bytes
/// part-way through, and [`Error::Transport`] for any other I/O failure.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let expected = frame.len();
    let mut written = 0;

    tracing::trace!(bytes = expected, data = ?frame, "Sending frame");

    while written < expected {
        match writer.write(&frame[written..]).await {
            Ok(0) => {
                tracing::error!(expected, written, "Transport stopped accepting bytes");
                return Err(Error::ShortWrite { expected, written });
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::error!(error = %e, expected, written, "Failed to write frame");
                return Err(Error::Transport(e));
            }
        }
    }

    writer.flush().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to flush frame");
        Error::Transport(e)
    })?;

    Ok(())
}
