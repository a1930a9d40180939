//! rtl_tcp handshake codec.
//!
//! Immediately after accepting a connection the server sends a fixed
//! 12-byte greeting describing the dongle:
//!
//! ```text
//! +--------+----------------+----------------+
//! | magic  | tuner id (u32) | gain count u32 |
//! | "RTL0" | big-endian     | big-endian     |
//! +--------+----------------+----------------+
//!   4 bytes      4 bytes          4 bytes
//! ```
//!
//! Parsing and validation are separate steps: a greeting with the wrong
//! magic still decodes into a fully populated [`DongleInfo`], so a caller can
//! inspect what a misbehaving server actually sent.

use std::fmt;

use bytes::{Buf, BufMut};
use tokio::io::AsyncRead;

use rtltcp_core::error::{Error, Result};
use rtltcp_core::{DONGLE_MAGIC, Magic, TunerKind};
use rtltcp_transport::io::read_frame;

/// Size of the server greeting in bytes.
pub const HANDSHAKE_LEN: usize = 12;

/// Dongle description carried by the server greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DongleInfo {
    /// Protocol marker; `RTL0` for a genuine rtl_tcp server.
    pub magic: [u8; 4],
    /// Tuner chip fitted to the dongle.
    pub tuner: TunerKind,
    /// Number of discrete tuner gain steps, the bound for gain-by-index.
    pub gain_count: u32,
}

impl DongleInfo {
    /// Decode a greeting from its 12 wire bytes.
    pub fn from_bytes(bytes: &[u8; HANDSHAKE_LEN]) -> Self {
        let mut buf = &bytes[..];
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        let tuner = TunerKind::from_id(buf.get_u32());
        let gain_count = buf.get_u32();
        DongleInfo {
            magic,
            tuner,
            gain_count,
        }
    }

    /// Encode back to the 12 wire bytes.
    pub fn to_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut out = [0u8; HANDSHAKE_LEN];
        let mut buf = &mut out[..];
        buf.put_slice(&self.magic);
        buf.put_u32(self.tuner.id());
        buf.put_u32(self.gain_count);
        out
    }

    /// Read exactly one greeting from `reader`.
    ///
    /// Fails with [`Error::ShortRead`] if the stream ends before 12 bytes
    /// arrive. Does not check the magic; see [`is_valid`](Self::is_valid).
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut bytes = [0u8; HANDSHAKE_LEN];
        read_frame(reader, &mut bytes).await?;
        let info = DongleInfo::from_bytes(&bytes);
        tracing::debug!(
            magic = %Magic(&info.magic),
            tuner = %info.tuner,
            gain_count = info.gain_count,
            "Handshake received"
        );
        Ok(info)
    }

    /// Returns `true` iff the magic is `RTL0`.
    pub fn is_valid(&self) -> bool {
        self.magic == DONGLE_MAGIC
    }

    /// Like [`is_valid`](Self::is_valid), but reports a mismatch as
    /// [`Error::ProtocolMismatch`] carrying both magics.
    pub fn check(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::ProtocolMismatch {
                expected: DONGLE_MAGIC,
                received: self.magic,
            })
        }
    }
}

impl fmt::Display for DongleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{magic:{} tuner:{} gain_count:{}}}",
            Magic(&self.magic),
            self.tuner,
            self.gain_count
        )
    }
}
