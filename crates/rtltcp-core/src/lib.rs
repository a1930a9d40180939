//! rtltcp-core: Core types, error definitions, and the transport seam for
//! the rtl_tcp client.
//!
//! The protocol driver (`rtltcp`), the TCP transport (`rtltcp-transport`),
//! and the mock server (`rtltcp-test-harness`) all build on these types.
//!
//! # Key types
//!
//! - [`TunerKind`] -- tuner registry keyed by the handshake's tuner id
//! - [`IqSample`] -- one raw offset-binary I/Q pair
//! - [`RtlTcpTransport`] -- a connected byte stream split into halves
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod helpers;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use rtltcp_core::*`.
pub use error::{Error, Magic, Result};
pub use helpers::{dc_offset, format_freq_mhz, format_gain_db, mean_power_dbfs};
pub use transport::{BoxedReader, BoxedWriter, RtlTcpTransport};
pub use types::*;

/// The 4-byte marker every rtl_tcp server sends at the start of its
/// handshake.
pub const DONGLE_MAGIC: [u8; 4] = *b"RTL0";
