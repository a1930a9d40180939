//! Transport implementations for rtltcp.
//!
//! - [`tcp`]: opens the TCP connection to an rtl_tcp server and splits it
//!   into an [`RtlTcpTransport`](rtltcp_core::RtlTcpTransport)
//! - [`io`]: exact-size frame reads and writes that report short transfers
//!   with byte counts
//!
//! # Example
//!
//! ```no_run
//! use rtltcp_transport::{io, tcp};
//!
//! # async fn example() -> rtltcp_core::Result<()> {
//! let mut transport = tcp::connect("127.0.0.1:1234").await?;
//!
//! // Read the 12-byte greeting
//! let mut greeting = [0u8; 12];
//! io::read_frame(&mut transport.read, &mut greeting).await?;
//!
//! // Set the center frequency to 100 MHz
//! io::write_frame(&mut transport.write, &[0x01, 0x05, 0xF5, 0xE1, 0x00]).await?;
//! # Ok(())
//! # }
//! ```

pub mod io;
pub mod tcp;

pub use io::{read_frame, read_frame_timeout, write_frame};
pub use tcp::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};
