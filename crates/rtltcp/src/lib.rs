//! # rtltcp -- Async client for the rtl_tcp SDR protocol
//!
//! `rtltcp` talks to an `rtl_tcp` server, the TCP front end that exposes an
//! RTL2832U software-defined-radio dongle on the network. It provides:
//!
//! - **Handshake codec** ([`handshake`]) -- the 12-byte greeting
//!   `"RTL0" | tuner id | gain count` decoded into [`DongleInfo`].
//! - **Command encoder** ([`command`]) -- the 5-byte `opcode | u32` frame for
//!   all 13 opcodes.
//! - **Control** ([`control`]) -- the [`SdrControl`] trait with one typed
//!   method per opcode, and the shareable [`Commander`] that implements it.
//! - **Sample stream** ([`samples`]) -- the exclusive [`SampleReader`] that
//!   turns the unframed byte stream into I/Q pairs or normalized complex
//!   samples.
//! - **RtlTcpClient** ([`client`]) and **RtlTcpBuilder** ([`builder`]) --
//!   connection lifecycle and configuration.
//!
//! # Architecture
//!
//! The two directions of an rtl_tcp connection never interact: commands go
//! out with no reply, samples come in with no framing. The client is
//! therefore split along the same line. Commands serialize through a mutex
//! inside [`Commander`], so clones can be handed to any task. Sample reads
//! take `&mut` on [`SampleReader`], so only one reader can exist.
//!
//! Logging goes through `tracing` inside a span supplied with
//! [`RtlTcpBuilder::span`]. The library never installs a subscriber.
//!
//! # Example
//!
//! ```no_run
//! use rtltcp::{GainMode, RtlTcpBuilder, SdrControl};
//! use num_complex::Complex64;
//!
//! # async fn example() -> rtltcp::Result<()> {
//! let client = RtlTcpBuilder::new("127.0.0.1:1234").build().await?;
//! println!("{}", client.info());
//!
//! let (commander, mut samples) = client.into_split();
//! commander
//!     .set_center_freq(433_920_000)
//!     .await?
//!     .set_gain_mode(GainMode::Manual)
//!     .await?
//!     .set_gain(197)
//!     .await?;
//!
//! let mut block = vec![Complex64::new(0.0, 0.0); 8192];
//! samples.read_complex(&mut block).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod client;
pub mod command;
pub mod control;
pub mod handshake;
pub mod samples;

pub use rtltcp_core::*;

pub use builder::RtlTcpBuilder;
pub use client::RtlTcpClient;
pub use command::{COMMAND_LEN, Command, Opcode};
pub use control::{Commander, SdrControl};
pub use handshake::{DongleInfo, HANDSHAKE_LEN};
pub use samples::{SampleReader, convert, convert_interleaved};
