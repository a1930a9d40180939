//! rtltcp-test-harness: Test utilities for rtltcp.
//!
//! This crate provides [`MockRtlTcpServer`], a scripted localhost rtl_tcp
//! server for exercising the client end to end over real TCP without an SDR
//! dongle attached.

pub mod mock_server;

pub use mock_server::{MockRtlTcpServer, MockSession, greeting_bytes};
