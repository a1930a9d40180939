//! rtl_tcp command encoder.
//!
//! Every client-to-server message is a fixed 5-byte frame:
//!
//! ```text
//! +--------+---------------------------+
//! | opcode | parameter (u32, big-end.) |
//! +--------+---------------------------+
//!   1 byte           4 bytes
//! ```
//!
//! There is no response, acknowledgement, or error path: the server applies
//! the command (or silently ignores it) and keeps streaming samples. The
//! encoder is a pure framing function and performs no validation.

use std::fmt;

use bytes::{Buf, BufMut};

use rtltcp_core::error::{Error, Result};

/// Size of one encoded command in bytes.
pub const COMMAND_LEN: usize = 5;

/// rtl_tcp command opcodes, as numbered by the server's command loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Center frequency in Hz.
    CenterFreq = 0x01,
    /// Sample rate in Hz.
    SampleRate = 0x02,
    /// Tuner gain mode: 0 automatic, 1 manual.
    GainMode = 0x03,
    /// Tuner gain in tenths of a dB.
    TunerGain = 0x04,
    /// Frequency correction in ppm.
    FreqCorrection = 0x05,
    /// Tuner IF stage gain, `(stage << 16) | gain`.
    TunerIfGain = 0x06,
    /// RTL2832U test mode (counter instead of samples): 0/1.
    TestMode = 0x07,
    /// RTL2832U digital AGC: 0/1.
    AgcMode = 0x08,
    /// Direct sampling: 0 off, 1 I branch, 2 Q branch.
    DirectSampling = 0x09,
    /// Offset tuning: 0/1.
    OffsetTuning = 0x0A,
    /// RTL2832U crystal frequency in Hz.
    RtlXtalFreq = 0x0B,
    /// Tuner crystal frequency in Hz.
    TunerXtalFreq = 0x0C,
    /// Tuner gain by index into the dongle's gain table.
    GainByIndex = 0x0D,
}

impl Opcode {
    /// All opcodes in wire order.
    pub const ALL: [Opcode; 13] = [
        Opcode::CenterFreq,
        Opcode::SampleRate,
        Opcode::GainMode,
        Opcode::TunerGain,
        Opcode::FreqCorrection,
        Opcode::TunerIfGain,
        Opcode::TestMode,
        Opcode::AgcMode,
        Opcode::DirectSampling,
        Opcode::OffsetTuning,
        Opcode::RtlXtalFreq,
        Opcode::TunerXtalFreq,
        Opcode::GainByIndex,
    ];

    /// Short kebab-case name, as used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::CenterFreq => "center-freq",
            Opcode::SampleRate => "sample-rate",
            Opcode::GainMode => "gain-mode",
            Opcode::TunerGain => "tuner-gain",
            Opcode::FreqCorrection => "freq-correction",
            Opcode::TunerIfGain => "if-gain",
            Opcode::TestMode => "test-mode",
            Opcode::AgcMode => "agc-mode",
            Opcode::DirectSampling => "direct-sampling",
            Opcode::OffsetTuning => "offset-tuning",
            Opcode::RtlXtalFreq => "rtl-xtal-freq",
            Opcode::TunerXtalFreq => "tuner-xtal-freq",
            Opcode::GainByIndex => "gain-by-index",
        }
    }

    /// Look up an opcode by its [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Opcode::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Opcode::ALL
            .into_iter()
            .find(|op| *op as u8 == value)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown opcode 0x{value:02X}")))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One command frame: an opcode byte and a 32-bit parameter.
///
/// The opcode is kept as a raw byte so that any frame, including ones with
/// opcodes this client never sends, decodes and re-encodes unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    /// Raw opcode byte.
    pub opcode: u8,
    /// Parameter, sent big-endian.
    pub param: u32,
}

impl Command {
    /// Build a command for a known opcode.
    pub fn new(opcode: Opcode, param: u32) -> Self {
        Command {
            opcode: opcode.into(),
            param,
        }
    }

    /// The typed opcode, if the byte is one the protocol defines.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    /// Encode to the 5-byte wire frame.
    ///
    /// # Example
    ///
    /// ```
    /// use rtltcp::command::{Command, Opcode};
    ///
    /// let frame = Command::new(Opcode::CenterFreq, 100_000_000).encode();
    /// assert_eq!(frame, [0x01, 0x05, 0xF5, 0xE1, 0x00]);
    /// ```
    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let mut out = [0u8; COMMAND_LEN];
        let mut buf = &mut out[..];
        buf.put_u8(self.opcode);
        buf.put_u32(self.param);
        out
    }

    /// Decode a 5-byte wire frame.
    pub fn decode(bytes: &[u8; COMMAND_LEN]) -> Self {
        let mut buf = &bytes[..];
        let opcode = buf.get_u8();
        let param = buf.get_u32();
        Command { opcode, param }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode() {
            Some(op) => write!(f, "{}({})", op, self.param),
            None => write!(f, "0x{:02X}({})", self.opcode, self.param),
        }
    }
}
