//! Core types used throughout rtltcp.
//!
//! These are the value types that appear on the rtl_tcp wire or in the
//! control surface: the tuner registry, gain and direct-sampling modes, and
//! the raw offset-binary I/Q pair.

use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;

/// Tuner chip reported by the server in the handshake.
///
/// The handshake carries a 32-bit tuner id. Ids 1 through 6 name the tuner
/// chips librtlsdr supports; every other value (including 0) is kept verbatim
/// in [`TunerKind::Unknown`] so that a handshake can be re-encoded exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunerKind {
    /// Elonics E4000.
    E4000,
    /// Fitipower FC0012.
    Fc0012,
    /// Fitipower FC0013.
    Fc0013,
    /// FCI FC2580.
    Fc2580,
    /// Rafael Micro R820T / R820T2.
    R820t,
    /// Rafael Micro R828D.
    R828d,
    /// Any id outside the known set.
    Unknown(u32),
}

impl TunerKind {
    /// Look up a tuner by its wire id.
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => TunerKind::E4000,
            2 => TunerKind::Fc0012,
            3 => TunerKind::Fc0013,
            4 => TunerKind::Fc2580,
            5 => TunerKind::R820t,
            6 => TunerKind::R828d,
            other => TunerKind::Unknown(other),
        }
    }

    /// Return the wire id of this tuner.
    pub fn id(&self) -> u32 {
        match self {
            TunerKind::E4000 => 1,
            TunerKind::Fc0012 => 2,
            TunerKind::Fc0013 => 3,
            TunerKind::Fc2580 => 4,
            TunerKind::R820t => 5,
            TunerKind::R828d => 6,
            TunerKind::Unknown(id) => *id,
        }
    }

    /// Vendor part name, or `"UNKNOWN"`.
    pub fn name(&self) -> &'static str {
        match self {
            TunerKind::E4000 => "E4000",
            TunerKind::Fc0012 => "FC0012",
            TunerKind::Fc0013 => "FC0013",
            TunerKind::Fc2580 => "FC2580",
            TunerKind::R820t => "R820T",
            TunerKind::R828d => "R828D",
            TunerKind::Unknown(_) => "UNKNOWN",
        }
    }

    /// Returns `true` for ids in the known registry.
    pub fn is_known(&self) -> bool {
        !matches!(self, TunerKind::Unknown(_))
    }
}

impl From<u32> for TunerKind {
    fn from(id: u32) -> Self {
        TunerKind::from_id(id)
    }
}

impl From<TunerKind> for u32 {
    fn from(tuner: TunerKind) -> Self {
        tuner.id()
    }
}

impl fmt::Display for TunerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tuner gain control mode (opcode 3).
///
/// The server hands the parameter straight to
/// `rtlsdr_set_tuner_gain_mode`, where 0 selects automatic gain and 1
/// selects manual gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainMode {
    /// Tuner AGC picks the gain.
    Automatic,
    /// Gain is set explicitly via tuner gain or gain-by-index commands.
    Manual,
}

impl GainMode {
    /// The 32-bit wire parameter for this mode.
    pub fn wire_value(&self) -> u32 {
        match self {
            GainMode::Automatic => 0,
            GainMode::Manual => 1,
        }
    }
}

impl fmt::Display for GainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GainMode::Automatic => write!(f, "auto"),
            GainMode::Manual => write!(f, "manual"),
        }
    }
}

/// Error returned when a string cannot be parsed into a control value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseValueError(String);

impl fmt::Display for ParseValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized value: {}", self.0)
    }
}

impl std::error::Error for ParseValueError {}

impl FromStr for GainMode {
    type Err = ParseValueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" | "agc" => Ok(GainMode::Automatic),
            "manual" => Ok(GainMode::Manual),
            _ => Err(ParseValueError(s.to_string())),
        }
    }
}

/// Direct sampling mode (opcode 9).
///
/// Direct sampling bypasses the tuner and feeds the RTL2832U ADC directly,
/// used for HF reception on modified dongles. Converting from `bool` maps
/// `true` to the I branch (wire value 1) and `false` to disabled (0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectSampling {
    /// Normal tuner operation.
    Disabled,
    /// Sample the I-branch ADC input.
    IBranch,
    /// Sample the Q-branch ADC input.
    QBranch,
}

impl DirectSampling {
    /// The 32-bit wire parameter for this mode.
    pub fn wire_value(&self) -> u32 {
        match self {
            DirectSampling::Disabled => 0,
            DirectSampling::IBranch => 1,
            DirectSampling::QBranch => 2,
        }
    }
}

impl From<bool> for DirectSampling {
    fn from(enabled: bool) -> Self {
        if enabled {
            DirectSampling::IBranch
        } else {
            DirectSampling::Disabled
        }
    }
}

impl fmt::Display for DirectSampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectSampling::Disabled => write!(f, "off"),
            DirectSampling::IBranch => write!(f, "i"),
            DirectSampling::QBranch => write!(f, "q"),
        }
    }
}

impl FromStr for DirectSampling {
    type Err = ParseValueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "0" | "false" => Ok(DirectSampling::Disabled),
            "i" | "1" | "true" => Ok(DirectSampling::IBranch),
            "q" | "2" => Ok(DirectSampling::QBranch),
            _ => Err(ParseValueError(s.to_string())),
        }
    }
}

/// Map an offset-binary sample byte to `[-1.0, 1.0]`.
///
/// The dongle ADC centers on 127.5, so 0 maps to exactly -1.0, 255 to
/// exactly 1.0, and neither 127 nor 128 is exactly zero.
#[inline]
pub fn normalize(byte: u8) -> f64 {
    (byte as f64 - 127.5) / 127.5
}

/// One raw I/Q pair as it appears on the wire: two offset-binary bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IqSample {
    /// In-phase amplitude.
    pub i: u8,
    /// Quadrature amplitude.
    pub q: u8,
}

impl IqSample {
    /// Create a sample from its two raw bytes.
    pub fn new(i: u8, q: u8) -> Self {
        IqSample { i, q }
    }

    /// Convert to a normalized complex baseband sample.
    #[inline]
    pub fn to_complex(&self) -> Complex64 {
        Complex64::new(normalize(self.i), normalize(self.q))
    }
}

impl From<IqSample> for Complex64 {
    fn from(sample: IqSample) -> Self {
        sample.to_complex()
    }
}
