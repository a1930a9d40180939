//! Formatting and measurement helpers for rtl_tcp applications.
//!
//! Small utilities that consuming tools (CLI exercisers, spectrum monitors)
//! need when presenting tuning parameters and captured sample blocks.

use num_complex::Complex64;

/// Format a frequency in hertz as a human-readable MHz string.
///
/// # Example
///
/// ```
/// use rtltcp_core::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(100_000_000), "100.000000 MHz");
/// assert_eq!(format_freq_mhz(1_090_000_000), "1090.000000 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: u32) -> String {
    let mhz = freq_hz as f64 / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

/// Format a gain in tenths of a dB, the unit rtl_tcp uses on the wire.
///
/// # Example
///
/// ```
/// use rtltcp_core::format_gain_db;
///
/// assert_eq!(format_gain_db(197), "19.7 dB");
/// assert_eq!(format_gain_db(-10), "-1.0 dB");
/// ```
pub fn format_gain_db(tenths_db: i32) -> String {
    let db = tenths_db as f64 / 10.0;
    format!("{db:.1} dB")
}

/// Mean power of a block of normalized samples, in dB relative to full scale.
///
/// Returns `f64::NEG_INFINITY` for an empty or all-zero block.
pub fn mean_power_dbfs(samples: &[Complex64]) -> f64 {
    if samples.is_empty() {
        return f64::NEG_INFINITY;
    }
    let power = samples.iter().map(|s| s.norm_sqr()).sum::<f64>() / samples.len() as f64;
    10.0 * power.log10()
}

/// Mean of a block of samples, i.e. its DC offset.
pub fn dc_offset(samples: &[Complex64]) -> Complex64 {
    if samples.is_empty() {
        return Complex64::new(0.0, 0.0);
    }
    samples.iter().sum::<Complex64>() / samples.len() as f64
}
