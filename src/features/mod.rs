//! Stateless feature math over PCM sample buffers.
//!
//! Every routine is a pure function of its inputs: no I/O, no shared state,
//! and a neutral result (zero) for empty input instead of a failure.
//!
//! | feature | output | range |
//! |---|---|---|
//! | [`rms`] | Q15 fixed point | 0..=32767 |
//! | [`zero_crossing_rate`] | percent of adjacent pairs | 0..=100 |
//! | [`peak_amplitude`] | absolute sample value | 0..=32767 |
//! | [`spl`] | dB SPL | 0..=120 |
//! | [`spectral_bands`] | scaled band magnitude | 0..=1,000,000 |

mod spectral;

use serde::{Deserialize, Serialize};

pub use spectral::{BAND_MAGNITUDE_MAX, MAX_FFT_SIZE, SpectralConfig, spectral_bands};

/// Largest Q15 value, representing ~1.0.
pub const Q15_MAX: u16 = 32767;

/// Full-scale magnitude of a signed 16-bit sample.
const FULL_SCALE: f64 = 32768.0;

/// Normalized RMS above which the Q15 result saturates.
const Q15_SATURATION: f64 = 0.99999;

/// Pressure floor keeping the SPL logarithm finite.
const PRESSURE_FLOOR: f32 = 1e-7;

/// Upper bound of the reported SPL.
pub const SPL_MAX_DB: u16 = 120;

/// Root-mean-square energy as Q15.
///
/// Accumulates in `f64` so a full window of full-scale samples cannot
/// overflow. Normalizes by 32768 and saturates at 32767.
pub fn rms(samples: &[i16]) -> u16 {
    if samples.is_empty() {
        return 0;
    }

    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let s = f64::from(s);
            s * s
        })
        .sum();

    let normalized = (sum / samples.len() as f64).sqrt() / FULL_SCALE;
    if normalized > Q15_SATURATION {
        return Q15_MAX;
    }

    (normalized * f64::from(Q15_MAX)) as u16
}

/// Number of sign changes between adjacent samples. Zero counts as non-negative.
pub fn zero_crossings(samples: &[i16]) -> usize {
    samples.windows(2).filter(|pair| (pair[0] >= 0) != (pair[1] >= 0)).count()
}

/// Zero-crossing rate as a percentage of adjacent sample pairs, clamped to 100.
///
/// Returns 0 for fewer than two samples.
pub fn zero_crossing_rate(samples: &[i16]) -> u16 {
    if samples.len() < 2 {
        return 0;
    }

    let pairs = (samples.len() - 1) as u64;
    let percent = zero_crossings(samples) as u64 * 100 / pairs;
    percent.min(100) as u16
}

/// Largest absolute sample value.
///
/// `i16::MIN` has no positive counterpart in 16 bits; its magnitude
/// saturates to 32767.
pub fn peak_amplitude(samples: &[i16]) -> u16 {
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0).min(Q15_MAX)
}

/// Microphone calibration used to convert Q15 RMS into dB SPL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplCalibration {
    /// Reference pressure in pascals (20 µPa is 0 dB SPL)
    pub ref_pressure: f32,

    /// Hardware-specific offset added after the log conversion
    pub offset_db: f32,
}

impl Default for SplCalibration {
    fn default() -> Self {
        Self { ref_pressure: 20e-6, offset_db: 84.0 }
    }
}

/// Sound pressure level in dB from a Q15 RMS value, clamped to 0..=120.
pub fn spl(rms_q15: u16, calibration: &SplCalibration) -> u16 {
    let ref_pressure = calibration.ref_pressure;
    if !(ref_pressure > 0.0) {
        return 0;
    }

    let pressure = (f32::from(rms_q15) * ref_pressure / f32::from(Q15_MAX)).max(PRESSURE_FLOOR);
    let db = 20.0 * (pressure / ref_pressure).log10() + calibration.offset_db;

    if db.is_nan() {
        return 0;
    }
    db.clamp(0.0, f32::from(SPL_MAX_DB)) as u16
}
