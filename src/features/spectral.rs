//! Coarse band energy estimation with per-bin Goertzel resonators
//!
//! The Nyquist range is split into `N` equal bands. Each band sums the energy
//! of the frequency bins it covers, where a bin is `sample_rate / fft_size` Hz
//! wide (integer division) and its energy comes from a second-order recursive
//! resonator run over the analysis window.
//!
//! ## Analysis window
//!
//! Only the first `fft_size` samples of the caller's buffer are analysed. A
//! window of four 512-sample frames therefore contributes its leading frame
//! and nothing else. Inputs shorter than `fft_size` are zero padded.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::types::SAMPLE_RATE;
use crate::{Result, SensorError};

/// Upper bound of a reported band magnitude.
pub const BAND_MAGNITUDE_MAX: u32 = 1_000_000;

/// Longest analysis window the estimator accepts.
pub const MAX_FFT_SIZE: usize = 8192;

/// Fixed divisor applied to the per-band root energy.
const MAGNITUDE_DIVISOR: f64 = 1000.0;

/// Spectral estimator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Sample rate of the analysed signal in Hz
    pub sample_rate: u32,

    /// Analysis window length in samples; also sets the bin width
    pub fft_size: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self { sample_rate: SAMPLE_RATE, fft_size: 512 }
    }
}

impl SpectralConfig {
    /// Bin width in whole Hz.
    pub fn bin_width_hz(&self) -> u32 {
        if self.fft_size == 0 {
            return 0;
        }
        u32::try_from(self.sample_rate as usize / self.fft_size).unwrap_or(u32::MAX)
    }

    /// Number of bins covered by each of `band_count` bands.
    pub fn bins_per_band(&self, band_count: usize) -> usize {
        let bin_width = self.bin_width_hz();
        if band_count == 0 || bin_width == 0 {
            return 0;
        }
        let band_width = (self.sample_rate / 2) as usize / band_count;
        band_width / bin_width as usize
    }

    /// Check that `band_count` bands can be estimated with this configuration.
    pub fn validate(&self, band_count: usize) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(SensorError::computation("sample rate must be non-zero"));
        }
        if self.fft_size < 2 {
            return Err(SensorError::computation(format!(
                "analysis window of {} samples is too short",
                self.fft_size
            )));
        }
        if self.fft_size > MAX_FFT_SIZE {
            return Err(SensorError::computation(format!(
                "analysis window of {} samples exceeds {}",
                self.fft_size, MAX_FFT_SIZE
            )));
        }
        if band_count == 0 {
            return Err(SensorError::computation("band count must be non-zero"));
        }
        if self.bin_width_hz() == 0 {
            return Err(SensorError::computation(format!(
                "analysis window {} exceeds sample rate {}",
                self.fft_size, self.sample_rate
            )));
        }
        if self.bins_per_band(band_count) == 0 {
            return Err(SensorError::computation(format!(
                "{} bands are narrower than one {} Hz bin",
                band_count,
                self.bin_width_hz()
            )));
        }
        Ok(())
    }
}

/// Estimate `N` band magnitudes over the leading `fft_size` samples.
///
/// Silent or empty input yields all-zero bands. Every value is within
/// `0..=BAND_MAGNITUDE_MAX`.
pub fn spectral_bands<const N: usize>(samples: &[i16], config: &SpectralConfig) -> Result<[u32; N]> {
    config.validate(N)?;

    let mut bands = [0u32; N];
    if samples.is_empty() {
        return Ok(bands);
    }

    let fft_size = config.fft_size;
    let window: Vec<f64> =
        (0..fft_size).map(|n| samples.get(n).map_or(0.0, |&s| f64::from(s))).collect();

    let sample_rate = f64::from(config.sample_rate);
    let bin_width = f64::from(config.bin_width_hz());
    let bins_per_band = config.bins_per_band(N);
    let nyquist_bin = fft_size / 2;

    for (band, magnitude) in bands.iter_mut().enumerate() {
        let bin_start = band * bins_per_band;
        let bin_end = ((band + 1) * bins_per_band).min(nyquist_bin);

        let energy: f64 = (bin_start..bin_end)
            .map(|k| {
                let omega = 2.0 * PI * (k as f64 * bin_width) / sample_rate;
                goertzel_energy(&window, omega)
            })
            .sum();

        let scaled = (energy.sqrt() / MAGNITUDE_DIVISOR).min(f64::from(BAND_MAGNITUDE_MAX));
        *magnitude = if scaled.is_finite() && scaled > 0.0 { scaled as u32 } else { 0 };
    }

    Ok(bands)
}

/// Squared magnitude of a single-frequency resonator after the full window.
fn goertzel_energy(window: &[f64], omega: f64) -> f64 {
    let (sin, cos) = omega.sin_cos();
    let coeff = 2.0 * cos;

    let mut s_prev = 0.0;
    let mut s_curr = 0.0;
    for &x in window {
        let s_next = x + coeff * s_curr - s_prev;
        s_prev = s_curr;
        s_curr = s_next;
    }

    let real = s_curr - s_prev * cos;
    let imag = s_prev * sin;
    real * real + imag * imag
}
