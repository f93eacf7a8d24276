//! Synthetic microphone for host builds and tests
//!
//! Produces a sum of sine tones plus optional seeded uniform noise, framed in
//! 512-sample blocks. Timestamps follow the sample clock, so the output is
//! fully deterministic for a fixed seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::source::FrameSource;
use crate::types::{AudioFrame, FRAME_SIZE, FrameFlags, SAMPLE_RATE, frame_period};
use crate::{Result, SensorError};

/// A single sine component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub frequency_hz: f64,
    pub amplitude: i16,
}

/// Synthetic source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Sine components summed into every sample
    pub tones: Vec<Tone>,

    /// Peak amplitude of uniform noise, 0 disables it
    pub noise_amplitude: u16,

    /// Noise seed; `None` seeds from the OS
    pub seed: Option<u64>,

    /// Absolute sample level that marks a frame as clipped
    pub clip_level: u16,

    /// Sleep one frame period between frames
    pub paced: bool,

    /// Stop after this many frames
    pub max_frames: Option<u32>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            tones: vec![
                Tone { frequency_hz: 120.0, amplitude: 6_000 },
                Tone { frequency_hz: 2_500.0, amplitude: 1_500 },
            ],
            noise_amplitude: 300,
            seed: None,
            clip_level: 32_000,
            paced: true,
            max_frames: None,
        }
    }
}

/// Synthetic frame source
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: ChaCha8Rng,
    interval: Option<Interval>,
    frame_number: u32,
    sample_index: u64,
}

impl SyntheticSource {
    /// Create a source from its settings.
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(SensorError::config("synthetic sample_rate must be non-zero"));
        }

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        info!(
            sample_rate = config.sample_rate,
            tones = config.tones.len(),
            paced = config.paced,
            "Synthetic source ready"
        );

        Ok(Self { config, rng, interval: None, frame_number: 0, sample_index: 0 })
    }

    /// Frames produced so far
    pub fn frames_produced(&self) -> u32 {
        self.frame_number
    }

    fn render_frame(&mut self) -> AudioFrame {
        let sample_rate = f64::from(self.config.sample_rate);
        let noise = f64::from(self.config.noise_amplitude);
        let clip_level = i32::from(self.config.clip_level);

        let timestamp_ms = (self.sample_index * 1000 / u64::from(self.config.sample_rate)) as u32;
        let mut samples = [0i16; FRAME_SIZE];
        let mut flags = FrameFlags::empty();

        for sample in samples.iter_mut() {
            let t = self.sample_index as f64 / sample_rate;
            let mut value: f64 = self
                .config
                .tones
                .iter()
                .map(|tone| f64::from(tone.amplitude) * (2.0 * PI * tone.frequency_hz * t).sin())
                .sum();
            if noise > 0.0 {
                value += self.rng.gen_range(-noise..=noise);
            }

            let clamped = value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
            if i32::from(clamped).abs() >= clip_level {
                flags |= FrameFlags::new(FrameFlags::CLIPPING);
            }
            *sample = clamped;
            self.sample_index += 1;
        }

        let frame = AudioFrame::new(samples, timestamp_ms, self.frame_number, flags);
        self.frame_number = self.frame_number.wrapping_add(1);
        frame
    }
}

#[async_trait::async_trait]
impl FrameSource for SyntheticSource {
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
        if let Some(limit) = self.config.max_frames {
            if self.frame_number >= limit {
                debug!(frames = self.frame_number, "Synthetic source reached frame limit");
                return Ok(None);
            }
        }

        if self.config.paced {
            let period = frame_period(self.config.sample_rate);
            let ticker = self.interval.get_or_insert_with(|| {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            ticker.tick().await;
        }

        let frame = self.render_frame();
        trace!(frame_number = frame.frame_number, timestamp_ms = frame.timestamp_ms, "Synthetic frame");
        Ok(Some(frame))
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(tones: Vec<Tone>) -> SyntheticConfig {
        SyntheticConfig { tones, noise_amplitude: 0, seed: Some(1), paced: false, ..Default::default() }
    }

    #[tokio::test]
    async fn frames_are_numbered_and_timestamped_by_sample_clock() {
        let mut source = SyntheticSource::new(quiet(vec![])).unwrap();

        let first = source.next_frame().await.unwrap().unwrap();
        let second = source.next_frame().await.unwrap().unwrap();

        assert_eq!((first.frame_number, first.timestamp_ms), (0, 0));
        // 512 samples at 16 kHz
        assert_eq!((second.frame_number, second.timestamp_ms), (1, 32));
        assert!(second.samples().iter().all(|&s| s == 0));
    }

    #[tokio::test]
    async fn frame_limit_ends_the_stream() {
        let config = SyntheticConfig { max_frames: Some(2), ..quiet(vec![]) };
        let mut source = SyntheticSource::new(config).unwrap();

        assert!(source.next_frame().await.unwrap().is_some());
        assert!(source.next_frame().await.unwrap().is_some());
        assert!(source.next_frame().await.unwrap().is_none());
        assert_eq!(source.frames_produced(), 2);
    }

    #[tokio::test]
    async fn loud_tone_sets_clipping_flag() {
        let loud = quiet(vec![Tone { frequency_hz: 1_000.0, amplitude: i16::MAX }]);
        let mut source = SyntheticSource::new(loud).unwrap();
        let frame = source.next_frame().await.unwrap().unwrap();
        assert!(frame.flags.has_flag(FrameFlags::CLIPPING));

        let soft = quiet(vec![Tone { frequency_hz: 1_000.0, amplitude: 1_000 }]);
        let mut source = SyntheticSource::new(soft).unwrap();
        let frame = source.next_frame().await.unwrap().unwrap();
        assert!(frame.flags.is_empty());
        assert!(frame.samples().iter().all(|s| s.unsigned_abs() <= 1_000));
    }

    #[tokio::test]
    async fn same_seed_same_noise() {
        let config = SyntheticConfig { seed: Some(42), paced: false, ..Default::default() };
        let mut a = SyntheticSource::new(config.clone()).unwrap();
        let mut b = SyntheticSource::new(config).unwrap();

        assert_eq!(a.next_frame().await.unwrap(), b.next_frame().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn paced_source_waits_one_frame_period() {
        let config = SyntheticConfig { paced: true, ..quiet(vec![]) };
        let mut source = SyntheticSource::new(config).unwrap();

        let started = tokio::time::Instant::now();
        for _ in 0..3 {
            source.next_frame().await.unwrap();
        }
        // First tick is immediate, then two 32 ms periods
        assert!(started.elapsed() >= std::time::Duration::from_millis(64));
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let config = SyntheticConfig { sample_rate: 0, ..Default::default() };
        assert!(matches!(SyntheticSource::new(config), Err(SensorError::Config { .. })));
    }
}
