//! Audio frame type delivered by the capture boundary

use super::FrameFlags;

/// Samples per hardware capture frame.
pub const FRAME_SIZE: usize = 512;

/// Microphone sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16_000;

/// Frames accumulated into one analysis window by default.
pub const DEFAULT_FRAMES_PER_PACKET: usize = 4;

/// One hardware capture unit of PCM audio.
///
/// Created per capture interrupt, consumed by feature extraction and then
/// dropped. Frames are moved through the frame queue, never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Signed 16-bit PCM samples
    pub samples: Box<[i16; FRAME_SIZE]>,

    /// Capture timestamp in milliseconds since boot
    pub timestamp_ms: u32,

    /// Monotonic frame counter
    pub frame_number: u32,

    /// Capture error/status bits
    pub flags: FrameFlags,
}

impl AudioFrame {
    /// Create a new frame
    pub fn new(
        samples: [i16; FRAME_SIZE],
        timestamp_ms: u32,
        frame_number: u32,
        flags: FrameFlags,
    ) -> Self {
        Self { samples: Box::new(samples), timestamp_ms, frame_number, flags }
    }

    /// Create a frame by copying up to `FRAME_SIZE` samples; the remainder is zero.
    pub fn from_slice(samples: &[i16], timestamp_ms: u32, frame_number: u32) -> Self {
        let mut buf = [0i16; FRAME_SIZE];
        let n = samples.len().min(FRAME_SIZE);
        buf[..n].copy_from_slice(&samples[..n]);
        Self::new(buf, timestamp_ms, frame_number, FrameFlags::empty())
    }

    /// Builder-style flag setter
    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sample slice
    pub fn samples(&self) -> &[i16] {
        self.samples.as_slice()
    }
}

/// Duration of one frame at `sample_rate`.
pub fn frame_period(sample_rate: u32) -> std::time::Duration {
    std::time::Duration::from_nanos(FRAME_SIZE as u64 * 1_000_000_000 / u64::from(sample_rate.max(1)))
}
