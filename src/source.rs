//! Frame source trait for capture backends

use crate::Result;
use crate::types::AudioFrame;

/// Trait for audio capture backends
///
/// A source owns its own pacing: a hardware backend waits for the next DMA
/// half-transfer, a synthetic one sleeps for a frame period.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Get the next captured frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Capture failed; the caller counts it and may retry
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>>;

    /// Sample rate of the produced audio in Hz
    fn sample_rate(&self) -> u32;
}

#[async_trait::async_trait]
impl FrameSource for Box<dyn FrameSource> {
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
        (**self).next_frame().await
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }
}
