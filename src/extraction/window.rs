//! Sample accumulator for one analysis window

use crate::types::{AudioFrame, FRAME_SIZE, FrameFlags};

/// Collects whole frames until a target sample count is reached.
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    samples: Vec<i16>,
    capacity: usize,
    start_timestamp_ms: Option<u32>,
    flags: FrameFlags,
}

impl AnalysisWindow {
    /// Window holding `frames` whole frames.
    pub fn for_frames(frames: usize) -> Self {
        Self::with_capacity(frames * FRAME_SIZE)
    }

    /// Window holding exactly `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { samples: Vec::with_capacity(capacity), capacity, start_timestamp_ms: None, flags: FrameFlags::empty() }
    }

    /// Append a frame's samples and merge its flags.
    ///
    /// Returns false, leaving the window untouched, when the frame would
    /// overflow the capacity.
    pub fn append(&mut self, frame: &AudioFrame) -> bool {
        let incoming = frame.samples();
        if self.samples.len() + incoming.len() > self.capacity {
            return false;
        }

        if self.samples.is_empty() {
            self.start_timestamp_ms = Some(frame.timestamp_ms);
        }
        self.samples.extend_from_slice(incoming);
        self.flags |= frame.flags;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Timestamp of the first frame in the window
    pub fn start_timestamp_ms(&self) -> u32 {
        self.start_timestamp_ms.unwrap_or(0)
    }

    /// Capture flags OR-ed across every appended frame
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// Empty the window, keeping its allocation.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.start_timestamp_ms = None;
        self.flags = FrameFlags::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: u32, flags: u8) -> AudioFrame {
        AudioFrame::from_slice(&[ts as i16; 3], ts, ts).with_flags(FrameFlags::new(flags))
    }

    #[test]
    fn fills_to_capacity_and_keeps_first_timestamp() {
        let mut window = AnalysisWindow::for_frames(4);
        assert_eq!(window.capacity(), 2048);

        for (i, ts) in [1000, 1032, 1064, 1096].into_iter().enumerate() {
            assert!(!window.is_complete());
            assert!(window.append(&frame(ts, 0)));
            assert_eq!(window.len(), (i + 1) * FRAME_SIZE);
        }

        assert!(window.is_complete());
        assert_eq!(window.start_timestamp_ms(), 1000);
        assert_eq!(window.samples()[FRAME_SIZE], 1032);
    }

    #[test]
    fn overflowing_frame_is_rejected() {
        let mut window = AnalysisWindow::with_capacity(700);
        assert!(window.append(&frame(1, 0)));
        assert!(!window.append(&frame(2, FrameFlags::DMA_ERROR)));

        assert_eq!(window.len(), FRAME_SIZE);
        assert!(window.flags().is_empty());
    }

    #[test]
    fn flags_accumulate_and_reset_clears_everything() {
        let mut window = AnalysisWindow::for_frames(2);
        window.append(&frame(5, FrameFlags::DMA_ERROR));
        window.append(&frame(6, FrameFlags::CLIPPING));
        assert_eq!(window.flags().value(), 0x05);

        window.reset();
        assert!(window.is_empty());
        assert!(window.flags().is_empty());
        assert_eq!(window.start_timestamp_ms(), 0);

        window.append(&frame(77, 0));
        assert_eq!(window.start_timestamp_ms(), 77);
    }
}
