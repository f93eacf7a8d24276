//! Capture boundary between the audio driver and the processing pipeline
//!
//! Whatever produces frames (a DMA interrupt on hardware, a [`FrameSource`]
//! task on a host) hands them to [`AcquisitionHandle::push`], which never
//! blocks. Feature extraction is the only consumer of the other end.
//!
//! [`FrameSource`]: crate::source::FrameSource

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{info, trace, warn};

use crate::queue::{self, QueueReceiver, QueueSender};
use crate::types::AudioFrame;
use crate::Result;

/// Default number of frames that may wait for extraction.
pub const FRAME_QUEUE_DEPTH: usize = 4;

#[derive(Debug)]
struct Counters {
    frames: AtomicU32,
    errors: AtomicU32,
    active: AtomicBool,
}

/// Producer side of the frame queue plus capture diagnostics.
///
/// Cheap to clone; every clone feeds the same queue and counters.
#[derive(Debug, Clone)]
pub struct AcquisitionHandle {
    frames: QueueSender<AudioFrame>,
    counters: Arc<Counters>,
}

impl AcquisitionHandle {
    /// Create the frame queue. The receiver goes to feature extraction.
    pub fn start(depth: usize) -> Result<(Self, QueueReceiver<AudioFrame>)> {
        let (frames, rx) = queue::bounded("acquisition", depth)?;
        let counters = Arc::new(Counters {
            frames: AtomicU32::new(0),
            errors: AtomicU32::new(0),
            active: AtomicBool::new(true),
        });

        info!(queue_depth = depth, "Audio acquisition started");
        Ok((Self { frames, counters }, rx))
    }

    /// Offer a captured frame. A full or closed queue drops the frame and
    /// returns false.
    pub fn push(&self, frame: AudioFrame) -> bool {
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        let frame_number = frame.frame_number;

        if self.frames.push(frame) {
            trace!(frame_number, "Frame queued");
            true
        } else {
            warn!(frame_number, overflows = self.frames.dropped(), "Frame queue full, frame dropped");
            false
        }
    }

    /// Frames offered to the boundary, including dropped ones
    pub fn frame_count(&self) -> u32 {
        self.counters.frames.load(Ordering::Relaxed)
    }

    /// Frames dropped because the queue was full
    pub fn overflow_count(&self) -> u32 {
        self.frames.dropped()
    }

    /// Driver-level capture failures
    pub fn error_count(&self) -> u32 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    /// Count a capture failure reported by the driver.
    pub fn record_error(&self) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.counters.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.counters.active.store(active, Ordering::Relaxed);
    }

    /// Frames waiting for extraction
    pub fn queued(&self) -> usize {
        self.frames.len()
    }
}
