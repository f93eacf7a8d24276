//! Capture task feeding a frame source into the acquisition boundary

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::acquisition::AcquisitionHandle;
use crate::source::FrameSource;

/// Consecutive source failures tolerated before capture stops.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Spawns and runs the capture loop
pub struct Capture;

impl Capture {
    /// Spawn a task that pulls frames from `source` until it ends, fails
    /// too often, or `cancel` fires.
    pub fn spawn<S>(source: S, acquisition: AcquisitionHandle, cancel: CancellationToken) -> JoinHandle<()>
    where
        S: FrameSource,
    {
        tokio::spawn(async move {
            Self::capture_task(source, acquisition, cancel).await;
        })
    }

    async fn capture_task<S>(mut source: S, acquisition: AcquisitionHandle, cancel: CancellationToken)
    where
        S: FrameSource,
    {
        info!(sample_rate = source.sample_rate(), "Capture task started");
        acquisition.set_active(true);
        let mut captured = 0u64;
        let mut consecutive_errors = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Capture cancelled");
                    break;
                }
                result = source.next_frame() => result,
            };

            match result {
                Ok(Some(frame)) => {
                    captured += 1;
                    consecutive_errors = 0;
                    trace!(frame_number = frame.frame_number, "Captured frame");
                    acquisition.push(frame);
                }
                Ok(None) => {
                    info!(frames = captured, "Frame source ended");
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    acquisition.record_error();
                    warn!("Capture error ({}/{}): {}", consecutive_errors, MAX_CONSECUTIVE_ERRORS, e);

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many capture errors, stopping capture");
                        break;
                    }

                    // 50ms, 100ms, 200ms, ... capped at 1.6s
                    let backoff = Duration::from_millis(50 * (1 << consecutive_errors.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        acquisition.set_active(false);
        info!(frames = captured, overflows = acquisition.overflow_count(), "Capture task ended");
    }
}
