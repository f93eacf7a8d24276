//! Feature extraction stage
//!
//! Consumes audio frames, accumulates them into fixed-size analysis windows
//! and turns each completed window into a [`TelemetryRecord`].
//!
//! ## Record assembly
//!
//! | field | source |
//! |---|---|
//! | `seq_number` | stage counter, wraps 65535 to 0 |
//! | `timestamp_ms` | first frame of the window |
//! | `status_flags` | low byte of the OR-ed frame flags |
//! | `error_count` | cumulative stage errors, saturating |
//! | `uptime_sec` | whole seconds since pipeline boot |
//! | features | [`crate::features`] over the window's samples |

mod window;

pub use window::AnalysisWindow;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::features::{self, SplCalibration, SpectralConfig};
use crate::queue::{QueueReceiver, QueueSender, Received};
use crate::types::{AudioFrame, DEFAULT_FRAMES_PER_PACKET, StatusFlags};
use crate::wire::{BAND_COUNT, PROTOCOL_VERSION, TelemetryRecord};

/// Default depth of the record queue towards telemetry.
pub const RECORD_QUEUE_DEPTH: usize = 2;

/// Default bounded wait for the next frame.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Parameters of the extraction stage
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub node_id: u8,
    pub frames_per_packet: usize,
    pub recv_timeout: Duration,
    pub spectral: SpectralConfig,
    pub spl: SplCalibration,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            node_id: 1,
            frames_per_packet: DEFAULT_FRAMES_PER_PACKET,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            spectral: SpectralConfig::default(),
            spl: SplCalibration::default(),
        }
    }
}

/// Snapshot of the stage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractionStats {
    pub packet_count: u32,
    pub error_count: u32,
    pub rejected_frames: u32,
    pub is_running: bool,
}

#[derive(Debug, Default)]
struct Counters {
    packets: AtomicU32,
    errors: AtomicU32,
    rejected: AtomicU32,
    running: AtomicBool,
}

/// Read-only view of a running extraction stage
#[derive(Debug, Clone)]
pub struct ExtractionHandle {
    counters: Arc<Counters>,
}

impl ExtractionHandle {
    /// Records handed to the telemetry queue
    pub fn packet_count(&self) -> u32 {
        self.counters.packets.load(Ordering::Relaxed)
    }

    /// Records lost to a full queue
    pub fn error_count(&self) -> u32 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    /// Frames that did not fit the current window
    pub fn rejected_frames(&self) -> u32 {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.counters.running.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ExtractionStats {
        ExtractionStats {
            packet_count: self.packet_count(),
            error_count: self.error_count(),
            rejected_frames: self.rejected_frames(),
            is_running: self.is_running(),
        }
    }
}

/// Window accumulator and record builder owned by the extraction task
#[derive(Debug)]
pub struct FeatureExtractor {
    settings: ExtractionSettings,
    window: AnalysisWindow,
    next_seq: u16,
    boot: Instant,
    counters: Arc<Counters>,
}

impl FeatureExtractor {
    /// Create an idle extractor. `boot` is the reference for `uptime_sec`.
    pub fn new(settings: ExtractionSettings, boot: Instant) -> Self {
        let window = AnalysisWindow::for_frames(settings.frames_per_packet);
        Self { settings, window, next_seq: 0, boot, counters: Arc::new(Counters::default()) }
    }

    pub fn handle(&self) -> ExtractionHandle {
        ExtractionHandle { counters: Arc::clone(&self.counters) }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Add a frame to the current window. Returns the finished record when
    /// the window reaches its target size; the window is then empty again.
    pub fn process_frame(&mut self, frame: &AudioFrame) -> Option<TelemetryRecord> {
        if !self.window.append(frame) {
            let rejected = self.counters.rejected.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(frame_number = frame.frame_number, rejected, "Frame does not fit analysis window");
        } else {
            trace!(frame_number = frame.frame_number, samples = self.window.len(), "Frame accumulated");
        }

        if !self.window.is_complete() {
            return None;
        }

        let record = self.build_record();
        self.window.reset();
        Some(record)
    }

    fn build_record(&mut self) -> TelemetryRecord {
        let samples = self.window.samples();
        let seq_number = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let rms_raw = features::rms(samples);
        let fft_band = features::spectral_bands::<BAND_COUNT>(samples, &self.settings.spectral)
            .unwrap_or_else(|e| {
                warn!("Spectral estimate failed, sending zero bands: {}", e);
                [0; BAND_COUNT]
            });

        let errors = self.counters.errors.load(Ordering::Relaxed);
        let uptime = self.boot.elapsed().as_secs();

        TelemetryRecord {
            version: PROTOCOL_VERSION,
            seq_number,
            timestamp_ms: self.window.start_timestamp_ms(),
            rms_raw,
            zcr_count: u16::try_from(samples.len() / 2).unwrap_or(u16::MAX),
            zcr_rate: features::zero_crossing_rate(samples),
            spl_db: features::spl(rms_raw, &self.settings.spl),
            peak_amplitude: features::peak_amplitude(samples),
            fft_band,
            node_id: self.settings.node_id,
            status_flags: StatusFlags::from_window_mask(self.window.flags()).value(),
            error_count: u16::try_from(errors).unwrap_or(u16::MAX),
            uptime_sec: u32::try_from(uptime).unwrap_or(u32::MAX),
            ..TelemetryRecord::default()
        }
    }

    /// Hand a finished record to telemetry without waiting.
    fn forward(&self, record: TelemetryRecord, records: &QueueSender<TelemetryRecord>) {
        if records.push(record) {
            self.counters.packets.fetch_add(1, Ordering::Relaxed);
            debug!(seq = record.seq_number, rms = record.rms_raw, spl = record.spl_db, "Record queued");
        } else {
            let errors = self.counters.errors.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(seq = record.seq_number, errors, "Record queue full, record dropped");
        }
    }

    /// Spawn the extraction task. It runs until cancellation or until the
    /// frame queue closes.
    pub fn spawn(
        self,
        frames: QueueReceiver<AudioFrame>,
        records: QueueSender<TelemetryRecord>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        self.counters.running.store(true, Ordering::Relaxed);
        tokio::spawn(async move {
            self.extraction_task(frames, records, cancel).await;
        })
    }

    async fn extraction_task(
        mut self,
        mut frames: QueueReceiver<AudioFrame>,
        records: QueueSender<TelemetryRecord>,
        cancel: CancellationToken,
    ) {
        info!(
            node_id = self.settings.node_id,
            window_samples = self.window.capacity(),
            "Feature extraction started"
        );

        loop {
            match frames.recv_timeout(self.settings.recv_timeout, &cancel).await {
                Received::Item(frame) => {
                    if let Some(record) = self.process_frame(&frame) {
                        self.forward(record, &records);
                    }
                }
                Received::Timeout => trace!("No frame within receive window"),
                Received::Closed => {
                    info!("Frame queue closed");
                    break;
                }
                Received::Cancelled => {
                    info!("Feature extraction cancelled");
                    break;
                }
            }
        }

        self.counters.running.store(false, Ordering::Relaxed);
        let stats = self.handle().stats();
        info!(packets = stats.packet_count, errors = stats.error_count, "Feature extraction ended");
    }
}
