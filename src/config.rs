//! Node configuration
//!
//! Every key is optional; omitted keys fall back to the firmware defaults.
//!
//! ```yaml
//! node_id: 3
//! frames_per_packet: 4
//! destination:
//!   address: 192.168.1.20
//!   port: 5000
//!   broadcast: false
//! spl:
//!   offset_db: 90.0
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::extraction::{ExtractionSettings, RECORD_QUEUE_DEPTH};
use crate::features::{SplCalibration, SpectralConfig};
use crate::sources::SyntheticConfig;
use crate::telemetry::{Destination, PACKET_CACHE_CAPACITY, TelemetrySettings};
use crate::types::{DEFAULT_FRAMES_PER_PACKET, FRAME_SIZE, SAMPLE_RATE};
use crate::wire::BAND_COUNT;
use crate::{Result, SensorError};

/// Complete node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Identifier carried in every packet
    pub node_id: u8,

    /// Frames per analysis window
    pub frames_per_packet: usize,

    pub frame_queue_depth: usize,
    pub record_queue_depth: usize,

    pub extraction_recv_timeout_ms: u64,
    pub telemetry_recv_timeout_ms: u64,

    /// How long startup waits for an IP address
    pub network_wait_timeout_ms: u64,
    pub network_poll_interval_ms: u64,

    pub destination: Destination,

    /// Local address of the sending socket
    pub bind_address: SocketAddrV4,

    pub cache_capacity: usize,
    pub spectral: SpectralConfig,
    pub spl: SplCalibration,

    /// Synthetic microphone used by host builds
    pub source: SyntheticConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            frames_per_packet: DEFAULT_FRAMES_PER_PACKET,
            frame_queue_depth: crate::acquisition::FRAME_QUEUE_DEPTH,
            record_queue_depth: RECORD_QUEUE_DEPTH,
            extraction_recv_timeout_ms: 100,
            telemetry_recv_timeout_ms: 500,
            network_wait_timeout_ms: 60_000,
            network_poll_interval_ms: 100,
            destination: Destination::default(),
            bind_address: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            cache_capacity: PACKET_CACHE_CAPACITY,
            spectral: SpectralConfig::default(),
            spl: SplCalibration::default(),
            source: SyntheticConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: NodeConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| SensorError::config_file(path.to_path_buf(), e))?;
        debug!(path = %path.display(), bytes = yaml.len(), "Loaded node config");
        Self::from_yaml_str(&yaml)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        // zcr_count is half the window and must fit in 16 bits
        let max_frames = (usize::from(u16::MAX) * 2) / FRAME_SIZE;
        if self.frames_per_packet == 0 || self.frames_per_packet > max_frames {
            return Err(SensorError::config(format!(
                "frames_per_packet must be 1..={}, got {}",
                max_frames, self.frames_per_packet
            )));
        }
        if self.frame_queue_depth == 0 || self.record_queue_depth == 0 {
            return Err(SensorError::config("queue depths must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(SensorError::config("cache_capacity must be at least 1"));
        }
        for (name, value) in [
            ("extraction_recv_timeout_ms", self.extraction_recv_timeout_ms),
            ("telemetry_recv_timeout_ms", self.telemetry_recv_timeout_ms),
            ("network_poll_interval_ms", self.network_poll_interval_ms),
        ] {
            if value == 0 {
                return Err(SensorError::config(format!("{name} must be non-zero")));
            }
        }
        if self.destination.port == 0 {
            return Err(SensorError::config("destination port must be non-zero"));
        }
        if !self.destination.broadcast && self.destination.address.is_unspecified() {
            return Err(SensorError::config("unicast destination needs a receiver address"));
        }
        if !(self.spl.ref_pressure > 0.0) || !self.spl.offset_db.is_finite() {
            return Err(SensorError::config("SPL calibration needs a positive reference pressure"));
        }
        self.spectral
            .validate(BAND_COUNT)
            .map_err(|e| SensorError::config(format!("spectral: {e}")))?;
        Ok(())
    }

    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            node_id: self.node_id,
            frames_per_packet: self.frames_per_packet,
            recv_timeout: Duration::from_millis(self.extraction_recv_timeout_ms),
            spectral: self.spectral,
            spl: self.spl,
        }
    }

    pub fn telemetry_settings(&self) -> TelemetrySettings {
        TelemetrySettings {
            recv_timeout: Duration::from_millis(self.telemetry_recv_timeout_ms),
            destination: self.destination,
            cache_capacity: self.cache_capacity,
            record_rate_hz: self.record_rate_hz(),
        }
    }

    /// Records produced per second at the nominal sample rate
    pub fn record_rate_hz(&self) -> f64 {
        f64::from(SAMPLE_RATE) / (self.frames_per_packet.max(1) * FRAME_SIZE) as f64
    }

    pub fn network_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.network_wait_timeout_ms)
    }

    pub fn network_poll_interval(&self) -> Duration {
        Duration::from_millis(self.network_poll_interval_ms)
    }
}
