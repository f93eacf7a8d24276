//! How often a dashboard subscription sees new records

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery rate of a [`subscribe`](crate::TelemetryHandle::subscribe) stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every record as it is cached
    Native,

    /// At most this many records per 1000 s (millihertz), so sub-Hz
    /// dashboards are representable. Zero or anything at or above the record
    /// rate means [`UpdateRate::Native`].
    MaxMilliHz(u32),
}

impl UpdateRate {
    /// Collapse rates that cannot throttle a `record_rate_hz` stream to Native.
    pub fn normalize(self, record_rate_hz: f64) -> Self {
        match self {
            UpdateRate::MaxMilliHz(mhz) if mhz > 0 && f64::from(mhz) / 1000.0 < record_rate_hz => self,
            _ => UpdateRate::Native,
        }
    }

    pub fn needs_throttle(self, record_rate_hz: f64) -> bool {
        self.throttle_interval(record_rate_hz).is_some()
    }

    /// Minimum spacing between delivered records, if any.
    pub fn throttle_interval(self, record_rate_hz: f64) -> Option<Duration> {
        match self.normalize(record_rate_hz) {
            UpdateRate::Native => None,
            UpdateRate::MaxMilliHz(mhz) => Some(Duration::from_secs_f64(1000.0 / f64::from(mhz))),
        }
    }
}
