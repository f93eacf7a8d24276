//! Fixed-size telemetry wire protocol
//!
//! Every completed analysis window becomes one 64-byte UDP datagram. The
//! encoding is explicit and little-endian so any receiver can decode it
//! without sharing this crate's in-memory layout.

pub mod format;

pub use format::{BAND_COUNT, PACKET_SIZE, PROTOCOL_VERSION, TelemetryRecord};
