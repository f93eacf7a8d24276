//! Error types for the acoustic sensor pipeline.
//!
//! All errors implement `std::error::Error` and carry enough structured
//! context to tell a fatal startup problem apart from a transient failure
//! that a stage absorbs locally.
//!
//! ## Error Categories
//!
//! - **Startup Errors**: a stage, queue or socket could not be brought up
//! - **Network Errors**: the network link never became ready
//! - **Transport Errors**: a UDP datagram could not be sent
//! - **Computation Errors**: the spectral estimator rejected its configuration
//! - **Protocol Errors**: a wire packet is malformed or carries illegal values
//! - **Config Errors**: node configuration failed to load or validate
//!
//! ## Fatal vs. absorbed
//!
//! Only errors that keep the pipeline from ever reaching a running state are
//! fatal. Everything else is counted by the stage that saw it:
//!
//! ```rust
//! use acoustic_node::SensorError;
//!
//! let error = SensorError::startup("telemetry", "socket bind refused");
//! assert!(error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T, E = SensorError> = std::result::Result<T, E>;

/// Main error type for the sensor pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SensorError {
    #[error("Failed to start {stage} stage: {reason}")]
    Startup {
        stage: &'static str,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Network not ready after {waited:?}")]
    NetworkTimeout { waited: Duration },

    #[error("Telemetry send to {destination} failed")]
    Transport {
        destination: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },

    #[error("Feature computation failed: {details}")]
    Computation { details: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Protocol version mismatch: expected {expected}, found {found}")]
    Protocol { expected: u8, found: u8 },

    #[error("Field '{field}' out of range: {value} (max {max})")]
    FieldRange { field: &'static str, value: u64, max: u64 },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Config file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl SensorError {
    /// Returns whether this error prevents the pipeline from running.
    pub fn is_fatal(&self) -> bool {
        match self {
            SensorError::Startup { .. } => true,
            SensorError::NetworkTimeout { .. } => true,
            SensorError::Config { .. } => true,
            SensorError::ConfigFile { .. } => true,
            SensorError::Transport { .. } => false,
            SensorError::Computation { .. } => false,
            SensorError::Parse { .. } => false,
            SensorError::Protocol { .. } => false,
            SensorError::FieldRange { .. } => false,
            SensorError::Io(_) => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SensorError::Startup { .. } => vec![
                "Check the stage configuration values",
                "Verify the telemetry bind address is available",
                "Restart the node",
            ],
            SensorError::NetworkTimeout { .. } => vec![
                "Check the network cable or Wi-Fi credentials",
                "Verify the DHCP server is reachable",
                "Increase network_wait_timeout_ms",
            ],
            SensorError::Transport { .. } => vec![
                "Check the receiver address and port",
                "Verify broadcast is permitted on this segment",
            ],
            SensorError::Computation { .. } => vec![
                "Check sample_rate and fft_size in the spectral config",
                "Ensure each band spans at least one frequency bin",
            ],
            SensorError::Parse { .. } => vec![
                "Verify the datagram is exactly 64 bytes",
                "Check the sender speaks this telemetry protocol",
            ],
            SensorError::Protocol { .. } => vec![
                "Update the receiver to the sender's protocol version",
                "Check for mixed firmware versions across nodes",
            ],
            SensorError::FieldRange { .. } => vec![
                "Check the sender's calibration",
                "Verify the packet was not corrupted in transit",
            ],
            SensorError::Config { .. } => vec![
                "Fix the reported configuration value",
                "Remove the key to fall back to its default",
            ],
            SensorError::ConfigFile { .. } => vec![
                "Check the config file exists and is readable",
                "Check file permissions",
            ],
            SensorError::Io(_) => vec!["Check system resources", "Retry the operation"],
        }
    }

    /// Helper constructor for startup failures.
    pub fn startup(stage: &'static str, reason: impl Into<String>) -> Self {
        SensorError::Startup { stage, reason: reason.into(), source: None }
    }

    /// Helper constructor for startup failures with an underlying cause.
    pub fn startup_with_source(
        stage: &'static str,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SensorError::Startup { stage, reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for transport failures.
    pub fn transport(destination: SocketAddrV4, source: std::io::Error) -> Self {
        SensorError::Transport { destination, source }
    }

    /// Helper constructor for spectral estimator failures.
    pub fn computation(details: impl Into<String>) -> Self {
        SensorError::Computation { details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        SensorError::Config { details: details.into() }
    }

    /// Helper constructor for config file errors with path context.
    pub fn config_file(path: PathBuf, source: std::io::Error) -> Self {
        SensorError::ConfigFile { path, source }
    }
}

impl From<serde_yaml_ng::Error> for SensorError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        SensorError::Config { details: format!("YAML parsing failed: {}", err) }
    }
}
