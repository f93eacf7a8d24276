//! Acoustic sensor node pipeline.
//!
//! Continuously samples a microphone, summarizes each analysis window as a
//! handful of acoustic features and broadcasts the summary as a fixed-size
//! 64-byte UDP datagram for a monitoring dashboard.
//!
//! # Pipeline
//!
//! ```text
//! FrameSource -> acquisition -> [frame queue] -> extraction -> [record queue] -> telemetry -> UDP
//!                                                                                  |
//!                                                                             PacketCache
//! ```
//!
//! - **Acquisition**: non-blocking push of 512-sample frames; a full queue
//!   drops the frame and counts an overflow
//! - **Extraction**: accumulates windows and computes RMS, zero-crossing
//!   rate, peak, SPL and eight spectral band magnitudes
//! - **Telemetry**: stamps the transmit sequence number, sends one datagram
//!   per record and caches recent records for queries
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use acoustic_node::{AcousticNode, NodeConfig, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> acoustic_node::Result<()> {
//!     let pipeline = AcousticNode::launch(NodeConfig::default()).await?;
//!     let mut records = pipeline.telemetry().subscribe(UpdateRate::MaxMilliHz(1_000));
//!
//!     while let Some(record) = records.next().await {
//!         println!("seq {} spl {} dB", record.seq_number, record.spl_db);
//!     }
//!     pipeline.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
pub mod features;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
pub mod wire;

// Pipeline stages
pub mod acquisition;
pub mod capture;
pub mod extraction;
pub mod queue;
pub mod source;
pub mod sources;
pub mod stream;
pub mod telemetry;

// Startup and ambient concerns
pub mod config;
pub mod coordinator;
pub mod logging;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use acquisition::AcquisitionHandle;
pub use config::NodeConfig;
pub use coordinator::{NetworkLink, Pipeline, PipelineCoordinator, PipelineStats, StaticLink};
pub use extraction::{ExtractionHandle, ExtractionStats, FeatureExtractor};
pub use source::FrameSource;
pub use sources::{SyntheticConfig, SyntheticSource};
pub use telemetry::{Destination, PacketCache, TelemetryHandle, TelemetryStage, Transport, UdpTransport};
pub use wire::TelemetryRecord;

/// Unified entry point for a host-built node.
///
/// Wires a [`SyntheticSource`] from the config, a [`StaticLink`] on
/// localhost and a UDP transport bound to `bind_address`.
///
/// ```rust,no_run
/// use acoustic_node::{AcousticNode, NodeConfig};
///
/// #[tokio::main]
/// async fn main() -> acoustic_node::Result<()> {
///     let config = NodeConfig::load("node.yaml")?;
///     let pipeline = AcousticNode::launch(config).await?;
///     tokio::signal::ctrl_c().await?;
///     pipeline.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct AcousticNode;

impl AcousticNode {
    /// Start the full pipeline with the synthetic microphone.
    pub async fn launch(config: NodeConfig) -> Result<Pipeline> {
        let source = SyntheticSource::new(config.source.clone())?;
        PipelineCoordinator::new(config).with_source(source).start().await
    }

    /// Coordinator for custom links, transports or sources.
    pub fn builder(config: NodeConfig) -> PipelineCoordinator {
        PipelineCoordinator::new(config)
    }
}
