//! Pipeline startup and lifetime
//!
//! [`PipelineCoordinator::start`] brings the node up in a fixed order:
//!
//! 1. wait for the network link to report an IPv4 address
//! 2. validate the configuration
//! 3. create the frame queue (acquisition)
//! 4. start feature extraction on that queue
//! 5. bind the transport and start telemetry on the record queue
//! 6. start capture from the frame source, if one was given
//!
//! Any failure cancels whatever already runs and is returned as a fatal
//! error; the node never runs half started. Success yields a [`Pipeline`]
//! that owns every task and handle.

mod network;
#[cfg(test)]
mod tests;

pub use network::{NetworkLink, StaticLink, wait_for_network};

use std::net::Ipv4Addr;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::acquisition::AcquisitionHandle;
use crate::capture::Capture;
use crate::config::NodeConfig;
use crate::extraction::{ExtractionHandle, FeatureExtractor};
use crate::queue;
use crate::source::FrameSource;
use crate::telemetry::{TelemetryHandle, TelemetryStage, Transport, UdpTransport};
use crate::{Result, SensorError};

/// Builder for a running [`Pipeline`]
pub struct PipelineCoordinator {
    config: NodeConfig,
    link: Box<dyn NetworkLink>,
    transport: Option<Box<dyn Transport>>,
    source: Option<Box<dyn FrameSource>>,
}

impl PipelineCoordinator {
    /// Coordinator with a [`StaticLink`], a UDP transport bound at startup
    /// and no frame source.
    pub fn new(config: NodeConfig) -> Self {
        Self { config, link: Box::new(StaticLink::default()), transport: None, source: None }
    }

    pub fn with_link(mut self, link: impl NetworkLink) -> Self {
        self.link = Box::new(link);
        self
    }

    /// Use `transport` instead of binding a UDP socket.
    pub fn with_transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Capture frames from `source`. Without one, frames arrive through
    /// [`AcquisitionHandle::push`].
    pub fn with_source(mut self, source: impl FrameSource) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Bring the pipeline up.
    pub async fn start(self) -> Result<Pipeline> {
        let Self { config, link, transport, source } = self;
        let cancel = CancellationToken::new();
        let boot = Instant::now();
        info!(node_id = config.node_id, "Starting acoustic pipeline");

        let node_address =
            wait_for_network(&*link, config.network_wait_timeout(), config.network_poll_interval(), &cancel)
                .await
                .inspect_err(|e| error!("Network wait failed: {}", e))?;

        config.validate().inspect_err(|e| error!("Configuration rejected: {}", e))?;

        let (acquisition, frames) = AcquisitionHandle::start(config.frame_queue_depth)?;
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let (record_tx, record_rx) = match queue::bounded("extraction", config.record_queue_depth) {
            Ok(pair) => pair,
            Err(e) => return Err(abort_startup(e, &acquisition, &cancel, tasks).await),
        };
        let extractor = FeatureExtractor::new(config.extraction_settings(), boot);
        let extraction = extractor.handle();
        tasks.push(extractor.spawn(frames, record_tx, cancel.clone()));
        debug!("Extraction stage running");

        let transport: Box<dyn Transport> = match transport {
            Some(transport) => transport,
            None => match UdpTransport::bind(config.bind_address).await {
                Ok(udp) => Box::new(udp),
                Err(e) => return Err(abort_startup(e, &acquisition, &cancel, tasks).await),
            },
        };
        let stage = TelemetryStage::new(transport, config.telemetry_settings());
        let telemetry = stage.handle();
        tasks.push(stage.spawn(record_rx, cancel.clone()));
        debug!("Telemetry stage running");

        if let Some(source) = source {
            tasks.push(Capture::spawn(source, acquisition.clone(), cancel.clone()));
        }

        info!(
            node_id = config.node_id,
            address = %node_address,
            destination = %telemetry.destination().socket_addr(),
            "Acoustic pipeline running"
        );

        Ok(Pipeline { acquisition, extraction, telemetry, node_address, cancel, tasks })
    }
}

/// Cancel and join everything started so far, then hand back the error.
async fn abort_startup(
    error: SensorError,
    acquisition: &AcquisitionHandle,
    cancel: &CancellationToken,
    tasks: Vec<JoinHandle<()>>,
) -> SensorError {
    error!("Startup failed, stopping started stages: {}", error);
    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Stage task failed during abort: {}", e);
        }
    }
    acquisition.set_active(false);

    if error.is_fatal() { error } else { SensorError::startup_with_source("pipeline", "startup aborted", Box::new(error)) }
}

/// Counter snapshot across all stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub frames_captured: u32,
    pub frame_overflows: u32,
    pub capture_errors: u32,
    pub packets_built: u32,
    pub extraction_errors: u32,
    pub rejected_frames: u32,
    pub packets_sent: u32,
    pub send_errors: u32,
}

/// A running pipeline
///
/// Dropping it cancels every stage; [`Pipeline::shutdown`] also waits for
/// them to finish.
pub struct Pipeline {
    acquisition: AcquisitionHandle,
    extraction: ExtractionHandle,
    telemetry: TelemetryHandle,
    node_address: Ipv4Addr,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn acquisition(&self) -> &AcquisitionHandle {
        &self.acquisition
    }

    pub fn extraction(&self) -> &ExtractionHandle {
        &self.extraction
    }

    pub fn telemetry(&self) -> &TelemetryHandle {
        &self.telemetry
    }

    /// Address reported by the network link at startup
    pub fn node_address(&self) -> Ipv4Addr {
        self.node_address
    }

    /// Token cancelled when the pipeline stops
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> PipelineStats {
        let extraction = self.extraction.stats();
        PipelineStats {
            frames_captured: self.acquisition.frame_count(),
            frame_overflows: self.acquisition.overflow_count(),
            capture_errors: self.acquisition.error_count(),
            packets_built: extraction.packet_count,
            extraction_errors: extraction.error_count,
            rejected_frames: extraction.rejected_frames,
            packets_sent: self.telemetry.tx_count(),
            send_errors: self.telemetry.error_count(),
        }
    }

    /// Cancel every stage and wait for them to stop.
    pub async fn shutdown(mut self) -> PipelineStats {
        info!("Shutting down acoustic pipeline");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Stage task failed: {}", e);
            }
        }
        self.acquisition.set_active(false);

        let stats = self.stats();
        info!(sent = stats.packets_sent, built = stats.packets_built, "Acoustic pipeline stopped");
        stats
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        debug!("Dropping pipeline");
        self.cancel.cancel();
    }
}
