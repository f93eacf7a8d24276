//! Host build of the acoustic node.
//!
//! ```text
//! acoustic-node [CONFIG.yaml]
//! ```
//!
//! Runs the pipeline on the synthetic microphone until Ctrl-C.

use acoustic_node::{NodeConfig, PipelineCoordinator, SensorError, StaticLink, SyntheticSource, logging};
use anyhow::Context;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(logging::DEFAULT_DIRECTIVE);

    if let Err(e) = run().await {
        error!("{:#}", e);
        if let Some(sensor) = e.downcast_ref::<SensorError>() {
            for suggestion in sensor.recovery_suggestions() {
                error!("  - {}", suggestion);
            }
        }
        return Err(e);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => NodeConfig::load(&path).with_context(|| format!("loading {}", path.to_string_lossy()))?,
        None => {
            info!("No config file given, using defaults");
            NodeConfig::default()
        }
    };

    let source = SyntheticSource::new(config.source.clone()).context("creating synthetic microphone")?;
    let pipeline = PipelineCoordinator::new(config)
        .with_link(StaticLink::default())
        .with_source(source)
        .start()
        .await
        .context("starting pipeline")?;

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;

    let stats = pipeline.shutdown().await;
    info!(
        frames = stats.frames_captured,
        overflows = stats.frame_overflows,
        capture_errors = stats.capture_errors,
        built = stats.packets_built,
        extraction_errors = stats.extraction_errors,
        sent = stats.packets_sent,
        send_errors = stats.send_errors,
        "Final counters"
    );
    Ok(())
}
