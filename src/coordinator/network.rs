//! Network readiness collaborator

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{Result, SensorError};

/// Reports the node's IPv4 address once the network stack has one
#[async_trait::async_trait]
pub trait NetworkLink: Send + Sync + 'static {
    /// Current address, `None` (or 0.0.0.0) while unassigned
    async fn ipv4_address(&self) -> Option<Ipv4Addr>;
}

#[async_trait::async_trait]
impl NetworkLink for Box<dyn NetworkLink> {
    async fn ipv4_address(&self) -> Option<Ipv4Addr> {
        (**self).ipv4_address().await
    }
}

/// Link that is always up with a fixed address, for host builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticLink {
    address: Ipv4Addr,
}

impl StaticLink {
    pub fn new(address: Ipv4Addr) -> Self {
        Self { address }
    }
}

impl Default for StaticLink {
    fn default() -> Self {
        Self::new(Ipv4Addr::LOCALHOST)
    }
}

#[async_trait::async_trait]
impl NetworkLink for StaticLink {
    async fn ipv4_address(&self) -> Option<Ipv4Addr> {
        Some(self.address)
    }
}

/// Poll `link` every `poll_interval` until it reports a usable address.
///
/// Fails with [`SensorError::NetworkTimeout`] once `timeout` has elapsed, or
/// with a startup error if `cancel` fires first.
pub async fn wait_for_network<L>(
    link: &L,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<Ipv4Addr>
where
    L: NetworkLink + ?Sized,
{
    let poll_interval = poll_interval.max(Duration::from_millis(1));
    let started = Instant::now();
    let mut last_report = 0u64;

    loop {
        if let Some(address) = link.ipv4_address().await.filter(|a| !a.is_unspecified()) {
            info!(%address, waited_ms = started.elapsed().as_millis() as u64, "Network ready");
            return Ok(address);
        }

        let waited = started.elapsed();
        if waited >= timeout {
            return Err(SensorError::NetworkTimeout { waited });
        }

        let seconds = waited.as_secs();
        if seconds > last_report {
            last_report = seconds;
            debug!(seconds, "Waiting for IP assignment");
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(SensorError::startup("network", "cancelled while waiting for an address"));
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}
