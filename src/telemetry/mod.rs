//! Telemetry stage
//!
//! Takes finished records off the record queue, stamps them with the
//! transmit sequence number, sends each one as a single 64-byte datagram and
//! keeps the most recent ones for dashboard queries.
//!
//! A failed send is counted and logged. There is no retry and the socket is
//! never recreated; the next record simply tries again.

mod cache;
mod transport;

pub use cache::{PACKET_CACHE_CAPACITY, PacketCache};
pub use transport::{Transport, UdpTransport};

use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::queue::{QueueReceiver, Received};
use crate::stream::ThrottleExt;
use crate::types::UpdateRate;
use crate::wire::TelemetryRecord;
use crate::{Result, SensorError};

/// UDP port used for both transmission and reception.
pub const DEFAULT_TELEMETRY_PORT: u16 = 5000;

/// Default bounded wait for the next record.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Where the next datagram goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Destination {
    /// Unicast receiver, used when broadcast is off
    pub address: Ipv4Addr,
    pub port: u16,
    /// Send to 255.255.255.255 instead of `address`
    pub broadcast: bool,
}

impl Default for Destination {
    fn default() -> Self {
        Self { address: Ipv4Addr::BROADCAST, port: DEFAULT_TELEMETRY_PORT, broadcast: true }
    }
}

impl Destination {
    pub fn socket_addr(&self) -> SocketAddrV4 {
        let ip = if self.broadcast { Ipv4Addr::BROADCAST } else { self.address };
        SocketAddrV4::new(ip, self.port)
    }
}

/// Parameters of the telemetry stage
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySettings {
    pub recv_timeout: Duration,
    pub destination: Destination,
    pub cache_capacity: usize,
    /// Expected records per second, used to normalize subscription rates
    pub record_rate_hz: f64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            destination: Destination::default(),
            cache_capacity: PACKET_CACHE_CAPACITY,
            record_rate_hz: 16_000.0 / 2048.0,
        }
    }
}

#[derive(Debug)]
struct Shared {
    cache: Mutex<PacketCache>,
    destination: watch::Sender<Destination>,
    records: watch::Sender<Option<TelemetryRecord>>,
    tx_count: AtomicU32,
    errors: AtomicU32,
    ready: AtomicBool,
    record_rate_hz: f64,
}

impl Shared {
    fn cache(&self) -> MutexGuard<'_, PacketCache> {
        // A panicked writer leaves a consistent ring behind
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Query and control surface of the telemetry stage
///
/// Cheap to clone; safe to use from any task while the stage runs.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    shared: Arc<Shared>,
}

impl TelemetryHandle {
    /// Most recently cached record, without removing it
    pub fn get_last_packet(&self) -> Option<TelemetryRecord> {
        self.shared.cache().get_last_packet()
    }

    /// The cache's single "most recent" slot. Always equal to
    /// [`TelemetryHandle::get_last_packet`]; readable without walking the ring.
    pub fn latest_packet(&self) -> Option<TelemetryRecord> {
        self.shared.cache().latest()
    }

    /// Cached records, oldest first
    pub fn recent_packets(&self) -> Vec<TelemetryRecord> {
        self.shared.cache().recent()
    }

    /// Datagrams sent successfully
    pub fn tx_count(&self) -> u32 {
        self.shared.tx_count.load(Ordering::Relaxed)
    }

    /// Failed sends
    pub fn error_count(&self) -> u32 {
        self.shared.errors.load(Ordering::Relaxed)
    }

    /// True while the stage is running with a bound transport
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Relaxed)
    }

    pub fn destination(&self) -> Destination {
        *self.shared.destination.borrow()
    }

    /// Set the unicast receiver. Applies from the next transmission.
    pub fn set_receiver(&self, address: Ipv4Addr, port: u16) -> Result<()> {
        if address.is_unspecified() {
            return Err(SensorError::config("receiver address 0.0.0.0 is not routable"));
        }
        self.shared.destination.send_modify(|dest| {
            dest.address = address;
            dest.port = port;
        });
        info!(%address, port, "Telemetry receiver updated");
        Ok(())
    }

    /// Toggle broadcast. Applies from the next transmission.
    pub fn set_broadcast(&self, enabled: bool) {
        self.shared.destination.send_modify(|dest| dest.broadcast = enabled);
        info!(broadcast = enabled, "Telemetry broadcast updated");
    }

    /// Stream of records as they are cached, from now on.
    ///
    /// Slow subscribers skip to the newest record. A throttled rate keeps the
    /// latest record of each interval.
    pub fn subscribe(&self, rate: UpdateRate) -> BoxStream<'static, TelemetryRecord> {
        let records = WatchStream::from_changes(self.shared.records.subscribe())
            .filter_map(|record| async move { record });

        match rate.throttle_interval(self.shared.record_rate_hz) {
            None => records.boxed(),
            Some(interval) => records.throttle(interval).boxed(),
        }
    }
}

/// Transmitter task state
pub struct TelemetryStage<T> {
    transport: T,
    recv_timeout: Duration,
    next_seq: u16,
    shared: Arc<Shared>,
}

impl<T: Transport> TelemetryStage<T> {
    /// Create the stage around an already bound transport.
    pub fn new(transport: T, settings: TelemetrySettings) -> Self {
        let (destination, _) = watch::channel(settings.destination);
        let (records, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            cache: Mutex::new(PacketCache::new(settings.cache_capacity)),
            destination,
            records,
            tx_count: AtomicU32::new(0),
            errors: AtomicU32::new(0),
            ready: AtomicBool::new(false),
            record_rate_hz: settings.record_rate_hz,
        });

        Self { transport, recv_timeout: settings.recv_timeout, next_seq: 0, shared }
    }

    pub fn handle(&self) -> TelemetryHandle {
        TelemetryHandle { shared: Arc::clone(&self.shared) }
    }

    /// Stamp, send and cache one record.
    pub async fn transmit(&mut self, mut record: TelemetryRecord) {
        record.seq_number = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let destination = self.shared.destination.borrow().socket_addr();
        let packet = record.encode();

        match self.transport.send(&packet, destination).await {
            Ok(()) => {
                let sent = self.shared.tx_count.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(seq = record.seq_number, %destination, sent, "Telemetry packet sent");
            }
            Err(e) => {
                let errors = self.shared.errors.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(seq = record.seq_number, errors, "Telemetry send failed: {}", e);
            }
        }

        self.shared.cache().store(record);
        self.shared.records.send_replace(Some(record));
    }

    /// Spawn the transmitter task. It runs until cancellation or until the
    /// record queue closes.
    pub fn spawn(self, records: QueueReceiver<TelemetryRecord>, cancel: CancellationToken) -> JoinHandle<()> {
        self.shared.ready.store(true, Ordering::Relaxed);
        tokio::spawn(async move {
            self.telemetry_task(records, cancel).await;
        })
    }

    async fn telemetry_task(mut self, mut records: QueueReceiver<TelemetryRecord>, cancel: CancellationToken) {
        info!(destination = %self.shared.destination.borrow().socket_addr(), "Telemetry started");

        loop {
            match records.recv_timeout(self.recv_timeout, &cancel).await {
                Received::Item(record) => self.transmit(record).await,
                Received::Timeout => trace!("No record within receive window"),
                Received::Closed => {
                    info!("Record queue closed");
                    break;
                }
                Received::Cancelled => {
                    info!("Telemetry cancelled");
                    break;
                }
            }
        }

        self.shared.ready.store(false, Ordering::Relaxed);
        info!(
            sent = self.shared.tx_count.load(Ordering::Relaxed),
            errors = self.shared.errors.load(Ordering::Relaxed),
            "Telemetry ended"
        );
    }
}
