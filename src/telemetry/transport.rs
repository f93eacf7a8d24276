//! Datagram transport used by the telemetry stage

use std::net::{SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tracing::{info, trace};

use crate::wire::PACKET_SIZE;
use crate::{Result, SensorError};

/// Sends encoded telemetry packets
///
/// Implementations send exactly one datagram per call and never retry.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one encoded packet to `destination`
    async fn send(&self, packet: &[u8; PACKET_SIZE], destination: SocketAddrV4) -> Result<()>;
}

#[async_trait::async_trait]
impl Transport for Box<dyn Transport> {
    async fn send(&self, packet: &[u8; PACKET_SIZE], destination: SocketAddrV4) -> Result<()> {
        (**self).send(packet, destination).await
    }
}

/// UDP transport over a socket bound once at startup
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind the sending socket with broadcast enabled.
    pub async fn bind(local: SocketAddrV4) -> Result<Self> {
        let socket = UdpSocket::bind(local).await.map_err(|e| {
            SensorError::startup_with_source("telemetry", format!("cannot bind UDP socket on {local}"), Box::new(e))
        })?;
        socket.set_broadcast(true).map_err(|e| {
            SensorError::startup_with_source("telemetry", "cannot enable broadcast", Box::new(e))
        })?;

        info!(local = %socket.local_addr()?, "Telemetry socket bound");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    async fn send(&self, packet: &[u8; PACKET_SIZE], destination: SocketAddrV4) -> Result<()> {
        let sent = self
            .socket
            .send_to(packet, destination)
            .await
            .map_err(|e| SensorError::transport(destination, e))?;

        if sent != PACKET_SIZE {
            return Err(SensorError::transport(
                destination,
                std::io::Error::other(format!("short datagram: {sent} of {PACKET_SIZE} bytes")),
            ));
        }

        trace!(%destination, "Datagram sent");
        Ok(())
    }
}
