//! End-to-end pipeline tests
//!
//! Frames go in through a scripted source, datagrams come out of a mock
//! transport. Time is paused so uptime and timeouts are deterministic.

use super::*;
use crate::features::{self, SpectralConfig};
use crate::test_utils::{MockTransport, ScriptedLink, ScriptedSource, alternating, frames_from, silence};
use crate::types::{FRAME_SIZE, UpdateRate};
use crate::wire::{BAND_COUNT, PACKET_SIZE, TelemetryRecord};
use futures::StreamExt;
use std::net::SocketAddrV4;
use std::time::Duration;

const WINDOW: usize = 4 * FRAME_SIZE;

fn config(node_id: u8) -> NodeConfig {
    NodeConfig { node_id, ..NodeConfig::default() }
}

async fn wait_for_packets(transport: &MockTransport, count: usize) {
    for _ in 0..100 {
        if transport.sent().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} packets, saw {}", transport.sent().len());
}

#[tokio::test(start_paused = true)]
async fn silent_window_produces_exact_packet_bytes() -> anyhow::Result<()> {
    let transport = MockTransport::new();
    let pipeline = PipelineCoordinator::new(config(7))
        .with_transport(transport.clone())
        .with_source(ScriptedSource::frames_then_idle(frames_from(&silence(WINDOW), 1000)))
        .start()
        .await?;

    wait_for_packets(&transport, 1).await;
    let (bytes, destination) = transport.sent()[0];

    #[rustfmt::skip]
    let expected: [u8; PACKET_SIZE] = [
        0x01, 0x00,             // version, reserved
        0x00, 0x00,             // seq 0
        0xE8, 0x03, 0x00, 0x00, // timestamp 1000 ms
        0x00, 0x00,             // rms
        0x00, 0x00,             // rms reserved
        0x00, 0x04,             // zcr_count 1024
        0x00, 0x00,             // zcr rate
        0x25, 0x00,             // spl 37 dB (pressure floor)
        0x00, 0x00,             // peak
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // bands
        0x07,                   // node id
        0x00,                   // status
        0x00, 0x00,             // error count
        0x00, 0x00, 0x00, 0x00, // uptime
        0x00, 0x00, 0x00, 0x00, // reserved
    ];
    assert_eq!(bytes, expected);
    assert_eq!(destination, SocketAddrV4::new(Ipv4Addr::BROADCAST, 5000));

    let stats = pipeline.shutdown().await;
    assert_eq!(stats.frames_captured, 4);
    assert_eq!(stats.packets_built, 1);
    assert_eq!(stats.packets_sent, 1);
    assert_eq!(stats.frame_overflows, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn alternating_window_features_reach_the_wire() -> anyhow::Result<()> {
    let samples = alternating(WINDOW, 16384);
    let transport = MockTransport::new();
    let pipeline = PipelineCoordinator::new(config(2))
        .with_transport(transport.clone())
        .with_source(ScriptedSource::frames_then_idle(frames_from(&samples, 64)))
        .start()
        .await?;

    wait_for_packets(&transport, 1).await;
    let bytes = transport.sent()[0].0;

    assert_eq!(&bytes[8..10], &16383u16.to_le_bytes(), "rms");
    assert_eq!(&bytes[12..14], &1024u16.to_le_bytes(), "zcr count");
    assert_eq!(&bytes[14..16], &100u16.to_le_bytes(), "zcr rate");
    assert_eq!(&bytes[16..18], &77u16.to_le_bytes(), "spl");
    assert_eq!(&bytes[18..20], &16384u16.to_le_bytes(), "peak");

    let bands = features::spectral_bands::<BAND_COUNT>(&samples, &SpectralConfig::default())?;
    for (i, band) in bands.iter().enumerate() {
        let offset = 20 + i * 4;
        assert_eq!(&bytes[offset..offset + 4], &band.to_le_bytes(), "band {i}");
    }

    let record = TelemetryRecord::decode(&bytes)?;
    record.validate()?;
    assert_eq!((record.timestamp_ms, record.node_id), (64, 2));

    pipeline.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn alternating_window_produces_exact_packet_bytes() -> anyhow::Result<()> {
    let transport = MockTransport::new();
    let pipeline = PipelineCoordinator::new(config(2))
        .with_transport(transport.clone())
        .with_source(ScriptedSource::frames_then_idle(frames_from(&alternating(WINDOW, 16384), 64)))
        .start()
        .await?;

    wait_for_packets(&transport, 1).await;
    let bytes = transport.sent()[0].0;

    #[rustfmt::skip]
    let expected: [u8; PACKET_SIZE] = [
        0x01, 0x00,             // version, reserved
        0x00, 0x00,             // seq 0
        0x40, 0x00, 0x00, 0x00, // timestamp 64 ms
        0xFF, 0x3F,             // rms 16383
        0x00, 0x00,             // rms reserved
        0x00, 0x04,             // zcr_count 1024
        0x64, 0x00,             // zcr rate 100
        0x4D, 0x00,             // spl 77 dB
        0x00, 0x40,             // peak 16384
        0x27, 0x00, 0x00, 0x00, // band 0: 39
        0x58, 0x00, 0x00, 0x00, // band 1: 88
        0x5C, 0x00, 0x00, 0x00, // band 2: 92
        0x2C, 0x00, 0x00, 0x00, // band 3: 44
        0x49, 0x00, 0x00, 0x00, // band 4: 73
        0xB9, 0x00, 0x00, 0x00, // band 5: 185
        0x07, 0x01, 0x00, 0x00, // band 6: 263
        0xF1, 0x00, 0x00, 0x00, // band 7: 241
        0x02,                   // node id
        0x00,                   // status
        0x00, 0x00,             // error count
        0x00, 0x00, 0x00, 0x00, // uptime
        0x00, 0x00, 0x00, 0x00, // reserved
    ];
    assert_eq!(bytes, expected);

    pipeline.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn consecutive_windows_carry_consecutive_sequence_numbers() -> anyhow::Result<()> {
    let transport = MockTransport::new();
    let pipeline = PipelineCoordinator::new(config(1))
        .with_transport(transport.clone())
        .with_source(ScriptedSource::frames_then_idle(frames_from(&silence(3 * WINDOW), 0)))
        .start()
        .await?;

    wait_for_packets(&transport, 3).await;
    let records: Vec<TelemetryRecord> =
        transport.sent().iter().map(|(bytes, _)| TelemetryRecord::decode(bytes)).collect::<crate::Result<_>>()?;

    let seqs: Vec<u16> = records.iter().map(|r| r.seq_number).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    let timestamps: Vec<u32> = records.iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(timestamps, vec![0, 128, 256]);

    let telemetry = pipeline.telemetry();
    assert_eq!(telemetry.tx_count(), 3);
    assert_eq!(telemetry.get_last_packet().map(|r| r.seq_number), Some(2));
    assert_eq!(telemetry.recent_packets().len(), 3);

    pipeline.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn frames_pushed_through_acquisition_handle() -> anyhow::Result<()> {
    let transport = MockTransport::new();
    let pipeline = PipelineCoordinator::new(config(4)).with_transport(transport.clone()).start().await?;
    let mut updates = pipeline.telemetry().subscribe(UpdateRate::Native);

    for frame in frames_from(&alternating(WINDOW, 1000), 500) {
        assert!(pipeline.acquisition().push(frame));
        tokio::task::yield_now().await;
    }

    let record = tokio::time::timeout(Duration::from_secs(1), updates.next()).await?.expect("stream open");
    assert_eq!(record.node_id, 4);
    assert_eq!(record.timestamp_ms, 500);
    assert_eq!(record.peak_amplitude, 1000);
    assert!(pipeline.acquisition().is_active());

    pipeline.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failing_transport_counts_errors_but_keeps_running() -> anyhow::Result<()> {
    let transport = MockTransport::new();
    transport.set_failing(true);
    let pipeline = PipelineCoordinator::new(config(1))
        .with_transport(transport.clone())
        .with_source(ScriptedSource::frames_then_idle(frames_from(&silence(2 * WINDOW), 0)))
        .start()
        .await?;

    tokio::time::sleep(Duration::from_secs(1)).await;

    let telemetry = pipeline.telemetry();
    assert_eq!(transport.attempts(), 2);
    assert_eq!(telemetry.error_count(), 2);
    assert_eq!(telemetry.tx_count(), 0);
    assert!(telemetry.is_ready());
    assert_eq!(telemetry.get_last_packet().map(|r| r.seq_number), Some(1));

    pipeline.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn network_timeout_is_fatal() {
    let transport = MockTransport::new();
    let started = Instant::now();

    let result = PipelineCoordinator::new(config(1))
        .with_link(ScriptedLink::never())
        .with_transport(transport.clone())
        .start()
        .await;

    let error = match result {
        Ok(_) => panic!("pipeline started without a network"),
        Err(e) => e,
    };
    assert!(matches!(error, SensorError::NetworkTimeout { .. }));
    assert!(error.is_fatal());
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(transport.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn late_network_delays_startup() -> anyhow::Result<()> {
    let pipeline = PipelineCoordinator::new(config(1))
        .with_link(ScriptedLink::ready_after(11))
        .with_transport(MockTransport::new())
        .start()
        .await?;

    assert_eq!(pipeline.node_address(), Ipv4Addr::new(10, 0, 0, 42));
    assert!(pipeline.telemetry().is_ready());
    pipeline.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn invalid_config_fails_before_any_stage_starts() {
    let config = NodeConfig { frames_per_packet: 0, ..NodeConfig::default() };
    let result = PipelineCoordinator::new(config).with_transport(MockTransport::new()).start().await;
    assert!(matches!(result, Err(SensorError::Config { .. })));
}

#[tokio::test]
async fn bind_failure_aborts_startup() -> anyhow::Result<()> {
    let taken = tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let bind_address = match taken.local_addr()? {
        std::net::SocketAddr::V4(addr) => addr,
        std::net::SocketAddr::V6(_) => anyhow::bail!("expected an IPv4 socket"),
    };

    let config = NodeConfig { bind_address, ..NodeConfig::default() };
    let result = PipelineCoordinator::new(config).start().await;

    let error = match result {
        Ok(_) => anyhow::bail!("bind should have failed"),
        Err(e) => e,
    };
    anyhow::ensure!(matches!(error, SensorError::Startup { stage: "telemetry", .. }), "got {error:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_stage() -> anyhow::Result<()> {
    let pipeline = PipelineCoordinator::new(config(1))
        .with_transport(MockTransport::new())
        .with_source(ScriptedSource::pending())
        .start()
        .await?;

    let extraction = pipeline.extraction().clone();
    let telemetry = pipeline.telemetry().clone();
    let acquisition = pipeline.acquisition().clone();
    let token = pipeline.cancellation_token();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(extraction.is_running() && telemetry.is_ready() && acquisition.is_active());

    pipeline.shutdown().await;
    assert!(token.is_cancelled());
    assert!(!extraction.is_running());
    assert!(!telemetry.is_ready());
    assert!(!acquisition.is_active());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dropping_pipeline_cancels_stages() -> anyhow::Result<()> {
    let pipeline =
        PipelineCoordinator::new(config(1)).with_transport(MockTransport::new()).start().await?;
    let telemetry = pipeline.telemetry().clone();
    let token = pipeline.cancellation_token();

    drop(pipeline);
    assert!(token.is_cancelled());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!telemetry.is_ready());
    Ok(())
}
