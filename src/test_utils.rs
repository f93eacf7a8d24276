//! Test utilities: signal generators and scripted collaborators
//!
//! Shared by unit tests, the end-to-end pipeline tests and the benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::coordinator::NetworkLink;
use crate::source::FrameSource;
use crate::telemetry::Transport;
use crate::types::{AudioFrame, FRAME_SIZE, SAMPLE_RATE, frame_period};
use crate::wire::PACKET_SIZE;
use crate::{Result, SensorError};

/// `len` zero samples.
pub fn silence(len: usize) -> Vec<i16> {
    vec![0; len]
}

/// Square wave flipping sign every sample, starting positive.
pub fn alternating(len: usize, amplitude: i16) -> Vec<i16> {
    (0..len).map(|i| if i % 2 == 0 { amplitude } else { -amplitude }).collect()
}

/// Sine tone sampled at [`SAMPLE_RATE`].
pub fn tone(len: usize, frequency_hz: f64, amplitude: f64) -> Vec<i16> {
    let sample_rate = f64::from(SAMPLE_RATE);
    (0..len)
        .map(|n| (amplitude * (2.0 * PI * frequency_hz * n as f64 / sample_rate).sin()) as i16)
        .collect()
}

/// Cut samples into consecutive frames, one frame period apart.
pub fn frames_from(samples: &[i16], start_timestamp_ms: u32) -> Vec<AudioFrame> {
    let period_ms = frame_period(SAMPLE_RATE).as_millis() as u32;
    samples
        .chunks(FRAME_SIZE)
        .enumerate()
        .map(|(n, chunk)| {
            let n = n as u32;
            AudioFrame::from_slice(chunk, start_timestamp_ms + n * period_ms, n)
        })
        .collect()
}

#[derive(Debug)]
enum Step {
    Frame(AudioFrame),
    Error,
}

#[derive(Debug, Clone, Copy)]
enum Tail {
    End,
    Fail,
    Pending,
}

/// Frame source replaying a fixed script of frames and failures
#[derive(Debug)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    tail: Tail,
}

impl ScriptedSource {
    /// Script that ends once exhausted
    pub fn empty() -> Self {
        Self { steps: VecDeque::new(), tail: Tail::End }
    }

    pub fn frames(frames: impl IntoIterator<Item = AudioFrame>) -> Self {
        Self { steps: frames.into_iter().map(Step::Frame).collect(), tail: Tail::End }
    }

    /// Fails on every call
    pub fn failing_forever() -> Self {
        Self { steps: VecDeque::new(), tail: Tail::Fail }
    }

    /// Never yields
    pub fn pending() -> Self {
        Self { steps: VecDeque::new(), tail: Tail::Pending }
    }

    /// Replay `frames`, then block like an idle microphone.
    pub fn frames_then_idle(frames: impl IntoIterator<Item = AudioFrame>) -> Self {
        Self { tail: Tail::Pending, ..Self::frames(frames) }
    }

    pub fn push_frame(&mut self, frame: AudioFrame) {
        self.steps.push_back(Step::Frame(frame));
    }

    pub fn push_error(&mut self) {
        self.steps.push_back(Step::Error);
    }
}

fn scripted_failure() -> SensorError {
    SensorError::Io(std::io::Error::other("scripted capture failure"))
}

#[async_trait::async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
        // Let consumers run between frames, like a real capture interrupt
        tokio::task::yield_now().await;
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Error) => Err(scripted_failure()),
            None => match self.tail {
                Tail::End => Ok(None),
                Tail::Fail => Err(scripted_failure()),
                Tail::Pending => std::future::pending().await,
            },
        }
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Transport recording every datagram instead of sending it
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<([u8; PACKET_SIZE], SocketAddrV4)>>>,
    attempts: Arc<AtomicU32>,
    failing: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successfully sent datagrams with their destinations
    pub fn sent(&self) -> Vec<([u8; PACKET_SIZE], SocketAddrV4)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Send calls, including failed ones
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, packet: &[u8; PACKET_SIZE], destination: SocketAddrV4) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SensorError::transport(destination, std::io::Error::other("mock send failure")));
        }
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push((*packet, destination));
        Ok(())
    }
}

/// Network link that obtains an address after a number of polls
#[derive(Debug)]
pub struct ScriptedLink {
    ready_after: Option<u32>,
    polls: AtomicU32,
    address: Ipv4Addr,
}

impl ScriptedLink {
    /// Ready on the `polls`-th query
    pub fn ready_after(polls: u32) -> Self {
        Self { ready_after: Some(polls), polls: AtomicU32::new(0), address: Ipv4Addr::new(10, 0, 0, 42) }
    }

    /// Never obtains an address
    pub fn never() -> Self {
        Self { ready_after: None, polls: AtomicU32::new(0), address: Ipv4Addr::UNSPECIFIED }
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NetworkLink for ScriptedLink {
    async fn ipv4_address(&self) -> Option<Ipv4Addr> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.ready_after {
            Some(needed) if polls >= needed => Some(self.address),
            _ => None,
        }
    }
}
