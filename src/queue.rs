//! Bounded single-producer/single-consumer queues between pipeline stages
//!
//! Producers never wait: a push into a full queue drops the item and bumps a
//! shared counter. Consumers wait with a bounded timeout and observe the
//! pipeline cancellation token on every receive.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::{Result, SensorError};

/// Outcome of a bounded-wait receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Received<T> {
    /// An item arrived within the wait
    Item(T),
    /// The wait expired with nothing queued
    Timeout,
    /// The producer side is gone and the queue is drained
    Closed,
    /// The pipeline is shutting down
    Cancelled,
}

/// Create a queue holding at most `depth` items.
pub fn bounded<T>(stage: &'static str, depth: usize) -> Result<(QueueSender<T>, QueueReceiver<T>)> {
    if depth == 0 {
        return Err(SensorError::startup(stage, "queue depth must be at least 1"));
    }

    let (tx, rx) = mpsc::channel(depth);
    let dropped = Arc::new(AtomicU32::new(0));
    Ok((QueueSender { tx, dropped: Arc::clone(&dropped), depth }, QueueReceiver { rx, dropped }))
}

/// Producer half. Cloning shares the drop counter.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
    dropped: Arc<AtomicU32>,
    depth: usize,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), dropped: Arc::clone(&self.dropped), depth: self.depth }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue without waiting. Returns false and counts a drop when the
    /// queue is full or the consumer has gone away.
    pub fn push(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Items dropped on push so far
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Configured depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the consumer has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: mpsc::Receiver<T>,
    dropped: Arc<AtomicU32>,
}

impl<T> QueueReceiver<T> {
    /// Wait up to `timeout` for the next item, giving up early on cancellation.
    pub async fn recv_timeout(&mut self, timeout: Duration, cancel: &CancellationToken) -> Received<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Received::Cancelled,
            result = tokio::time::timeout(timeout, self.rx.recv()) => match result {
                Ok(Some(item)) => Received::Item(item),
                Ok(None) => Received::Closed,
                Err(_) => Received::Timeout,
            },
        }
    }

    /// Take an item if one is already queued
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Items the producer dropped so far
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}
