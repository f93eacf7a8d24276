//! Recent-packet cache for dashboard queries

use crate::wire::TelemetryRecord;

/// Default ring capacity.
pub const PACKET_CACHE_CAPACITY: usize = 10;

/// Ring of the most recently transmitted records plus a single-slot copy of
/// the newest one.
///
/// Reads never remove entries, so any number of readers can poll it.
#[derive(Debug, Clone)]
pub struct PacketCache {
    ring: Vec<Option<TelemetryRecord>>,
    write_index: usize,
    latest: Option<TelemetryRecord>,
    total_writes: u64,
}

impl PacketCache {
    /// Cache holding `capacity` records. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self { ring: vec![None; capacity.max(1)], write_index: 0, latest: None, total_writes: 0 }
    }

    /// Store a record, overwriting the oldest once the ring is full.
    pub fn store(&mut self, record: TelemetryRecord) {
        self.ring[self.write_index] = Some(record);
        self.write_index = (self.write_index + 1) % self.ring.len();
        self.latest = Some(record);
        self.total_writes += 1;
    }

    /// The record written most recently, read from the ring at
    /// `write_index - 1`.
    pub fn get_last_packet(&self) -> Option<TelemetryRecord> {
        let capacity = self.ring.len();
        self.ring[(self.write_index + capacity - 1) % capacity]
    }

    /// The single-slot copy of the newest record
    pub fn latest(&self) -> Option<TelemetryRecord> {
        self.latest
    }

    /// Cached records from oldest to newest.
    pub fn recent(&self) -> Vec<TelemetryRecord> {
        let capacity = self.ring.len();
        (0..capacity).filter_map(|offset| self.ring[(self.write_index + offset) % capacity]).collect()
    }

    /// Records currently held
    pub fn len(&self) -> usize {
        self.ring.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Records stored since creation
    pub fn total_writes(&self) -> u64 {
        self.total_writes
    }
}

impl Default for PacketCache {
    fn default() -> Self {
        Self::new(PACKET_CACHE_CAPACITY)
    }
}
