//! Simulation events and their ordering

use aorglu_protocol::{NodeAddr, Position, Timestamp};
use aorglu_routing::{Timer, TimerHandle};
use std::cmp::Ordering;

/// Tie-breaker for events at the same instant: lower runs first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    /// A frame arrives at `to`
    FrameArrival {
        to: NodeAddr,
        from: NodeAddr,
        frame: Vec<u8>,
    },
    /// A timer armed by `node` comes due
    TimerFire {
        node: NodeAddr,
        handle: TimerHandle,
        timer: Timer,
    },
    /// The application on `from` hands data to its routing agent
    AppSend {
        from: NodeAddr,
        to: NodeAddr,
        payload: Vec<u8>,
    },
    /// The link layer of `node` could not reach `neighbor`
    TransmitFailure { node: NodeAddr, neighbor: NodeAddr },
    /// Switch a link on or off
    SetLink {
        a: NodeAddr,
        b: NodeAddr,
        active: bool,
    },
    /// Move a node
    Relocate {
        node: NodeAddr,
        position: Option<Position>,
    },
}

#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub time: Timestamp,
    pub seq: SequenceNumber,
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(time: Timestamp, seq: SequenceNumber, event: Event) -> Self {
        Self { time, seq, event }
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for BinaryHeap: earliest time, then lowest sequence
        match other.time.cmp(&self.time) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}
