//! Collaborators the engine is driven by
//!
//! The engine never reads a global clock or owns a socket. Time, timers,
//! transmission and delivery upward are injected through the traits below.
//! [`BufferedEnv`] implements all of them by recording into buffers, which is
//! what the unit tests, the simulator and the tokio runtime use.

use crate::timer::{Timer, TimerHandle};
use aorglu_protocol::{DataPacket, NodeAddr, Packet, Timestamp};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Link-layer destination of an outgoing packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkTarget {
    /// Every one-hop neighbor
    Broadcast,
    /// A single neighbor (the next hop)
    Unicast(NodeAddr),
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkTarget::Broadcast => write!(f, "*"),
            LinkTarget::Unicast(addr) => write!(f, "{}", addr),
        }
    }
}

/// Monotonic time source
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Deferred callbacks
pub trait Scheduler {
    /// Arrange for `timer` to be handed back to the engine after `delay`
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerHandle;

    /// Cancel a timer; cancelling one that already fired is a no-op
    fn cancel(&mut self, handle: TimerHandle);
}

/// Transmission to neighbors
pub trait LinkLayer {
    fn send(&mut self, packet: Packet, target: LinkTarget);
}

/// Delivery to the layer above the routing agent
pub trait Upcall {
    /// Data addressed to this node arrived
    fn deliver(&mut self, packet: DataPacket);

    /// Discovery or repair gave up; `dropped` are the packets that were waiting
    fn destination_unreachable(&mut self, destination: NodeAddr, dropped: Vec<DataPacket>);
}

/// Everything the engine needs from its surroundings
pub trait Environment: Clock + Scheduler + LinkLayer + Upcall {}

impl<T: Clock + Scheduler + LinkLayer + Upcall> Environment for T {}

/// A packet handed to the link layer
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub packet: Packet,
    pub target: LinkTarget,
}

/// A timer handed to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub handle: TimerHandle,
    /// Absolute deadline
    pub at: Timestamp,
    pub timer: Timer,
}

/// A destination reported unreachable, with the packets that were dropped
#[derive(Debug, Clone, PartialEq)]
pub struct Unreachable {
    pub destination: NodeAddr,
    pub dropped: Vec<DataPacket>,
}

/// Environment that records every interaction
#[derive(Debug, Default)]
pub struct BufferedEnv {
    now: Timestamp,
    next_handle: u64,
    outgoing: Vec<Outgoing>,
    scheduled: Vec<ScheduledTimer>,
    cancelled: HashSet<TimerHandle>,
    delivered: Vec<DataPacket>,
    unreachable: Vec<Unreachable>,
}

impl BufferedEnv {
    /// Create an environment with the clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment with the clock at `now`
    pub fn starting_at(now: Timestamp) -> Self {
        BufferedEnv {
            now,
            ..Self::default()
        }
    }

    pub fn set_now(&mut self, now: Timestamp) {
        self.now = now;
    }

    pub fn advance(&mut self, delta: Duration) {
        self.now += delta;
    }

    /// Packets sent since the last `take_outgoing`
    pub fn outgoing(&self) -> &[Outgoing] {
        &self.outgoing
    }

    pub fn take_outgoing(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outgoing)
    }

    /// Every timer scheduled since the last `take_scheduled`, cancelled ones included
    pub fn scheduled(&self) -> &[ScheduledTimer] {
        &self.scheduled
    }

    pub fn take_scheduled(&mut self) -> Vec<ScheduledTimer> {
        std::mem::take(&mut self.scheduled)
    }

    pub fn is_cancelled(&self, handle: TimerHandle) -> bool {
        self.cancelled.contains(&handle)
    }

    /// Handles cancelled since the last call
    pub fn take_cancelled(&mut self) -> Vec<TimerHandle> {
        let mut handles: Vec<_> = self.cancelled.drain().collect();
        handles.sort();
        handles
    }

    /// Latest live (not cancelled) schedule of `timer`
    pub fn armed(&self, timer: Timer) -> Option<ScheduledTimer> {
        self.scheduled
            .iter()
            .rev()
            .find(|s| s.timer == timer && !self.cancelled.contains(&s.handle))
            .copied()
    }

    pub fn delivered(&self) -> &[DataPacket] {
        &self.delivered
    }

    pub fn take_delivered(&mut self) -> Vec<DataPacket> {
        std::mem::take(&mut self.delivered)
    }

    pub fn unreachable(&self) -> &[Unreachable] {
        &self.unreachable
    }

    pub fn take_unreachable(&mut self) -> Vec<Unreachable> {
        std::mem::take(&mut self.unreachable)
    }
}

impl Clock for BufferedEnv {
    fn now(&self) -> Timestamp {
        self.now
    }
}

impl Scheduler for BufferedEnv {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle::new(self.next_handle);
        self.scheduled.push(ScheduledTimer {
            handle,
            at: self.now + delay,
            timer,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.cancelled.insert(handle);
    }
}

impl LinkLayer for BufferedEnv {
    fn send(&mut self, packet: Packet, target: LinkTarget) {
        self.outgoing.push(Outgoing { packet, target });
    }
}

impl Upcall for BufferedEnv {
    fn deliver(&mut self, packet: DataPacket) {
        self.delivered.push(packet);
    }

    fn destination_unreachable(&mut self, destination: NodeAddr, dropped: Vec<DataPacket>) {
        self.unreachable.push(Unreachable {
            destination,
            dropped,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aorglu_protocol::Beacon;

    #[test]
    fn test_schedule_records_deadline() {
        let mut env = BufferedEnv::starting_at(Timestamp::from_millis(100));
        let h = env.schedule(Duration::from_millis(50), Timer::Beacon);

        let armed = env.armed(Timer::Beacon).unwrap();
        assert_eq!(armed.handle, h);
        assert_eq!(armed.at, Timestamp::from_millis(150));
    }

    #[test]
    fn test_cancelled_timer_is_not_armed() {
        let mut env = BufferedEnv::new();
        let h = env.schedule(Duration::from_millis(50), Timer::RoutePurge);
        env.cancel(h);

        assert!(env.is_cancelled(h));
        assert!(env.armed(Timer::RoutePurge).is_none());
        assert_eq!(env.take_cancelled(), vec![h]);
        assert!(!env.is_cancelled(h));
    }

    #[test]
    fn test_handles_are_unique() {
        let mut env = BufferedEnv::new();
        let a = env.schedule(Duration::ZERO, Timer::Beacon);
        let b = env.schedule(Duration::ZERO, Timer::Beacon);
        assert_ne!(a, b);
    }

    #[test]
    fn test_outgoing_buffer() {
        let mut env = BufferedEnv::new();
        let beacon = Packet::Beacon(Beacon {
            sender: NodeAddr::new(1),
            seqno: 0,
        });
        env.send(beacon.clone(), LinkTarget::Broadcast);

        assert_eq!(env.outgoing().len(), 1);
        let sent = env.take_outgoing();
        assert_eq!(sent[0].packet, beacon);
        assert_eq!(sent[0].target, LinkTarget::Broadcast);
        assert!(env.outgoing().is_empty());
    }
}
