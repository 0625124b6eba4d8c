//! Timer kinds driven by the external scheduler

use aorglu_protocol::NodeAddr;
use std::fmt;

/// Opaque handle returned by the scheduler, used to cancel a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub const fn new(value: u64) -> Self {
        TimerHandle(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

/// Every timer the engine arms
///
/// Periodic timers re-arm themselves from the engine's dispatch function.
/// Per-destination timers are one-shot and tracked so they can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Emit a beacon, then re-arm with jitter
    Beacon,
    /// Sweep the neighbor cache
    NeighborPurge,
    /// Sweep the broadcast-id cache
    BroadcastIdPurge,
    /// Sweep the location cache
    LocationPurge,
    /// Sweep the communication cache
    CommunicationPurge,
    /// Advertise our position to active peers
    LocationUpdate,
    /// Down expired routes and drop stale entries
    RoutePurge,
    /// Next expanding-ring attempt for a destination
    RequestRetry(NodeAddr),
    /// Resend the repair request for a destination
    RepairRetransmit(NodeAddr),
    /// Give up on a local repair
    RepairWindow(NodeAddr),
}

impl Timer {
    /// Whether the timer re-arms itself after firing
    pub fn is_periodic(&self) -> bool {
        !matches!(
            self,
            Timer::RequestRetry(_) | Timer::RepairRetransmit(_) | Timer::RepairWindow(_)
        )
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timer::Beacon => write!(f, "beacon"),
            Timer::NeighborPurge => write!(f, "neighbor-purge"),
            Timer::BroadcastIdPurge => write!(f, "bcast-id-purge"),
            Timer::LocationPurge => write!(f, "location-purge"),
            Timer::CommunicationPurge => write!(f, "comm-purge"),
            Timer::LocationUpdate => write!(f, "location-update"),
            Timer::RoutePurge => write!(f, "route-purge"),
            Timer::RequestRetry(dst) => write!(f, "request-retry({})", dst),
            Timer::RepairRetransmit(dst) => write!(f, "repair-retx({})", dst),
            Timer::RepairWindow(dst) => write!(f, "repair-window({})", dst),
        }
    }
}
