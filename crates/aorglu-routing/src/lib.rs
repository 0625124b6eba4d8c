//! AORGLU Routing Agent
//!
//! Reactive, hop-by-hop routing for ad-hoc networks:
//! - On-demand route discovery with an expanding TTL ring
//! - Neighbor tracking through periodic beacons
//! - Local repair of broken links, steered by cached node positions
//! - Route errors toward precursors when repair is not possible
//!
//! The [`ProtocolEngine`] is a synchronous state machine. It is driven by an
//! [`Environment`] that provides the clock, timers, the link layer, and the
//! upcalls. [`BufferedEnv`] records everything for simulators and tests,
//! while [`NodeRuntime`] runs an engine on its own tokio task.

pub mod advertise;
pub mod broadcast_id;
pub mod comm_cache;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod env;
pub mod error;
pub mod link_quality;
pub mod location;
pub mod neighbor;
pub mod pending_queue;
pub mod repair;
pub mod route_table;
pub mod runtime;
pub mod timer;

pub use broadcast_id::BroadcastIdCache;
pub use comm_cache::{CommunicationCache, CommunicationEntry};
pub use config::{HelloJitter, LinkFailurePolicy, LocationCachePolicy, ProtocolConfig};
pub use engine::{EngineStats, ProtocolEngine};
pub use env::{
    BufferedEnv, Clock, Environment, LinkLayer, LinkTarget, Outgoing, ScheduledTimer, Scheduler,
    Unreachable, Upcall,
};
pub use error::{Result, RoutingError};
pub use link_quality::LinkFailureFilter;
pub use location::{LocationCache, LocationEntry};
pub use neighbor::{NeighborCache, NeighborEntry};
pub use pending_queue::{PendingPacketQueue, QueuedPacket};
pub use repair::RepairAttempt;
pub use route_table::{RouteEntry, RouteState, RouteTable, UpdateOutcome, INFINITE_HOPS};
pub use runtime::{NodeEvent, NodeHandle, NodeRuntime, OutboundFrame};
pub use timer::{Timer, TimerHandle};
