//! AORGLU Network Simulator
//!
//! Deterministic discrete-event harness for multi-node scenarios: an event
//! heap ordered by time then insertion, a switchable link topology, and one
//! routing engine per node over a buffered environment.

pub mod event;
pub mod sim;
pub mod topology;

pub use event::{Event, ScheduledEvent, SequenceNumber};
pub use sim::{SimMetrics, SimNode, Simulator};
pub use topology::{Link, Topology};
