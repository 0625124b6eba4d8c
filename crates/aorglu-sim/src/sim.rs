//! Discrete event simulator for AORGLU networks
//!
//! Every node is a [`ProtocolEngine`] over a [`BufferedEnv`]. After each
//! engine call the simulator drains the environment: transmissions become
//! frame arrivals on linked nodes, timers become timer events, and
//! cancellations are remembered so the matching events are skipped.
//! A unicast toward a node that is not linked is reported back to the
//! sender as a transmission failure.

use crate::event::{Event, ScheduledEvent, SequenceNumber};
use crate::topology::Topology;
use anyhow::{bail, Context, Result};
use aorglu_protocol::{DataPacket, NodeAddr, Position, Timestamp};
use aorglu_routing::{
    BufferedEnv, LinkTarget, ProtocolConfig, ProtocolEngine, TimerHandle, Unreachable,
};
use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::time::Duration;
use tracing::{debug, trace, warn};

pub type SimNode = ProtocolEngine<BufferedEnv>;

/// Network-level counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimMetrics {
    pub frames_sent: u64,
    pub frames_delivered: u64,
    /// Frames that never arrived because the link went away in flight
    pub frames_lost: u64,
    pub transmit_failures: u64,
    pub events_processed: u64,
}

pub struct Simulator {
    nodes: BTreeMap<NodeAddr, SimNode>,
    topology: Topology,
    current_time: Timestamp,
    event_queue: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
    cancelled: HashSet<(NodeAddr, TimerHandle)>,
    metrics: SimMetrics,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            topology: Topology::new(),
            current_time: Timestamp::ZERO,
            event_queue: BinaryHeap::new(),
            next_seq: 0,
            cancelled: HashSet::new(),
            metrics: SimMetrics::default(),
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Add and start a node at the current time
    pub fn add_node(&mut self, addr: NodeAddr, config: ProtocolConfig) -> Result<()> {
        self.add_node_at(addr, config, None)
    }

    pub fn add_node_at(
        &mut self,
        addr: NodeAddr,
        config: ProtocolConfig,
        position: Option<Position>,
    ) -> Result<()> {
        if self.nodes.contains_key(&addr) {
            bail!("node {} already exists", addr);
        }
        let env = BufferedEnv::starting_at(self.current_time);
        let mut engine = ProtocolEngine::new(addr, config, env)
            .with_context(|| format!("failed to create node {}", addr))?;
        engine.set_position(position);
        engine.start();
        self.nodes.insert(addr, engine);
        self.collect(addr);
        Ok(())
    }

    /// Add every address with the same configuration
    pub fn add_nodes(&mut self, addrs: &[NodeAddr], config: &ProtocolConfig) -> Result<()> {
        for &addr in addrs {
            self.add_node(addr, config.clone())?;
        }
        Ok(())
    }

    pub fn node(&self, addr: NodeAddr) -> Option<&SimNode> {
        self.nodes.get(&addr)
    }

    pub fn node_mut(&mut self, addr: NodeAddr) -> Option<&mut SimNode> {
        self.nodes.get_mut(&addr)
    }

    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    /// Payloads delivered to `addr` so far
    pub fn delivered(&self, addr: NodeAddr) -> &[DataPacket] {
        self.nodes
            .get(&addr)
            .map(|n| n.env().delivered())
            .unwrap_or(&[])
    }

    /// Unreachable-destination upcalls raised on `addr` so far
    pub fn unreachable(&self, addr: NodeAddr) -> &[Unreachable] {
        self.nodes
            .get(&addr)
            .map(|n| n.env().unreachable())
            .unwrap_or(&[])
    }

    pub fn schedule(&mut self, time: Timestamp, event: Event) {
        let seq = SequenceNumber::new(self.next_seq);
        self.next_seq += 1;
        self.event_queue.push(ScheduledEvent::new(time, seq, event));
    }

    /// Application send, processed at the current time
    pub fn send_data(&mut self, from: NodeAddr, to: NodeAddr, payload: Vec<u8>) {
        self.schedule(self.current_time, Event::AppSend { from, to, payload });
    }

    /// Take a link down now; frames already in flight over it are lost
    pub fn link_down(&mut self, a: NodeAddr, b: NodeAddr) {
        self.schedule(
            self.current_time,
            Event::SetLink {
                a,
                b,
                active: false,
            },
        );
    }

    pub fn link_up(&mut self, a: NodeAddr, b: NodeAddr) {
        self.schedule(
            self.current_time,
            Event::SetLink {
                a,
                b,
                active: true,
            },
        );
    }

    pub fn relocate(&mut self, node: NodeAddr, position: Option<Position>) {
        self.schedule(self.current_time, Event::Relocate { node, position });
    }

    /// Process every event up to and including `end_time`
    pub fn run_until(&mut self, end_time: Timestamp) {
        while let Some(next) = self.event_queue.peek() {
            if next.time > end_time {
                break;
            }
            let Some(scheduled) = self.event_queue.pop() else {
                break;
            };
            self.advance_time(scheduled.time);
            self.metrics.events_processed += 1;
            self.process_event(scheduled.event);
        }
        self.advance_time(end_time);
    }

    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.current_time + duration);
    }

    fn advance_time(&mut self, time: Timestamp) {
        if time > self.current_time {
            self.current_time = time;
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::FrameArrival { to, from, frame } => {
                if !self.topology.is_connected(from, to) {
                    self.metrics.frames_lost += 1;
                    trace!(from = %from, to = %to, "frame lost in flight");
                    return;
                }
                let Some(node) = self.engine_at_now(to) else {
                    return;
                };
                if let Err(e) = node.on_receive_bytes(from, &frame) {
                    warn!(from = %from, to = %to, error = %e, "undecodable frame");
                }
                self.metrics.frames_delivered += 1;
                self.collect(to);
            }
            Event::TimerFire {
                node,
                handle,
                timer,
            } => {
                if self.cancelled.remove(&(node, handle)) {
                    return;
                }
                let Some(engine) = self.engine_at_now(node) else {
                    return;
                };
                engine.on_timer(timer);
                self.collect(node);
            }
            Event::AppSend { from, to, payload } => {
                let Some(engine) = self.engine_at_now(from) else {
                    return;
                };
                engine.send_data(to, payload);
                self.collect(from);
            }
            Event::TransmitFailure { node, neighbor } => {
                let Some(engine) = self.engine_at_now(node) else {
                    return;
                };
                engine.on_link_failure(neighbor);
                self.collect(node);
            }
            Event::SetLink { a, b, active } => {
                if !self.topology.set_active(a, b, active) {
                    warn!(a = %a, b = %b, "no such link");
                }
                debug!(a = %a, b = %b, active, "link changed");
            }
            Event::Relocate { node, position } => {
                if let Some(engine) = self.engine_at_now(node) {
                    engine.set_position(position);
                }
            }
        }
    }

    fn engine_at_now(&mut self, addr: NodeAddr) -> Option<&mut SimNode> {
        let now = self.current_time;
        let engine = self.nodes.get_mut(&addr)?;
        engine.env_mut().set_now(now);
        Some(engine)
    }

    /// Turn what `addr` produced into future events
    fn collect(&mut self, addr: NodeAddr) {
        let Some(engine) = self.nodes.get_mut(&addr) else {
            return;
        };
        let env = engine.env_mut();
        let outgoing = env.take_outgoing();
        let scheduled = env.take_scheduled();
        let cancelled = env.take_cancelled();

        for timer in scheduled {
            self.schedule(
                timer.at,
                Event::TimerFire {
                    node: addr,
                    handle: timer.handle,
                    timer: timer.timer,
                },
            );
        }
        self.cancelled
            .extend(cancelled.into_iter().map(|handle| (addr, handle)));

        let now = self.current_time;
        for out in outgoing {
            let frame = match aorglu_protocol::encode(&out.packet) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(node = %addr, error = %e, "failed to encode packet");
                    continue;
                }
            };
            self.metrics.frames_sent += 1;

            match out.target {
                LinkTarget::Broadcast => {
                    for (neighbor, link) in self.topology.neighbors(addr) {
                        self.schedule(
                            now + link.delay,
                            Event::FrameArrival {
                                to: neighbor,
                                from: addr,
                                frame: frame.clone(),
                            },
                        );
                    }
                }
                LinkTarget::Unicast(to) => match self.topology.get_link(addr, to) {
                    Some(link) if link.active => {
                        let delay = link.delay;
                        self.schedule(
                            now + delay,
                            Event::FrameArrival {
                                to,
                                from: addr,
                                frame,
                            },
                        );
                    }
                    _ => {
                        self.metrics.transmit_failures += 1;
                        debug!(node = %addr, neighbor = %to, "unicast failed, no link");
                        self.schedule(
                            now,
                            Event::TransmitFailure {
                                node: addr,
                                neighbor: to,
                            },
                        );
                    }
                },
            }
        }
    }
}
