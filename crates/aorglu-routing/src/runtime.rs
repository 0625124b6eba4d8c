//! Tokio-driven node
//!
//! One task owns one engine. Everything reaches the engine as a message:
//! frames from neighbors, application data, link-layer feedback. Outgoing
//! frames leave over a channel, so the caller decides how they travel.
//! Timers live in a deadline heap and are awaited with `sleep_until`.

use crate::config::ProtocolConfig;
use crate::engine::{EngineStats, ProtocolEngine};
use crate::env::{BufferedEnv, Clock, LinkTarget};
use crate::error::{Result, RoutingError};
use crate::timer::{Timer, TimerHandle};
use aorglu_protocol::{DataPacket, NodeAddr, Position, Timestamp};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

/// Commands accepted by a running node
#[derive(Debug)]
enum NodeCommand {
    Receive { from: NodeAddr, frame: Vec<u8> },
    SendData { destination: NodeAddr, payload: Vec<u8> },
    LinkFailed(NodeAddr),
    SetPosition(Option<Position>),
    Stats(oneshot::Sender<EngineStats>),
    Shutdown,
}

/// An encoded frame the node wants transmitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub source: NodeAddr,
    pub target: LinkTarget,
    pub frame: Vec<u8>,
}

/// Upcalls surfaced by a running node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Delivered(DataPacket),
    Unreachable {
        destination: NodeAddr,
        dropped: Vec<DataPacket>,
    },
}

/// Cloneable handle to a running node
#[derive(Debug, Clone)]
pub struct NodeHandle {
    addr: NodeAddr,
    commands: mpsc::UnboundedSender<NodeCommand>,
}

impl NodeHandle {
    pub fn address(&self) -> NodeAddr {
        self.addr
    }

    fn command(&self, command: NodeCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| RoutingError::RuntimeStopped)
    }

    /// Hand the node a frame heard from `from`
    pub fn deliver_packet(&self, from: NodeAddr, frame: Vec<u8>) -> Result<()> {
        self.command(NodeCommand::Receive { from, frame })
    }

    pub fn send_data(&self, destination: NodeAddr, payload: Vec<u8>) -> Result<()> {
        self.command(NodeCommand::SendData {
            destination,
            payload,
        })
    }

    /// Report a failed transmission to `neighbor`
    pub fn link_failed(&self, neighbor: NodeAddr) -> Result<()> {
        self.command(NodeCommand::LinkFailed(neighbor))
    }

    pub fn set_position(&self, position: Option<Position>) -> Result<()> {
        self.command(NodeCommand::SetPosition(position))
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        let (tx, rx) = oneshot::channel();
        self.command(NodeCommand::Stats(tx))?;
        rx.await.map_err(|_| RoutingError::RuntimeStopped)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.command(NodeCommand::Shutdown)
    }
}

/// Timer waiting in the deadline heap
#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    at: Timestamp,
    seq: u64,
    handle: TimerHandle,
    timer: Timer,
}

impl PartialEq for PendingTimer {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for PendingTimer {}

impl PartialOrd for PendingTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, the earliest deadline must pop first
        match other.at.cmp(&self.at) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

/// A node running on its own task
pub struct NodeRuntime {
    handle: NodeHandle,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    events: mpsc::UnboundedReceiver<NodeEvent>,
    task: JoinHandle<()>,
}

impl NodeRuntime {
    /// Build the engine and spawn its task; must be called inside a tokio runtime
    pub fn spawn(
        addr: NodeAddr,
        config: ProtocolConfig,
        position: Option<Position>,
    ) -> Result<Self> {
        let mut engine = ProtocolEngine::new(addr, config, BufferedEnv::new())?;
        engine.set_position(position);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            engine,
            epoch: Instant::now(),
            timers: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_seq: 0,
            outbound: outbound_tx,
            events: event_tx,
        };
        let task = tokio::spawn(driver.run(command_rx));

        Ok(NodeRuntime {
            handle: NodeHandle {
                addr,
                commands: command_tx,
            },
            outbound: outbound_rx,
            events: event_rx,
            task,
        })
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// Next frame the node wants sent; `None` once the node stopped
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        self.outbound.recv().await
    }

    /// Next upcall; `None` once the node stopped
    pub async fn next_event(&mut self) -> Option<NodeEvent> {
        self.events.recv().await
    }

    /// Frame already waiting, without blocking
    pub fn try_next_frame(&mut self) -> Option<OutboundFrame> {
        self.outbound.try_recv().ok()
    }

    /// Upcall already waiting, without blocking
    pub fn try_next_event(&mut self) -> Option<NodeEvent> {
        self.events.try_recv().ok()
    }

    /// Stop the node and wait for its task to finish
    pub async fn shutdown(self) -> Result<()> {
        // Ignore a failed send: the task may already be gone
        let _ = self.handle.shutdown();
        self.task.await.map_err(|_| RoutingError::RuntimeStopped)
    }
}

struct Driver {
    engine: ProtocolEngine<BufferedEnv>,
    epoch: Instant,
    timers: BinaryHeap<PendingTimer>,
    cancelled: HashSet<TimerHandle>,
    next_seq: u64,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    events: mpsc::UnboundedSender<NodeEvent>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<NodeCommand>) {
        let addr = self.engine.address();
        info!(node = %addr, "node task started");

        self.sync_clock();
        self.engine.start();
        self.flush();

        loop {
            let next = self.timers.peek().map(|t| self.deadline(t.at));

            tokio::select! {
                command = commands.recv() => {
                    self.sync_clock();
                    match command {
                        None | Some(NodeCommand::Shutdown) => break,
                        Some(command) => self.handle(command),
                    }
                }
                _ = sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
                    self.sync_clock();
                    self.fire_due_timers();
                }
            }
            self.flush();
        }

        info!(node = %addr, "node task stopped");
    }

    fn handle(&mut self, command: NodeCommand) {
        match command {
            NodeCommand::Receive { from, frame } => {
                if let Err(e) = self.engine.on_receive_bytes(from, &frame) {
                    debug!(node = %self.engine.address(), error = %e, "frame rejected");
                }
            }
            NodeCommand::SendData {
                destination,
                payload,
            } => self.engine.send_data(destination, payload),
            NodeCommand::LinkFailed(neighbor) => self.engine.on_link_failure(neighbor),
            NodeCommand::SetPosition(position) => self.engine.set_position(position),
            NodeCommand::Stats(reply) => {
                let _ = reply.send(self.engine.stats().clone());
            }
            NodeCommand::Shutdown => {}
        }
    }

    fn deadline(&self, at: Timestamp) -> Instant {
        self.epoch + Duration::from_millis(at.as_millis())
    }

    fn sync_clock(&mut self) {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        self.engine.env_mut().set_now(Timestamp::from_millis(elapsed));
    }

    fn fire_due_timers(&mut self) {
        let now = self.engine.env().now().as_millis();
        while let Some(top) = self.timers.peek() {
            if top.at.as_millis() > now {
                break;
            }
            let Some(due) = self.timers.pop() else {
                break;
            };
            if self.cancelled.remove(&due.handle) {
                continue;
            }
            self.engine.on_timer(due.timer);
            self.collect_timers();
        }
    }

    /// Move timers and cancellations from the engine's environment into the heap
    fn collect_timers(&mut self) {
        let env = self.engine.env_mut();
        let scheduled = env.take_scheduled();
        let cancelled = env.take_cancelled();
        for s in scheduled {
            self.next_seq += 1;
            self.timers.push(PendingTimer {
                at: s.at,
                seq: self.next_seq,
                handle: s.handle,
                timer: s.timer,
            });
        }
        self.cancelled.extend(cancelled);
    }

    /// Push everything the engine produced out of the task
    fn flush(&mut self) {
        self.collect_timers();

        let source = self.engine.address();
        let env = self.engine.env_mut();
        let outgoing = env.take_outgoing();
        let delivered = env.take_delivered();
        let unreachable = env.take_unreachable();

        for out in outgoing {
            match aorglu_protocol::encode(&out.packet) {
                Ok(frame) => {
                    let _ = self.outbound.send(OutboundFrame {
                        source,
                        target: out.target,
                        frame,
                    });
                }
                Err(e) => warn!(node = %source, error = %e, "failed to encode packet"),
            }
        }
        for packet in delivered {
            let _ = self.events.send(NodeEvent::Delivered(packet));
        }
        for u in unreachable {
            let _ = self.events.send(NodeEvent::Unreachable {
                destination: u.destination,
                dropped: u.dropped,
            });
        }
    }
}
