//! Per-node routing agent
//!
//! The engine owns every table of one node and is driven entirely from
//! outside: inbound packets through [`ProtocolEngine::on_receive`], timer
//! firings through [`ProtocolEngine::on_timer`], link-layer feedback through
//! [`ProtocolEngine::on_link_failure`] and application traffic through
//! [`ProtocolEngine::send_data`]. Each call runs to completion.
//!
//! Discovery, local repair and location advertisement live in their own
//! modules as further `impl` blocks on the same type.

use crate::broadcast_id::BroadcastIdCache;
use crate::comm_cache::CommunicationCache;
use crate::config::ProtocolConfig;
use crate::env::{Environment, LinkTarget};
use crate::error::Result;
use crate::link_quality::LinkFailureFilter;
use crate::location::LocationCache;
use crate::neighbor::NeighborCache;
use crate::pending_queue::PendingPacketQueue;
use crate::repair::RepairAttempt;
use crate::route_table::{RouteState, RouteTable, UpdateOutcome, INFINITE_HOPS};
use crate::timer::{Timer, TimerHandle};
use aorglu_protocol::{
    Beacon, DataPacket, NodeAddr, Packet, Position, RouteError, Timestamp, UnreachableDestination,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Engine statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub requests_sent: u64,
    pub requests_forwarded: u64,
    pub replies_sent: u64,
    pub replies_forwarded: u64,
    pub errors_sent: u64,
    pub data_originated: u64,
    pub data_forwarded: u64,
    pub data_delivered: u64,
    pub packets_dropped: u64,
    pub duplicates_suppressed: u64,
    pub malformed_packets: u64,
    pub link_breaks: u64,
    pub repairs_started: u64,
    pub repairs_forwarded: u64,
    pub repairs_succeeded: u64,
    pub repairs_failed: u64,
    pub beacons_sent: u64,
    pub location_updates_sent: u64,
    pub location_updates_received: u64,
}

/// Unreachable destinations to report, grouped by the neighbor to tell
pub(crate) type ErrorFanout = BTreeMap<NodeAddr, Vec<UnreachableDestination>>;

/// Routing agent for one node
pub struct ProtocolEngine<E: Environment> {
    pub(crate) addr: NodeAddr,
    pub(crate) config: ProtocolConfig,
    pub(crate) env: E,

    /// Own destination sequence number
    pub(crate) seqno: u32,
    /// Own flood identifier, shared by requests and repairs
    pub(crate) broadcast_id: u32,
    pub(crate) position: Option<Position>,

    pub(crate) routes: RouteTable,
    pub(crate) neighbors: NeighborCache,
    pub(crate) broadcast_ids: BroadcastIdCache,
    pub(crate) locations: LocationCache,
    pub(crate) comm_cache: CommunicationCache,
    pub(crate) queue: PendingPacketQueue,
    pub(crate) link_filter: LinkFailureFilter,

    /// Outstanding `RequestRetry` timers
    pub(crate) request_timers: HashMap<NodeAddr, TimerHandle>,
    /// Local repairs in progress
    pub(crate) repairs: HashMap<NodeAddr, RepairAttempt>,

    rng: StdRng,
    pub(crate) stats: EngineStats,
    started: bool,
}

impl<E: Environment> ProtocolEngine<E> {
    /// Create an engine; the configuration is validated first
    pub fn new(addr: NodeAddr, config: ProtocolConfig, env: E) -> Result<Self> {
        config.validate()?;

        let rng = StdRng::seed_from_u64(config.rng_seed ^ addr.as_u32() as u64);
        Ok(ProtocolEngine {
            addr,
            neighbors: NeighborCache::new(config.neighbor_lifetime()),
            broadcast_ids: BroadcastIdCache::new(Duration::from_millis(
                config.broadcast_id_save_ms,
            )),
            locations: LocationCache::new(config.location_cache),
            comm_cache: CommunicationCache::new(Duration::from_millis(
                config.communication_cache_save_ms,
            )),
            queue: PendingPacketQueue::new(
                config.queue_capacity,
                Duration::from_millis(config.queue_timeout_ms),
            ),
            link_filter: LinkFailureFilter::new(config.link_failure_filter),
            config,
            env,
            seqno: 0,
            broadcast_id: 0,
            position: None,
            routes: RouteTable::new(),
            request_timers: HashMap::new(),
            repairs: HashMap::new(),
            rng,
            stats: EngineStats::default(),
            started: false,
        })
    }

    pub fn address(&self) -> NodeAddr {
        self.addr
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn seqno(&self) -> u32 {
        self.seqno
    }

    pub fn route_table(&self) -> &RouteTable {
        &self.routes
    }

    pub fn neighbors(&self) -> &NeighborCache {
        &self.neighbors
    }

    pub fn location_cache(&self) -> &LocationCache {
        &self.locations
    }

    pub fn communication_cache(&self) -> &CommunicationCache {
        &self.comm_cache
    }

    pub fn pending(&self) -> &PendingPacketQueue {
        &self.queue
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Update our own position (`None` when unknown)
    pub fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }

    /// Whether a local repair for `destination` is in progress
    pub fn is_repairing(&self, destination: NodeAddr) -> bool {
        self.repairs.contains_key(&destination)
    }

    /// Whether a discovery (or its backoff) is pending for `destination`
    pub fn is_discovering(&self, destination: NodeAddr) -> bool {
        self.request_timers.contains_key(&destination)
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.env.now()
    }

    /// Arm every periodic timer; calling it twice is a no-op
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        info!(node = %self.addr, "routing agent started");

        for timer in [
            Timer::Beacon,
            Timer::NeighborPurge,
            Timer::BroadcastIdPurge,
            Timer::LocationPurge,
            Timer::CommunicationPurge,
            Timer::LocationUpdate,
            Timer::RoutePurge,
        ] {
            self.arm(timer);
        }
    }

    /// Schedule the next firing of a periodic timer
    fn arm(&mut self, timer: Timer) {
        let ms = |v: u64| Duration::from_millis(v);
        let delay = match timer {
            Timer::Beacon => {
                let jitter = self.config.hello_jitter;
                let factor = self.rng.gen_range(jitter.min..=jitter.max);
                self.config.hello_interval().mul_f64(factor)
            }
            Timer::NeighborPurge => self.config.hello_interval(),
            Timer::BroadcastIdPurge => ms(self.config.broadcast_id_save_ms),
            Timer::LocationPurge => ms(self.config.location_purge_interval_ms),
            Timer::CommunicationPurge => ms(self.config.communication_purge_interval_ms),
            Timer::LocationUpdate => ms(self.config.location_update_interval_ms),
            Timer::RoutePurge => ms(self.config.route_purge_interval_ms),
            Timer::RequestRetry(_) | Timer::RepairRetransmit(_) | Timer::RepairWindow(_) => {
                return
            }
        };
        self.env.schedule(delay, timer);
    }

    /// Single dispatch point for every timer
    pub fn on_timer(&mut self, timer: Timer) {
        trace!(node = %self.addr, %timer, "timer fired");
        let now = self.now();

        match timer {
            Timer::Beacon => self.send_beacon(),
            Timer::NeighborPurge => {
                for lost in self.neighbors.purge(now) {
                    debug!(node = %self.addr, neighbor = %lost, "neighbor expired");
                    self.link_broken(lost);
                }
            }
            Timer::BroadcastIdPurge => {
                self.broadcast_ids.purge(now);
            }
            Timer::LocationPurge => {
                self.locations.purge(now);
            }
            Timer::CommunicationPurge => {
                self.comm_cache.purge_inactive(now);
            }
            Timer::LocationUpdate => self.advertise_location(),
            Timer::RoutePurge => self.purge_routes(),
            Timer::RequestRetry(dst) => self.request_retry(dst),
            Timer::RepairRetransmit(dst) => self.repair_retransmit(dst),
            Timer::RepairWindow(dst) => self.repair_window_expired(dst),
        }

        if timer.is_periodic() {
            self.arm(timer);
        }
    }

    /// Handle a packet received from the neighbor `from`
    pub fn on_receive(&mut self, from: NodeAddr, packet: Packet) {
        trace!(
            node = %self.addr,
            from = %from,
            kind = packet.packet_type().name(),
            "packet received"
        );

        match packet {
            Packet::Beacon(beacon) => self.recv_beacon(beacon),
            Packet::Request(request) => self.recv_request(from, request),
            Packet::Reply(reply) => self.recv_reply(from, reply),
            Packet::Error(error) => self.recv_error(from, error),
            Packet::LocationUpdate(update) => self.recv_location_update(from, update),
            Packet::Repair(repair) => self.recv_repair(from, repair),
            Packet::Data(data) => self.recv_data(from, data),
        }
    }

    /// Decode a frame and handle it; malformed frames change nothing
    pub fn on_receive_bytes(&mut self, from: NodeAddr, bytes: &[u8]) -> Result<()> {
        match aorglu_protocol::decode(bytes) {
            Ok(packet) => {
                self.on_receive(from, packet);
                Ok(())
            }
            Err(e) => {
                warn!(node = %self.addr, from = %from, error = %e, "dropping malformed frame");
                self.stats.malformed_packets += 1;
                Err(e.into())
            }
        }
    }

    /// The link layer failed to deliver to `neighbor`
    pub fn on_link_failure(&mut self, neighbor: NodeAddr) {
        let now = self.now();
        if !self.link_filter.record_failure(neighbor, now) {
            debug!(node = %self.addr, neighbor = %neighbor, "transmission failure tolerated");
            return;
        }
        self.neighbors.delete(neighbor);
        self.link_broken(neighbor);
    }

    /// Application entry point: send `payload` to `destination`
    pub fn send_data(&mut self, destination: NodeAddr, payload: Vec<u8>) {
        let now = self.now();
        let packet = DataPacket::new(self.addr, destination, payload);
        self.stats.data_originated += 1;

        if destination == self.addr {
            self.stats.data_delivered += 1;
            self.env.deliver(packet);
            return;
        }

        self.comm_cache.mark_active(destination, now);
        self.resolve(packet, None);
    }

    /// Forward `packet` if a route exists, otherwise queue or reject it
    ///
    /// `from` is the previous hop, `None` when this node originated the packet.
    pub fn resolve(&mut self, packet: DataPacket, from: Option<NodeAddr>) {
        let dst = packet.destination;
        let state = self.routes.lookup(dst).map(|e| e.state());

        match state {
            Some(RouteState::Up) => self.forward(packet, from),
            Some(RouteState::InRepair) => self.enqueue(packet, from),
            _ if packet.source == self.addr => {
                self.enqueue(packet, from);
                if !self.request_timers.contains_key(&dst) {
                    self.send_request(dst);
                }
            }
            _ => {
                self.stats.packets_dropped += 1;
                debug!(node = %self.addr, dst = %dst, "no route for transit packet");
                if let Some(prev) = from {
                    let seqno = self.routes.lookup(dst).map_or(0, |e| e.seqno());
                    let mut fanout = ErrorFanout::new();
                    fanout.entry(prev).or_default().push(UnreachableDestination {
                        address: dst,
                        seqno,
                    });
                    self.send_errors(fanout);
                }
            }
        }
    }

    fn enqueue(&mut self, packet: DataPacket, from: Option<NodeAddr>) {
        let now = self.now();
        if let Some(evicted) = self.queue.enqueue(packet, from, now) {
            self.stats.packets_dropped += 1;
            debug!(
                node = %self.addr,
                dst = %evicted.destination,
                "pending queue full, dropped oldest packet"
            );
        }
    }

    /// Send a data packet along an UP route
    pub(crate) fn forward(&mut self, packet: DataPacket, from: Option<NodeAddr>) {
        let now = self.now();
        let lifetime = self.config.active_route_timeout();
        let Some(entry) = self.routes.lookup_mut(packet.destination) else {
            return;
        };
        assert!(
            entry.is_up() && entry.hop_count() != INFINITE_HOPS,
            "forwarding over a route that is not usable"
        );
        let Some(next_hop) = entry.next_hop() else {
            return;
        };

        entry.extend(now + lifetime);
        if let Some(prev) = from {
            entry.add_relay(prev);
            self.stats.data_forwarded += 1;
        }

        trace!(
            node = %self.addr,
            dst = %packet.destination,
            next_hop = %next_hop,
            "forwarding data"
        );
        self.env.send(Packet::Data(packet), LinkTarget::Unicast(next_hop));
    }

    fn recv_data(&mut self, from: NodeAddr, mut packet: DataPacket) {
        let now = self.now();
        self.neighbors.insert(from, now);

        if packet.destination == self.addr {
            self.comm_cache.mark_active(packet.source, now);
            self.stats.data_delivered += 1;
            self.env.deliver(packet);
            return;
        }

        packet.ttl = packet.ttl.saturating_sub(1);
        if packet.ttl == 0 {
            self.stats.packets_dropped += 1;
            debug!(node = %self.addr, dst = %packet.destination, "data ttl expired");
            return;
        }
        self.resolve(packet, Some(from));
    }

    fn send_beacon(&mut self) {
        let beacon = Beacon {
            sender: self.addr,
            seqno: self.seqno,
        };
        self.stats.beacons_sent += 1;
        self.env.send(Packet::Beacon(beacon), LinkTarget::Broadcast);
    }

    fn recv_beacon(&mut self, beacon: Beacon) {
        let now = self.now();
        if self.neighbors.insert(beacon.sender, now) {
            debug!(node = %self.addr, neighbor = %beacon.sender, "new neighbor");
        }
        self.link_filter.reset(beacon.sender);
    }

    /// Offer a route to `dst`, finishing any discovery or repair it satisfies
    ///
    /// An accepted REPLY for a route in repair doubles as the repair
    /// confirmation.
    pub(crate) fn offer_route(
        &mut self,
        dst: NodeAddr,
        seqno: u32,
        hop_count: u16,
        next_hop: NodeAddr,
        expire: Timestamp,
    ) -> UpdateOutcome {
        if hop_count >= INFINITE_HOPS {
            return UpdateOutcome::Stale;
        }
        let entry = self.routes.entry(dst);
        let was_repairing = entry.state() == RouteState::InRepair;
        let outcome = entry.update(seqno, hop_count, next_hop, expire);
        if !outcome.is_accepted() {
            return outcome;
        }
        entry.reset_discovery();

        if was_repairing {
            self.repair_succeeded(dst);
        }
        self.route_established(dst);
        outcome
    }

    /// A usable route to `dst` exists: stop searching and flush the queue
    fn route_established(&mut self, dst: NodeAddr) {
        if let Some(handle) = self.request_timers.remove(&dst) {
            self.env.cancel(handle);
        }

        for queued in self.queue.dequeue_for(dst) {
            self.forward(queued.packet, queued.from);
        }
    }

    /// Every UP route through `neighbor` is broken
    pub(crate) fn link_broken(&mut self, neighbor: NodeAddr) {
        let now = self.now();
        self.stats.link_breaks += 1;
        self.routes.forget_neighbor(neighbor);
        self.link_filter.reset(neighbor);

        let affected = self.routes.routes_via(neighbor);
        if affected.is_empty() {
            return;
        }
        info!(
            node = %self.addr,
            neighbor = %neighbor,
            routes = affected.len(),
            "link broken"
        );

        let delete_period = self.config.delete_period();
        let mut fanout = ErrorFanout::new();
        for dst in affected {
            let repair = self.can_repair(dst);
            let Some(entry) = self.routes.lookup_mut(dst) else {
                continue;
            };
            let seqno = entry.seqno().wrapping_add(1);
            entry.set_seqno(seqno);

            if repair {
                self.start_repair(dst, neighbor);
                continue;
            }

            for target in entry.down(now, delete_period) {
                fanout.entry(target).or_default().push(UnreachableDestination {
                    address: dst,
                    seqno,
                });
            }
        }
        self.send_errors(fanout);
    }

    /// Route-cache sweep: down expired UP routes, drop stale entries and packets
    fn purge_routes(&mut self) {
        let now = self.now();
        let delete_period = self.config.delete_period();

        let mut fanout = ErrorFanout::new();
        for dst in self.routes.expired_up(now) {
            let Some(entry) = self.routes.lookup_mut(dst) else {
                continue;
            };
            let seqno = entry.seqno();
            debug!(node = %self.addr, dst = %dst, "route expired");
            for target in entry.down(now, delete_period) {
                fanout.entry(target).or_default().push(UnreachableDestination {
                    address: dst,
                    seqno,
                });
            }
        }
        self.send_errors(fanout);

        let removed = self.routes.purge(now);
        if removed > 0 {
            trace!(node = %self.addr, removed, "purged route entries");
        }

        let expired = self.queue.purge_expired(now);
        if !expired.is_empty() {
            self.stats.packets_dropped += expired.len() as u64;
            debug!(node = %self.addr, count = expired.len(), "queued packets timed out");
        }
    }

    /// Send one ERROR per neighbor listing everything it must hear about
    pub(crate) fn send_errors(&mut self, fanout: ErrorFanout) {
        for (target, unreachable) in fanout {
            debug!(
                node = %self.addr,
                to = %target,
                count = unreachable.len(),
                "sending route error"
            );
            self.stats.errors_sent += 1;
            self.env.send(
                Packet::Error(RouteError { unreachable }),
                LinkTarget::Unicast(target),
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::env::BufferedEnv;
    use aorglu_protocol::{RouteReply, RouteRequest};

    pub(crate) fn addr(n: u32) -> NodeAddr {
        NodeAddr::new(n)
    }

    pub(crate) fn create_test_engine(n: u32) -> ProtocolEngine<BufferedEnv> {
        ProtocolEngine::new(addr(n), ProtocolConfig::default(), BufferedEnv::new()).unwrap()
    }

    pub(crate) fn create_test_engine_with(
        n: u32,
        config: ProtocolConfig,
    ) -> ProtocolEngine<BufferedEnv> {
        ProtocolEngine::new(addr(n), config, BufferedEnv::new()).unwrap()
    }

    /// Give `engine` an UP route to `dst` through `next_hop`
    pub(crate) fn install_route(
        engine: &mut ProtocolEngine<BufferedEnv>,
        dst: u32,
        next_hop: u32,
        hops: u16,
    ) {
        let expire = engine.now() + Duration::from_secs(10);
        engine.offer_route(addr(dst), 2, hops, addr(next_hop), expire);
        engine.env_mut().take_outgoing();
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ProtocolConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(ProtocolEngine::new(addr(1), config, BufferedEnv::new()).is_err());
    }

    #[test]
    fn test_start_arms_periodic_timers() {
        let mut engine = create_test_engine(1);
        engine.start();
        engine.start();

        let env = engine.env();
        assert_eq!(env.scheduled().len(), 7);
        let beacon = env.armed(Timer::Beacon).unwrap();
        assert!(beacon.at >= Timestamp::from_millis(375));
        assert!(beacon.at <= Timestamp::from_millis(425));
        assert_eq!(
            env.armed(Timer::RoutePurge).unwrap().at,
            Timestamp::from_millis(500)
        );
    }

    #[test]
    fn test_beacon_rearms_and_broadcasts() {
        let mut engine = create_test_engine(1);
        engine.on_timer(Timer::Beacon);

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, LinkTarget::Broadcast);
        assert!(matches!(
            sent[0].packet,
            Packet::Beacon(Beacon { sender, .. }) if sender == addr(1)
        ));
        assert!(engine.env().armed(Timer::Beacon).is_some());
        assert_eq!(engine.stats().beacons_sent, 1);
    }

    #[test]
    fn test_beacon_refreshes_neighbor() {
        let mut engine = create_test_engine(1);
        engine.on_receive(
            addr(2),
            Packet::Beacon(Beacon {
                sender: addr(2),
                seqno: 0,
            }),
        );
        assert!(engine.neighbors().lookup(addr(2)));
    }

    #[test]
    fn test_send_data_to_self_is_delivered() {
        let mut engine = create_test_engine(1);
        engine.send_data(addr(1), b"loop".to_vec());
        assert_eq!(engine.env().delivered().len(), 1);
        assert!(engine.env().outgoing().is_empty());
    }

    #[test]
    fn test_send_data_without_route_queues_and_discovers() {
        let mut engine = create_test_engine(1);
        engine.send_data(addr(9), b"hello".to_vec());

        assert_eq!(engine.pending().len_for(addr(9)), 1);
        assert!(engine.communication_cache().is_active(addr(9)));
        assert!(engine.is_discovering(addr(9)));

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].packet, Packet::Request(_)));

        // A second packet does not start another search
        engine.send_data(addr(9), b"again".to_vec());
        assert!(engine.env().outgoing().is_empty());
        assert_eq!(engine.pending().len_for(addr(9)), 2);
    }

    #[test]
    fn test_send_data_with_route_forwards() {
        let mut engine = create_test_engine(1);
        install_route(&mut engine, 9, 2, 3);
        engine.send_data(addr(9), b"hello".to_vec());

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, LinkTarget::Unicast(addr(2)));
        assert!(matches!(&sent[0].packet, Packet::Data(d) if d.payload == b"hello"));
    }

    #[test]
    fn test_transit_data_records_relay_and_refreshes_route() {
        let mut engine = create_test_engine(2);
        install_route(&mut engine, 9, 3, 2);
        engine.env_mut().set_now(Timestamp::from_secs(5));

        let data = DataPacket::new(addr(1), addr(9), b"x".to_vec());
        engine.on_receive(addr(1), Packet::Data(data));

        let entry = engine.route_table().lookup(addr(9)).unwrap();
        assert!(entry.relays().contains(&addr(1)));
        assert_eq!(entry.expire(), Timestamp::from_secs(15));
        assert!(engine.neighbors().lookup(addr(1)));

        let sent = engine.env_mut().take_outgoing();
        match &sent[0].packet {
            Packet::Data(d) => assert_eq!(d.ttl, aorglu_protocol::packet::DEFAULT_DATA_TTL - 1),
            other => panic!("unexpected packet {:?}", other),
        }
        assert_eq!(engine.stats().data_forwarded, 1);
    }

    #[test]
    fn test_transit_data_without_route_sends_error_back() {
        let mut engine = create_test_engine(2);
        let data = DataPacket::new(addr(1), addr(9), b"x".to_vec());
        engine.on_receive(addr(1), Packet::Data(data));

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, LinkTarget::Unicast(addr(1)));
        match &sent[0].packet {
            Packet::Error(err) => assert_eq!(err.unreachable[0].address, addr(9)),
            other => panic!("unexpected packet {:?}", other),
        }
        assert_eq!(engine.stats().packets_dropped, 1);
    }

    #[test]
    fn test_data_ttl_exhausted_is_dropped() {
        let mut engine = create_test_engine(2);
        install_route(&mut engine, 9, 3, 2);
        let mut data = DataPacket::new(addr(1), addr(9), vec![]);
        data.ttl = 1;
        engine.on_receive(addr(1), Packet::Data(data));

        assert!(engine.env().outgoing().is_empty());
        assert_eq!(engine.stats().packets_dropped, 1);
    }

    #[test]
    fn test_data_for_us_is_delivered() {
        let mut engine = create_test_engine(9);
        let data = DataPacket::new(addr(1), addr(9), b"hi".to_vec());
        engine.on_receive(addr(3), Packet::Data(data.clone()));

        assert_eq!(engine.env().delivered(), &[data]);
        assert!(engine.communication_cache().is_active(addr(1)));
    }

    #[test]
    fn test_malformed_bytes_change_nothing() {
        let mut engine = create_test_engine(1);
        let result = engine.on_receive_bytes(addr(2), &[0u8; 5]);
        assert!(result.is_err());
        assert_eq!(engine.stats().malformed_packets, 1);
        assert!(engine.route_table().is_empty());
        assert!(engine.neighbors().is_empty());
    }

    #[test]
    fn test_framed_packet_is_handled() {
        let mut engine = create_test_engine(1);
        let bytes = aorglu_protocol::encode(&Packet::Beacon(Beacon {
            sender: addr(2),
            seqno: 4,
        }))
        .unwrap();
        engine.on_receive_bytes(addr(2), &bytes).unwrap();
        assert!(engine.neighbors().lookup(addr(2)));
    }

    #[test]
    fn test_neighbor_expiry_downs_routes_once() {
        let config = ProtocolConfig {
            local_repair: false,
            ..Default::default()
        };
        let mut engine = create_test_engine_with(2, config);
        engine.on_receive(
            addr(3),
            Packet::Beacon(Beacon {
                sender: addr(3),
                seqno: 0,
            }),
        );
        install_route(&mut engine, 9, 3, 2);
        install_route(&mut engine, 8, 3, 3);
        engine.routes.lookup_mut(addr(9)).unwrap().add_precursor(addr(1));
        engine.routes.lookup_mut(addr(8)).unwrap().add_precursor(addr(1));

        engine.env_mut().set_now(Timestamp::from_millis(1500));
        engine.on_timer(Timer::NeighborPurge);

        assert!(!engine.neighbors().lookup(addr(3)));
        assert_eq!(engine.stats().link_breaks, 1);
        let entry = engine.route_table().lookup(addr(9)).unwrap();
        assert_eq!(entry.state(), RouteState::Down);
        assert_eq!(entry.seqno(), 3);

        // One ERROR to the shared precursor, naming both destinations
        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, LinkTarget::Unicast(addr(1)));
        match &sent[0].packet {
            Packet::Error(err) => {
                let mut names: Vec<_> = err.unreachable.iter().map(|u| u.address).collect();
                names.sort();
                assert_eq!(names, vec![addr(8), addr(9)]);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        // A second sweep finds nothing more to do
        engine.on_timer(Timer::NeighborPurge);
        assert!(engine.env().outgoing().is_empty());
    }

    #[test]
    fn test_route_purge_downs_expired_routes() {
        let mut engine = create_test_engine(2);
        install_route(&mut engine, 9, 3, 2);
        engine.routes.lookup_mut(addr(9)).unwrap().add_precursor(addr(1));

        engine.env_mut().set_now(Timestamp::from_secs(10));
        engine.on_timer(Timer::RoutePurge);
        assert_eq!(
            engine.route_table().lookup(addr(9)).unwrap().state(),
            RouteState::Down
        );
        assert_eq!(engine.stats().errors_sent, 1);

        // Removed once the delete period has passed
        engine.env_mut().set_now(Timestamp::from_secs(13));
        engine.on_timer(Timer::RoutePurge);
        assert!(engine.route_table().lookup(addr(9)).is_none());
    }

    #[test]
    fn test_link_failure_filter_is_consulted() {
        let config = ProtocolConfig {
            local_repair: false,
            link_failure_filter: crate::config::LinkFailurePolicy::ErrorWindow {
                max_errors: 2,
                window_ms: 1000,
            },
            ..Default::default()
        };
        let mut engine = create_test_engine_with(2, config);
        install_route(&mut engine, 9, 3, 2);

        engine.on_link_failure(addr(3));
        assert!(engine.route_table().lookup(addr(9)).unwrap().is_up());
        engine.on_link_failure(addr(3));
        assert!(!engine.route_table().lookup(addr(9)).unwrap().is_up());
    }

    #[test]
    fn test_reply_with_infinite_hop_count_rejected() {
        let mut engine = create_test_engine(1);
        engine.send_data(addr(9), b"a".to_vec());
        engine.env_mut().take_outgoing();

        engine.on_receive(
            addr(2),
            Packet::Reply(RouteReply {
                destination: addr(9),
                destination_seq: 2,
                originator: addr(1),
                hop_count: INFINITE_HOPS,
                lifetime_ms: 10_000,
                timestamp: Timestamp::ZERO,
            }),
        );

        assert!(engine
            .route_table()
            .lookup(addr(9))
            .map_or(true, |r| !r.is_up()));
        assert!(engine.is_discovering(addr(9)));
        assert_eq!(engine.pending().len(), 1);
        assert!(engine.env().outgoing().is_empty());
    }

    #[test]
    fn test_large_hop_count_below_sentinel_is_usable() {
        let mut engine = create_test_engine(1);
        install_route(&mut engine, 9, 2, 255);
        let entry = engine.route_table().lookup(addr(9)).unwrap();
        assert!(entry.is_up());
        assert_eq!(entry.hop_count(), 255);

        engine.send_data(addr(9), b"far".to_vec());
        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, LinkTarget::Unicast(addr(2)));
    }

    #[test]
    fn test_queue_flushed_when_reply_arrives() {
        let mut engine = create_test_engine(1);
        engine.send_data(addr(9), b"a".to_vec());
        engine.send_data(addr(9), b"b".to_vec());
        let request = match engine.env_mut().take_outgoing().remove(0).packet {
            Packet::Request(r) => r,
            other => panic!("unexpected packet {:?}", other),
        };
        let RouteRequest { timestamp, .. } = request;

        engine.on_receive(
            addr(2),
            Packet::Reply(RouteReply {
                destination: addr(9),
                destination_seq: 2,
                originator: addr(1),
                hop_count: 2,
                lifetime_ms: 10_000,
                timestamp,
            }),
        );

        assert!(!engine.is_discovering(addr(9)));
        assert!(engine.pending().is_empty());
        let payloads: Vec<Vec<u8>> = engine
            .env_mut()
            .take_outgoing()
            .into_iter()
            .filter_map(|o| match o.packet {
                Packet::Data(d) => Some(d.payload),
                _ => None,
            })
            .collect();
        assert_eq!(payloads, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
