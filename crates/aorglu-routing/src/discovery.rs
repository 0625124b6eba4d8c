//! Route discovery
//!
//! Expanding-ring search for routes: REQUEST flooding with duplicate
//! suppression, REPLY generation and forwarding, and ERROR processing.

use crate::engine::{ErrorFanout, ProtocolEngine};
use crate::env::{Environment, LinkTarget};
use crate::route_table::INFINITE_HOPS;
use crate::timer::Timer;
use aorglu_protocol::{
    NodeAddr, Packet, RouteError, RouteReply, RouteRequest, Timestamp, UnreachableDestination,
};
use std::time::Duration;
use tracing::{debug, info, trace};

impl<E: Environment> ProtocolEngine<E> {
    /// Start or continue the expanding-ring search for `dst`
    pub(crate) fn send_request(&mut self, dst: NodeAddr) {
        let now = self.now();
        let entry = self.routes.entry(dst);
        if entry.is_up() {
            return;
        }

        // Backing off after a failed search, or an attempt is still pending
        if entry.req_timeout > now {
            if !self.request_timers.contains_key(&dst) {
                let delay = now.saturating_duration_until(entry.req_timeout);
                let handle = self.env.schedule(delay, Timer::RequestRetry(dst));
                self.request_timers.insert(dst, handle);
            }
            return;
        }

        if entry.req_cnt >= self.config.rreq_retries {
            self.give_up(dst);
            return;
        }

        let last_hop_count = match entry.last_hop_count() {
            INFINITE_HOPS => 0,
            hops => hops.min(u8::MAX as u16) as u8,
        };
        let last = entry.last_ttl.max(last_hop_count);
        let ttl = if last == 0 {
            self.config.ttl_start
        } else if last < self.config.ttl_threshold && last < self.config.network_diameter {
            last.saturating_add(self.config.ttl_increment)
                .min(self.config.network_diameter)
        } else {
            entry.req_cnt += 1;
            self.config.network_diameter
        };
        entry.last_ttl = ttl;

        let per_hop = entry.per_hop_time(self.config.node_traversal_time());
        let mut timeout = per_hop * 2 * ttl as u32;
        if entry.req_cnt > 0 {
            timeout *= entry.req_cnt;
        }
        let timeout = timeout.min(self.config.max_rreq_timeout());
        entry.req_timeout = now + timeout;
        let req_timeout = entry.req_timeout;
        entry.extend(req_timeout);

        let floor = match entry.seqno() {
            0 => None,
            seqno => Some(seqno),
        };

        self.seqno = self.seqno.wrapping_add(2);
        self.broadcast_id = self.broadcast_id.wrapping_add(1);
        self.broadcast_ids.insert(self.addr, self.broadcast_id, now);

        let request = RouteRequest {
            originator: self.addr,
            originator_seq: self.seqno,
            destination: dst,
            destination_seq: floor,
            broadcast_id: self.broadcast_id,
            hop_count: 1,
            ttl,
            timestamp: now,
        };

        debug!(
            node = %self.addr,
            dst = %dst,
            ttl,
            bcast_id = self.broadcast_id,
            timeout_ms = timeout.as_millis() as u64,
            "sending route request"
        );
        self.stats.requests_sent += 1;
        self.env.send(Packet::Request(request), LinkTarget::Broadcast);

        if let Some(old) = self.request_timers.remove(&dst) {
            self.env.cancel(old);
        }
        let handle = self.env.schedule(timeout, Timer::RequestRetry(dst));
        self.request_timers.insert(dst, handle);
    }

    /// A discovery attempt timed out
    pub(crate) fn request_retry(&mut self, dst: NodeAddr) {
        self.request_timers.remove(&dst);

        let Some(entry) = self.routes.lookup_mut(dst) else {
            return;
        };
        if entry.is_up() {
            return;
        }
        if !self.queue.has_packets_for(dst) {
            trace!(node = %self.addr, dst = %dst, "nothing queued, search abandoned");
            entry.req_cnt = 0;
            entry.last_ttl = 0;
            return;
        }
        self.send_request(dst);
    }

    /// Retries exhausted: back off, drop queued packets, report upward
    fn give_up(&mut self, dst: NodeAddr) {
        let now = self.now();
        let backoff = now + self.config.max_rreq_timeout();
        if let Some(entry) = self.routes.lookup_mut(dst) {
            entry.req_cnt = 0;
            entry.last_ttl = 0;
            entry.req_timeout = backoff;
            entry.extend(backoff);
        }

        let dropped = self.queue.drop_for(dst);
        self.stats.packets_dropped += dropped.len() as u64;
        info!(
            node = %self.addr,
            dst = %dst,
            dropped = dropped.len(),
            "destination unreachable"
        );
        self.env.destination_unreachable(dst, dropped);
    }

    /// Advance our own sequence number past `floor`, keeping it even
    pub(crate) fn bump_own_seqno(&mut self, floor: u32) {
        self.seqno = self.seqno.max(floor).wrapping_add(1);
        if self.seqno % 2 == 1 {
            self.seqno = self.seqno.wrapping_add(1);
        }
    }

    /// Learn (or refresh) the route back to a flood's originator
    pub(crate) fn learn_reverse_route(
        &mut self,
        originator: NodeAddr,
        originator_seq: u32,
        hop_count: u16,
        from: NodeAddr,
    ) -> NodeAddr {
        let now = self.now();
        let expire = now + self.config.reverse_route_life();
        self.offer_route(originator, originator_seq, hop_count, from, expire);

        let entry = self.routes.entry(originator);
        entry.extend(expire);
        if entry.is_up() {
            entry.next_hop().unwrap_or(from)
        } else {
            from
        }
    }

    /// Reply on behalf of `dst` using our own UP route
    ///
    /// `reverse_hop` is our next hop toward the requester.
    pub(crate) fn reply_from_route(
        &mut self,
        dst: NodeAddr,
        originator: NodeAddr,
        reverse_hop: NodeAddr,
        timestamp: Timestamp,
    ) {
        let now = self.now();
        let Some(route) = self.routes.lookup_mut(dst) else {
            return;
        };
        let Some(forward_hop) = route.next_hop() else {
            return;
        };
        route.add_precursor(reverse_hop);
        let reply = RouteReply {
            destination: dst,
            destination_seq: route.seqno(),
            originator,
            hop_count: route.hop_count().saturating_add(1),
            lifetime_ms: lifetime_ms(now.saturating_duration_until(route.expire())),
            timestamp,
        };

        if let Some(reverse) = self.routes.lookup_mut(originator) {
            reverse.add_precursor(forward_hop);
        }
        self.send_reply(reply, reverse_hop);
    }

    /// Reply as the destination itself
    pub(crate) fn reply_as_destination(
        &mut self,
        originator: NodeAddr,
        floor: u32,
        reverse_hop: NodeAddr,
        timestamp: Timestamp,
    ) {
        self.bump_own_seqno(floor);
        let reply = RouteReply {
            destination: self.addr,
            destination_seq: self.seqno,
            originator,
            hop_count: 1,
            lifetime_ms: self.config.my_route_timeout_ms.min(u32::MAX as u64) as u32,
            timestamp,
        };
        self.send_reply(reply, reverse_hop);
    }

    fn send_reply(&mut self, reply: RouteReply, next_hop: NodeAddr) {
        debug!(
            node = %self.addr,
            dst = %reply.destination,
            to = %reply.originator,
            seqno = reply.destination_seq,
            hops = reply.hop_count,
            "sending route reply"
        );
        self.stats.replies_sent += 1;
        self.env.send(Packet::Reply(reply), LinkTarget::Unicast(next_hop));
    }

    pub(crate) fn recv_request(&mut self, from: NodeAddr, request: RouteRequest) {
        let now = self.now();
        if request.originator == self.addr {
            trace!(node = %self.addr, "ignoring own request");
            return;
        }
        if self
            .broadcast_ids
            .seen(request.originator, request.broadcast_id, now)
        {
            self.stats.duplicates_suppressed += 1;
            trace!(
                node = %self.addr,
                src = %request.originator,
                bcast_id = request.broadcast_id,
                "duplicate request"
            );
            return;
        }

        let reverse_hop = self.learn_reverse_route(
            request.originator,
            request.originator_seq,
            request.hop_count,
            from,
        );

        if request.destination == self.addr {
            self.reply_as_destination(
                request.originator,
                request.destination_seq.unwrap_or(0),
                reverse_hop,
                request.timestamp,
            );
            return;
        }

        let fresh_enough = self.routes.lookup(request.destination).is_some_and(|route| {
            route.is_up()
                && request
                    .destination_seq
                    .map_or(true, |floor| route.seqno() >= floor)
        });
        if fresh_enough {
            self.reply_from_route(
                request.destination,
                request.originator,
                reverse_hop,
                request.timestamp,
            );
            return;
        }

        let ttl = request.ttl.saturating_sub(1);
        if ttl == 0 {
            trace!(node = %self.addr, dst = %request.destination, "request ttl exhausted");
            return;
        }

        let known = self
            .routes
            .lookup(request.destination)
            .map(|e| e.seqno())
            .filter(|&s| s > 0);
        let floor = match (request.destination_seq, known) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        let forwarded = RouteRequest {
            destination_seq: floor,
            hop_count: request.hop_count.saturating_add(1),
            ttl,
            ..request
        };
        trace!(
            node = %self.addr,
            dst = %forwarded.destination,
            ttl,
            "rebroadcasting request"
        );
        self.stats.requests_forwarded += 1;
        self.env.send(Packet::Request(forwarded), LinkTarget::Broadcast);
    }

    pub(crate) fn recv_reply(&mut self, from: NodeAddr, reply: RouteReply) {
        let now = self.now();
        if reply.destination == self.addr {
            return;
        }

        let expire = now + Duration::from_millis(reply.lifetime_ms as u64);
        let outcome = self.offer_route(
            reply.destination,
            reply.destination_seq,
            reply.hop_count,
            from,
            expire,
        );
        if !outcome.is_accepted() {
            trace!(node = %self.addr, dst = %reply.destination, "stale reply");
            return;
        }

        if reply.originator == self.addr {
            if reply.hop_count > 0 {
                let per_hop =
                    now.saturating_duration_since(reply.timestamp) / reply.hop_count as u32;
                if let Some(entry) = self.routes.lookup_mut(reply.destination) {
                    entry.record_latency(per_hop);
                }
            }
            info!(
                node = %self.addr,
                dst = %reply.destination,
                hops = reply.hop_count,
                next_hop = %from,
                "route established"
            );
            return;
        }

        let Some(reverse_hop) = self
            .routes
            .lookup(reply.originator)
            .filter(|e| e.is_up())
            .and_then(|e| e.next_hop())
        else {
            self.stats.packets_dropped += 1;
            debug!(
                node = %self.addr,
                to = %reply.originator,
                "no reverse route for reply"
            );
            return;
        };

        if let Some(forward) = self.routes.lookup_mut(reply.destination) {
            forward.add_precursor(reverse_hop);
        }
        let active = self.config.active_route_timeout();
        if let Some(reverse) = self.routes.lookup_mut(reply.originator) {
            reverse.add_precursor(from);
            reverse.extend(now + active);
        }

        let forwarded = RouteReply {
            hop_count: reply.hop_count.saturating_add(1),
            ..reply
        };
        self.stats.replies_forwarded += 1;
        self.env
            .send(Packet::Reply(forwarded), LinkTarget::Unicast(reverse_hop));
    }

    pub(crate) fn recv_error(&mut self, from: NodeAddr, error: RouteError) {
        let now = self.now();
        let delete_period = self.config.delete_period();
        let mut fanout = ErrorFanout::new();

        for unreachable in error.unreachable {
            let Some(entry) = self.routes.lookup_mut(unreachable.address) else {
                continue;
            };
            if !entry.is_up()
                || entry.next_hop() != Some(from)
                || entry.seqno() > unreachable.seqno
            {
                continue;
            }

            debug!(
                node = %self.addr,
                dst = %unreachable.address,
                from = %from,
                "route invalidated by error"
            );
            entry.set_seqno(unreachable.seqno);
            for target in entry.down(now, delete_period) {
                fanout.entry(target).or_default().push(UnreachableDestination {
                    address: unreachable.address,
                    seqno: unreachable.seqno,
                });
            }
        }

        self.send_errors(fanout);
    }
}

fn lifetime_ms(remaining: Duration) -> u32 {
    remaining.as_millis().min(u32::MAX as u128) as u32
}

#[cfg(test)]
mod tests {
    use crate::config::ProtocolConfig;
    use crate::engine::tests::{addr, create_test_engine, create_test_engine_with, install_route};
    use crate::env::LinkTarget;
    use crate::route_table::RouteState;
    use crate::timer::Timer;
    use aorglu_protocol::{
        Packet, RouteError, RouteReply, RouteRequest, Timestamp, UnreachableDestination,
    };
    use std::time::Duration;

    fn request(originator: u32, dst: u32, bcast_id: u32, hop_count: u16, ttl: u8) -> RouteRequest {
        RouteRequest {
            originator: addr(originator),
            originator_seq: 2,
            destination: addr(dst),
            destination_seq: None,
            broadcast_id: bcast_id,
            hop_count,
            ttl,
            timestamp: Timestamp::ZERO,
        }
    }

    fn sent_requests(sent: &[crate::env::Outgoing]) -> Vec<RouteRequest> {
        sent.iter()
            .filter_map(|o| match &o.packet {
                Packet::Request(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_expanding_ring_ttl_sequence() {
        let mut engine = create_test_engine(1);
        engine.send_data(addr(9), b"x".to_vec());

        let mut ttls = Vec::new();
        for _ in 0..6 {
            let sent = engine.env_mut().take_outgoing();
            ttls.extend(sent_requests(&sent).iter().map(|r| r.ttl));
            let retry = engine.env().armed(Timer::RequestRetry(addr(9)));
            let Some(retry) = retry else { break };
            engine.env_mut().set_now(retry.at);
            engine.on_timer(Timer::RequestRetry(addr(9)));
        }

        assert_eq!(ttls, vec![5, 7, 30, 30, 30]);
        let unreachable = engine.env().unreachable();
        assert_eq!(unreachable.len(), 1);
        assert_eq!(unreachable[0].destination, addr(9));
        assert_eq!(unreachable[0].dropped.len(), 1);
        assert!(engine.pending().is_empty());

        let entry = engine.route_table().lookup(addr(9)).unwrap();
        assert_eq!(entry.req_cnt(), 0);
        assert_eq!(entry.last_ttl(), 0);
    }

    #[test]
    fn test_ttl_capped_at_diameter_still_gives_up() {
        let mut engine = create_test_engine(1);
        // A threshold the ring can never reach
        engine.config.ttl_threshold = 40;
        engine.send_data(addr(9), b"x".to_vec());

        let mut ttls = Vec::new();
        for _ in 0..30 {
            let sent = engine.env_mut().take_outgoing();
            ttls.extend(sent_requests(&sent).iter().map(|r| r.ttl));
            if !engine.env().unreachable().is_empty() {
                break;
            }
            let retry = engine.env().armed(Timer::RequestRetry(addr(9))).unwrap();
            engine.env_mut().set_now(retry.at);
            engine.on_timer(Timer::RequestRetry(addr(9)));
        }

        let mut expected: Vec<u8> = (5..=29).step_by(2).collect();
        expected.extend([30, 30, 30, 30]);
        assert_eq!(ttls, expected);
        assert_eq!(engine.env().unreachable().len(), 1);
        assert!(engine.pending().is_empty());
    }

    #[test]
    fn test_retransmit_timeout_grows() {
        let mut engine = create_test_engine(1);
        engine.send_data(addr(9), b"x".to_vec());
        // 2 * 5 * 30ms
        let first = engine.env().armed(Timer::RequestRetry(addr(9))).unwrap();
        assert_eq!(first.at, Timestamp::from_millis(300));

        engine.env_mut().set_now(first.at);
        engine.on_timer(Timer::RequestRetry(addr(9)));
        // 2 * 7 * 30ms
        let second = engine.env().armed(Timer::RequestRetry(addr(9))).unwrap();
        assert_eq!(second.at, Timestamp::from_millis(300 + 420));

        engine.env_mut().set_now(second.at);
        engine.on_timer(Timer::RequestRetry(addr(9)));
        // 2 * 30 * 30ms * req_cnt 1
        let third = engine.env().armed(Timer::RequestRetry(addr(9))).unwrap();
        assert_eq!(third.at, Timestamp::from_millis(720 + 1800));
    }

    #[test]
    fn test_own_seqno_advances_by_two() {
        let mut engine = create_test_engine(1);
        engine.send_data(addr(9), b"x".to_vec());
        let sent = engine.env_mut().take_outgoing();
        let req = &sent_requests(&sent)[0];
        assert_eq!(req.originator_seq, 2);
        assert_eq!(req.hop_count, 1);
        assert_eq!(engine.seqno(), 2);
    }

    #[test]
    fn test_backoff_after_give_up() {
        let config = ProtocolConfig {
            rreq_retries: 1,
            ..Default::default()
        };
        let mut engine = create_test_engine_with(1, config);
        engine.send_data(addr(9), b"x".to_vec());
        for _ in 0..3 {
            let retry = engine.env().armed(Timer::RequestRetry(addr(9))).unwrap();
            engine.env_mut().set_now(retry.at);
            engine.on_timer(Timer::RequestRetry(addr(9)));
        }
        assert_eq!(engine.env().unreachable().len(), 1);
        let gave_up_at = engine.now();
        engine.env_mut().take_outgoing();

        // New traffic during the backoff waits for it to end
        engine.send_data(addr(9), b"y".to_vec());
        assert!(engine.env().outgoing().is_empty());
        let retry = engine.env().armed(Timer::RequestRetry(addr(9))).unwrap();
        assert_eq!(retry.at, gave_up_at + Duration::from_secs(10));

        engine.env_mut().set_now(retry.at);
        engine.on_timer(Timer::RequestRetry(addr(9)));
        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent_requests(&sent)[0].ttl, 5);
    }

    #[test]
    fn test_duplicate_request_suppressed() {
        let mut engine = create_test_engine(2);
        let req = request(1, 9, 7, 1, 5);
        engine.on_receive(addr(1), Packet::Request(req.clone()));
        engine.on_receive(addr(3), Packet::Request(req));

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent_requests(&sent).len(), 1);
        assert_eq!(engine.stats().duplicates_suppressed, 1);
    }

    #[test]
    fn test_request_builds_reverse_route_and_rebroadcasts() {
        let mut engine = create_test_engine(2);
        engine.on_receive(addr(1), Packet::Request(request(1, 9, 1, 1, 5)));

        let reverse = engine.route_table().lookup(addr(1)).unwrap();
        assert!(reverse.is_up());
        assert_eq!(reverse.next_hop(), Some(addr(1)));
        assert_eq!(reverse.hop_count(), 1);
        assert_eq!(reverse.expire(), Timestamp::from_millis(6000));

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent[0].target, LinkTarget::Broadcast);
        let fwd = &sent_requests(&sent)[0];
        assert_eq!(fwd.ttl, 4);
        assert_eq!(fwd.hop_count, 2);
    }

    #[test]
    fn test_request_with_exhausted_ttl_not_rebroadcast() {
        let mut engine = create_test_engine(2);
        engine.on_receive(addr(1), Packet::Request(request(1, 9, 1, 1, 1)));
        assert!(engine.env().outgoing().is_empty());
        // The reverse route is still learned
        assert!(engine.route_table().lookup(addr(1)).unwrap().is_up());
    }

    #[test]
    fn test_destination_replies_with_even_seqno() {
        let mut engine = create_test_engine(9);
        let mut req = request(1, 9, 1, 3, 5);
        req.destination_seq = Some(6);
        engine.on_receive(addr(4), Packet::Request(req));

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, LinkTarget::Unicast(addr(4)));
        match &sent[0].packet {
            Packet::Reply(rep) => {
                assert_eq!(rep.destination, addr(9));
                assert_eq!(rep.originator, addr(1));
                assert_eq!(rep.destination_seq, 8);
                assert_eq!(rep.hop_count, 1);
                assert_eq!(rep.lifetime_ms, 10_000);
            }
            other => panic!("unexpected packet {:?}", other),
        }
        assert_eq!(engine.seqno(), 8);
    }

    #[test]
    fn test_intermediate_reply_inserts_precursors() {
        let mut engine = create_test_engine(2);
        install_route(&mut engine, 9, 3, 2);
        engine.on_receive(addr(1), Packet::Request(request(1, 9, 1, 1, 5)));

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        match &sent[0].packet {
            Packet::Reply(rep) => {
                assert_eq!(rep.hop_count, 3);
                assert_eq!(rep.destination_seq, 2);
                assert_eq!(rep.lifetime_ms, 10_000);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        let forward = engine.route_table().lookup(addr(9)).unwrap();
        assert!(forward.precursors().contains(&addr(1)));
        let reverse = engine.route_table().lookup(addr(1)).unwrap();
        assert!(reverse.precursors().contains(&addr(3)));
    }

    #[test]
    fn test_stale_route_does_not_answer() {
        let mut engine = create_test_engine(2);
        install_route(&mut engine, 9, 3, 2);
        let mut req = request(1, 9, 1, 1, 5);
        req.destination_seq = Some(4);
        engine.on_receive(addr(1), Packet::Request(req));

        let sent = engine.env_mut().take_outgoing();
        let fwd = &sent_requests(&sent)[0];
        assert_eq!(fwd.destination_seq, Some(4));
    }

    #[test]
    fn test_reply_forwarded_along_reverse_route() {
        let mut engine = create_test_engine(2);
        engine.on_receive(addr(1), Packet::Request(request(1, 9, 1, 1, 5)));
        engine.env_mut().take_outgoing();

        engine.on_receive(
            addr(3),
            Packet::Reply(RouteReply {
                destination: addr(9),
                destination_seq: 4,
                originator: addr(1),
                hop_count: 1,
                lifetime_ms: 10_000,
                timestamp: Timestamp::ZERO,
            }),
        );

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, LinkTarget::Unicast(addr(1)));
        match &sent[0].packet {
            Packet::Reply(rep) => assert_eq!(rep.hop_count, 2),
            other => panic!("unexpected packet {:?}", other),
        }

        let forward = engine.route_table().lookup(addr(9)).unwrap();
        assert!(forward.is_up());
        assert_eq!(forward.next_hop(), Some(addr(3)));
        assert!(forward.precursors().contains(&addr(1)));
        assert_eq!(engine.stats().replies_forwarded, 1);
    }

    #[test]
    fn test_reply_records_latency_at_requester() {
        let mut engine = create_test_engine(1);
        engine.send_data(addr(9), b"x".to_vec());
        engine.env_mut().set_now(Timestamp::from_millis(120));
        engine.on_receive(
            addr(2),
            Packet::Reply(RouteReply {
                destination: addr(9),
                destination_seq: 2,
                originator: addr(1),
                hop_count: 3,
                lifetime_ms: 10_000,
                timestamp: Timestamp::ZERO,
            }),
        );

        let entry = engine.route_table().lookup(addr(9)).unwrap();
        assert_eq!(entry.per_hop_time(Duration::from_millis(30)), Duration::from_millis(40));
        assert_eq!(entry.last_ttl(), 3);
        assert_eq!(entry.req_cnt(), 0);
    }

    #[test]
    fn test_error_from_next_hop_downs_route() {
        let mut engine = create_test_engine(2);
        install_route(&mut engine, 9, 3, 2);
        engine.routes.lookup_mut(addr(9)).unwrap().add_precursor(addr(1));

        engine.on_receive(
            addr(3),
            Packet::Error(RouteError {
                unreachable: vec![UnreachableDestination {
                    address: addr(9),
                    seqno: 5,
                }],
            }),
        );

        let entry = engine.route_table().lookup(addr(9)).unwrap();
        assert_eq!(entry.state(), RouteState::Down);
        assert_eq!(entry.seqno(), 5);

        let sent = engine.env_mut().take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, LinkTarget::Unicast(addr(1)));
    }

    #[test]
    fn test_error_from_other_neighbor_ignored() {
        let mut engine = create_test_engine(2);
        install_route(&mut engine, 9, 3, 2);
        let error = RouteError {
            unreachable: vec![UnreachableDestination {
                address: addr(9),
                seqno: 5,
            }],
        };
        engine.on_receive(addr(4), Packet::Error(error));
        assert!(engine.route_table().lookup(addr(9)).unwrap().is_up());

        // Older sequence number than ours
        let error = RouteError {
            unreachable: vec![UnreachableDestination {
                address: addr(9),
                seqno: 1,
            }],
        };
        engine.on_receive(addr(3), Packet::Error(error));
        assert!(engine.route_table().lookup(addr(9)).unwrap().is_up());
    }
}
