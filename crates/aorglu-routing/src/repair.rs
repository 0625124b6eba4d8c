//! Location-biased local repair
//!
//! When a link under an active route breaks, the upstream node tries to
//! reach the destination again on its own before telling anyone. The
//! REPAIR flood is steered toward the destination's last known position:
//! a relay only rebroadcasts if it is closer to that position than the node
//! it heard the packet from. Success is an ordinary REPLY accepted for the
//! repairing entry; failure is the repair window running out.

use crate::engine::{ErrorFanout, ProtocolEngine};
use crate::env::{Environment, LinkTarget};
use crate::route_table::{RouteState, INFINITE_HOPS};
use crate::timer::{Timer, TimerHandle};
use aorglu_protocol::{NodeAddr, Packet, RepairRequest, UnreachableDestination};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Bookkeeping for one repair in progress
#[derive(Debug, Clone)]
pub struct RepairAttempt {
    /// Next hop whose link failed
    pub broken_next_hop: NodeAddr,
    /// REPAIR transmissions so far, the first one included
    pub transmissions: u32,
    pub retransmit: Option<TimerHandle>,
    pub window: TimerHandle,
}

impl<E: Environment> ProtocolEngine<E> {
    /// Whether the route to `dst` qualifies for local repair
    pub(crate) fn can_repair(&self, dst: NodeAddr) -> bool {
        if !self.config.local_repair {
            return false;
        }
        let Some(entry) = self.routes.lookup(dst) else {
            return false;
        };
        let in_use = !entry.precursors().is_empty()
            || !entry.relays().is_empty()
            || self.comm_cache.is_active(dst);
        entry.hop_count() <= self.config.max_repair_hops && in_use
    }

    pub(crate) fn start_repair(&mut self, dst: NodeAddr, broken_next_hop: NodeAddr) {
        let Some(entry) = self.routes.lookup_mut(dst) else {
            return;
        };
        entry.start_repair();
        self.stats.repairs_started += 1;

        let window = self.env.schedule(
            Duration::from_millis(self.config.repair_window_ms),
            Timer::RepairWindow(dst),
        );
        self.repairs.insert(
            dst,
            RepairAttempt {
                broken_next_hop,
                transmissions: 0,
                retransmit: None,
                window,
            },
        );
        info!(
            node = %self.addr,
            dst = %dst,
            broken = %broken_next_hop,
            "starting local repair"
        );
        self.send_repair(dst);
    }

    fn send_repair(&mut self, dst: NodeAddr) {
        let now = self.now();
        let Some(entry) = self.routes.lookup(dst) else {
            return;
        };
        let (floor, last_hops) = (entry.seqno(), entry.last_hop_count());
        let Some(attempt) = self.repairs.get_mut(&dst) else {
            return;
        };

        let hops = match last_hops {
            INFINITE_HOPS => 1,
            hops => hops.clamp(1, u8::MAX as u16) as u8,
        };
        let ttl = hops.saturating_add(self.config.local_add_ttl);

        self.broadcast_id = self.broadcast_id.wrapping_add(1);
        self.broadcast_ids.insert(self.addr, self.broadcast_id, now);

        let repair = RepairRequest {
            destination: dst,
            destination_seq: floor,
            origin: self.addr,
            origin_seq: self.seqno,
            broken_next_hop: attempt.broken_next_hop,
            repair_id: self.broadcast_id,
            target: self.locations.lookup(dst, now),
            relay_position: self.position,
            hop_count: 1,
            ttl,
            timestamp: now,
        };

        attempt.transmissions += 1;
        attempt.retransmit = if attempt.transmissions < self.config.max_repair_retries {
            Some(self.env.schedule(
                Duration::from_millis(self.config.repair_retransmit_ms),
                Timer::RepairRetransmit(dst),
            ))
        } else {
            None
        };

        debug!(
            node = %self.addr,
            dst = %dst,
            ttl,
            attempt = attempt.transmissions,
            target = ?repair.target,
            "sending repair request"
        );
        self.env.send(Packet::Repair(repair), LinkTarget::Broadcast);
    }

    pub(crate) fn repair_retransmit(&mut self, dst: NodeAddr) {
        let repairing = self
            .routes
            .lookup(dst)
            .is_some_and(|e| e.state() == RouteState::InRepair);
        let Some(attempt) = self.repairs.get_mut(&dst) else {
            return;
        };
        attempt.retransmit = None;
        if repairing {
            self.send_repair(dst);
        }
    }

    /// A REPLY brought the route back
    pub(crate) fn repair_succeeded(&mut self, dst: NodeAddr) {
        let Some(attempt) = self.repairs.remove(&dst) else {
            return;
        };
        self.cancel_repair_timers(&attempt);
        self.stats.repairs_succeeded += 1;
        info!(
            node = %self.addr,
            dst = %dst,
            attempts = attempt.transmissions,
            "local repair succeeded"
        );
    }

    /// The repair window ran out: down the route and tell everyone using it
    pub(crate) fn repair_window_expired(&mut self, dst: NodeAddr) {
        let Some(attempt) = self.repairs.remove(&dst) else {
            return;
        };
        self.cancel_repair_timers(&attempt);
        if let Some(handle) = self.request_timers.remove(&dst) {
            self.env.cancel(handle);
        }
        self.stats.repairs_failed += 1;

        let now = self.now();
        let delete_period = self.config.delete_period();
        let mut fanout = ErrorFanout::new();
        if let Some(entry) = self.routes.lookup_mut(dst) {
            let seqno = entry.seqno();
            for target in entry.down(now, delete_period) {
                fanout.entry(target).or_default().push(UnreachableDestination {
                    address: dst,
                    seqno,
                });
            }
        }
        info!(
            node = %self.addr,
            dst = %dst,
            notified = fanout.len(),
            "local repair failed"
        );
        self.send_errors(fanout);

        let dropped = self.queue.drop_for(dst);
        self.stats.packets_dropped += dropped.len() as u64;
        self.env.destination_unreachable(dst, dropped);
    }

    fn cancel_repair_timers(&mut self, attempt: &RepairAttempt) {
        if let Some(handle) = attempt.retransmit {
            self.env.cancel(handle);
        }
        self.env.cancel(attempt.window);
    }

    pub(crate) fn recv_repair(&mut self, from: NodeAddr, repair: RepairRequest) {
        let now = self.now();
        if repair.origin == self.addr {
            return;
        }
        if self.broadcast_ids.seen(repair.origin, repair.repair_id, now) {
            self.stats.duplicates_suppressed += 1;
            return;
        }

        let reverse_hop =
            self.learn_reverse_route(repair.origin, repair.origin_seq, repair.hop_count, from);

        if repair.destination == self.addr {
            self.reply_as_destination(
                repair.origin,
                repair.destination_seq,
                reverse_hop,
                repair.timestamp,
            );
            return;
        }

        let usable = self.routes.lookup(repair.destination).is_some_and(|route| {
            route.is_up()
                && route.seqno() >= repair.destination_seq
                && route
                    .next_hop()
                    .is_some_and(|hop| hop != from && hop != repair.broken_next_hop)
        });
        if usable {
            self.reply_from_route(
                repair.destination,
                repair.origin,
                reverse_hop,
                repair.timestamp,
            );
            return;
        }

        let ttl = repair.ttl.saturating_sub(1);
        if ttl == 0 {
            return;
        }

        if let (Some(target), Some(me), Some(relay)) =
            (repair.target, self.position, repair.relay_position)
        {
            if me.distance_to(&target) >= relay.distance_to(&target) {
                trace!(
                    node = %self.addr,
                    dst = %repair.destination,
                    "not closer to target, repair not relayed"
                );
                return;
            }
        }

        let relayed = RepairRequest {
            relay_position: self.position,
            hop_count: repair.hop_count.saturating_add(1),
            ttl,
            ..repair
        };
        self.stats.repairs_forwarded += 1;
        self.env.send(Packet::Repair(relayed), LinkTarget::Broadcast);
    }
}
