//! Location advertisement
//!
//! Periodically tells active peers where this node is, so that a later
//! local repair toward us can be steered by position.

use crate::engine::ProtocolEngine;
use crate::env::{Environment, LinkTarget};
use aorglu_protocol::{LocationUpdate, NodeAddr, Packet};
use tracing::{debug, trace};

impl<E: Environment> ProtocolEngine<E> {
    /// Send our position to every active peer that is close enough
    pub(crate) fn advertise_location(&mut self) {
        let Some(me) = self.position else {
            return;
        };
        let now = self.now();
        let radius = self.config.location_update_radius;

        for peer in self.comm_cache.active() {
            if peer == self.addr {
                continue;
            }
            let eligible = match self.locations.lookup(peer, now) {
                Some(pos) => pos.distance_to(&me) <= radius,
                None => self.neighbors.lookup(peer),
            };
            if !eligible {
                continue;
            }

            let Some(next_hop) = self
                .routes
                .lookup(peer)
                .filter(|e| e.is_up())
                .and_then(|e| e.next_hop())
            else {
                trace!(node = %self.addr, peer = %peer, "no route for location update");
                continue;
            };

            let update = LocationUpdate {
                sender: self.addr,
                target: peer,
                position: me,
                timestamp: now,
                ttl: self.config.network_diameter,
            };
            debug!(node = %self.addr, peer = %peer, position = %me, "sending location update");
            self.stats.location_updates_sent += 1;
            self.env
                .send(Packet::LocationUpdate(update), LinkTarget::Unicast(next_hop));
        }
    }

    pub(crate) fn recv_location_update(&mut self, from: NodeAddr, update: LocationUpdate) {
        let now = self.now();
        if update.sender == self.addr {
            return;
        }

        self.locations
            .update(update.sender, update.position, update.timestamp, now);
        self.stats.location_updates_received += 1;

        if update.target == self.addr {
            return;
        }

        let ttl = update.ttl.saturating_sub(1);
        if ttl == 0 {
            return;
        }
        let Some(next_hop) = self
            .routes
            .lookup(update.target)
            .filter(|e| e.is_up())
            .and_then(|e| e.next_hop())
        else {
            self.stats.packets_dropped += 1;
            trace!(
                node = %self.addr,
                from = %from,
                target = %update.target,
                "no route to forward location update"
            );
            return;
        };

        self.env.send(
            Packet::LocationUpdate(LocationUpdate { ttl, ..update }),
            LinkTarget::Unicast(next_hop),
        );
    }
}
