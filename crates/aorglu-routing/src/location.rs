//! Positions of other nodes, learned from location updates

use crate::config::LocationCachePolicy;
use aorglu_protocol::{NodeAddr, Position, Timestamp};
use std::collections::HashMap;
use std::time::Duration;

/// Last known position of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationEntry {
    pub address: NodeAddr,
    pub position: Position,
    /// When the sample was taken by its sender
    pub timestamp: Timestamp,
    /// `None` under the permanent policy
    pub expire: Option<Timestamp>,
}

impl LocationEntry {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expire.is_some_and(|expire| expire <= now)
    }
}

/// Location cache, last writer wins
#[derive(Debug, Clone)]
pub struct LocationCache {
    policy: LocationCachePolicy,
    entries: HashMap<NodeAddr, LocationEntry>,
}

impl LocationCache {
    pub fn new(policy: LocationCachePolicy) -> Self {
        LocationCache {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn policy(&self) -> LocationCachePolicy {
        self.policy
    }

    /// Store the newest sample for `address`; ignored when caching is disabled
    pub fn update(
        &mut self,
        address: NodeAddr,
        position: Position,
        timestamp: Timestamp,
        now: Timestamp,
    ) {
        let expire = match self.policy {
            LocationCachePolicy::Disabled => return,
            LocationCachePolicy::Expire { lifetime_ms } => {
                Some(now + Duration::from_millis(lifetime_ms))
            }
            LocationCachePolicy::Permanent => None,
        };
        self.entries.insert(
            address,
            LocationEntry {
                address,
                position,
                timestamp,
                expire,
            },
        );
    }

    /// Position of `address`, if known and not stale
    pub fn lookup(&self, address: NodeAddr, now: Timestamp) -> Option<Position> {
        self.entries
            .get(&address)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.position)
    }

    pub fn remove(&mut self, address: NodeAddr) -> Option<LocationEntry> {
        self.entries.remove(&address)
    }

    /// Remove stale entries, returning how many were removed
    pub fn purge(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
