//! One-hop neighbor liveness

use aorglu_protocol::{NodeAddr, Timestamp};
use std::collections::HashMap;
use std::time::Duration;

/// A neighbor heard from recently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborEntry {
    pub address: NodeAddr,
    /// When the neighbor is considered gone unless heard from again
    pub expire: Timestamp,
}

impl NeighborEntry {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expire <= now
    }
}

/// Neighbors refreshed by beacons and data, swept periodically
#[derive(Debug, Clone)]
pub struct NeighborCache {
    entries: HashMap<NodeAddr, NeighborEntry>,
    /// Allowed beacon loss times the beacon interval
    lifetime: Duration,
}

impl NeighborCache {
    pub fn new(lifetime: Duration) -> Self {
        NeighborCache {
            entries: HashMap::new(),
            lifetime,
        }
    }

    /// Insert or refresh a neighbor; returns true if it was not known
    pub fn insert(&mut self, address: NodeAddr, now: Timestamp) -> bool {
        let expire = now + self.lifetime;
        match self.entries.get_mut(&address) {
            Some(entry) => {
                entry.expire = expire;
                false
            }
            None => {
                self.entries.insert(address, NeighborEntry { address, expire });
                true
            }
        }
    }

    pub fn lookup(&self, address: NodeAddr) -> bool {
        self.entries.contains_key(&address)
    }

    pub fn get(&self, address: NodeAddr) -> Option<&NeighborEntry> {
        self.entries.get(&address)
    }

    pub fn delete(&mut self, address: NodeAddr) -> bool {
        self.entries.remove(&address).is_some()
    }

    /// Remove stale neighbors; each returned address is a broken link
    pub fn purge(&mut self, now: Timestamp) -> Vec<NodeAddr> {
        let mut lost: Vec<NodeAddr> = self
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.address)
            .collect();
        lost.sort();
        for addr in &lost {
            self.entries.remove(addr);
        }
        lost
    }

    /// Current neighbors, sorted
    pub fn addresses(&self) -> Vec<NodeAddr> {
        let mut addrs: Vec<NodeAddr> = self.entries.keys().copied().collect();
        addrs.sort();
        addrs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
