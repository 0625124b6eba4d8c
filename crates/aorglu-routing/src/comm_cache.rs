//! Peers this node recently exchanged data with
//!
//! Location updates are only sent to these peers. Expiry is two-phase: an
//! active entry that runs out becomes inactive for one more save period and
//! is removed when that runs out too.

use aorglu_protocol::{NodeAddr, Timestamp};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunicationEntry {
    pub address: NodeAddr,
    pub active: bool,
    pub expire: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CommunicationCache {
    entries: HashMap<NodeAddr, CommunicationEntry>,
    save: Duration,
}

impl CommunicationCache {
    pub fn new(save: Duration) -> Self {
        CommunicationCache {
            entries: HashMap::new(),
            save,
        }
    }

    /// Record traffic to or from `address`
    pub fn mark_active(&mut self, address: NodeAddr, now: Timestamp) {
        self.entries.insert(
            address,
            CommunicationEntry {
                address,
                active: true,
                expire: now + self.save,
            },
        );
    }

    pub fn is_active(&self, address: NodeAddr) -> bool {
        self.entries.get(&address).is_some_and(|e| e.active)
    }

    pub fn get(&self, address: NodeAddr) -> Option<&CommunicationEntry> {
        self.entries.get(&address)
    }

    /// Active peers, sorted
    pub fn active(&self) -> Vec<NodeAddr> {
        let mut peers: Vec<NodeAddr> = self
            .entries
            .values()
            .filter(|e| e.active)
            .map(|e| e.address)
            .collect();
        peers.sort();
        peers
    }

    /// Demote expired active entries, drop expired inactive ones
    ///
    /// Returns the number of removed entries.
    pub fn purge_inactive(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        let save = self.save;
        self.entries.retain(|_, e| {
            if e.expire > now {
                return true;
            }
            if e.active {
                e.active = false;
                e.expire = now + save;
                return true;
            }
            false
        });
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
