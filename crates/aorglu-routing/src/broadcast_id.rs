//! Flood duplicate suppression

use aorglu_protocol::{NodeAddr, Timestamp};
use std::collections::HashMap;
use std::time::Duration;

/// Recently processed (source, broadcast id) pairs
#[derive(Debug, Clone)]
pub struct BroadcastIdCache {
    entries: HashMap<(NodeAddr, u32), Timestamp>,
    save: Duration,
}

impl BroadcastIdCache {
    pub fn new(save: Duration) -> Self {
        BroadcastIdCache {
            entries: HashMap::new(),
            save,
        }
    }

    pub fn insert(&mut self, source: NodeAddr, id: u32, now: Timestamp) {
        self.entries.insert((source, id), now + self.save);
    }

    /// Whether the pair was processed within the save window
    pub fn lookup(&self, source: NodeAddr, id: u32, now: Timestamp) -> bool {
        self.entries
            .get(&(source, id))
            .is_some_and(|expire| *expire > now)
    }

    /// Check-then-insert: true means the pair is a duplicate and must be dropped
    pub fn seen(&mut self, source: NodeAddr, id: u32, now: Timestamp) -> bool {
        if self.lookup(source, id, now) {
            return true;
        }
        self.insert(source, id, now);
        false
    }

    /// Remove expired pairs, returning how many were removed
    pub fn purge(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expire| *expire > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
