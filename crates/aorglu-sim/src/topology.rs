//! Who can hear whom

use aorglu_protocol::NodeAddr;
use std::collections::BTreeMap;
use std::time::Duration;

/// A bidirectional radio link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Propagation delay
    pub delay: Duration,
    pub active: bool,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1),
            active: true,
        }
    }
}

impl Link {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Link map keyed by the ordered address pair
#[derive(Debug, Clone, Default)]
pub struct Topology {
    links: BTreeMap<(NodeAddr, NodeAddr), Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each node linked to the next one in the slice
    pub fn chain(nodes: &[NodeAddr]) -> Self {
        let mut topo = Self::new();
        for pair in nodes.windows(2) {
            topo.add_link(pair[0], pair[1], Link::default());
        }
        topo
    }

    pub fn add_link(&mut self, a: NodeAddr, b: NodeAddr, link: Link) {
        self.links.insert(Self::canonical_pair(a, b), link);
    }

    pub fn remove_link(&mut self, a: NodeAddr, b: NodeAddr) -> Option<Link> {
        self.links.remove(&Self::canonical_pair(a, b))
    }

    pub fn get_link(&self, a: NodeAddr, b: NodeAddr) -> Option<&Link> {
        self.links.get(&Self::canonical_pair(a, b))
    }

    /// Switch an existing link on or off; returns false if there is no such link
    pub fn set_active(&mut self, a: NodeAddr, b: NodeAddr, active: bool) -> bool {
        match self.links.get_mut(&Self::canonical_pair(a, b)) {
            Some(link) => {
                link.active = active;
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, a: NodeAddr, b: NodeAddr) -> bool {
        self.get_link(a, b).is_some_and(|link| link.active)
    }

    /// Nodes reachable from `node` over active links, in address order
    pub fn neighbors(&self, node: NodeAddr) -> Vec<(NodeAddr, Link)> {
        let mut result: Vec<(NodeAddr, Link)> = self
            .links
            .iter()
            .filter(|(_, link)| link.active)
            .filter_map(|(&(a, b), &link)| {
                if a == node {
                    Some((b, link))
                } else if b == node {
                    Some((a, link))
                } else {
                    None
                }
            })
            .collect();
        result.sort_by_key(|(addr, _)| *addr);
        result
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    fn canonical_pair(a: NodeAddr, b: NodeAddr) -> (NodeAddr, NodeAddr) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
