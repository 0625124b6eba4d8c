//! Route table
//!
//! One [`RouteEntry`] per destination. Entries are only mutated through
//! [`RouteEntry::update`] (the freshness rule) and [`RouteEntry::down`];
//! the discovery bookkeeping fields are crate-internal and driven by the
//! engine.

use crate::error::{Result, RoutingError};
use aorglu_protocol::{NodeAddr, Timestamp};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

/// Hop count sentinel for an unknown or broken route
pub const INFINITE_HOPS: u16 = u16::MAX;

/// Slots in the discovery latency ring
pub const LATENCY_SLOTS: usize = 3;

/// Route state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteState {
    /// No usable route
    Down,
    /// Usable
    Up,
    /// Broken, a bounded local repair is in progress
    InRepair,
}

impl fmt::Display for RouteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteState::Down => write!(f, "DOWN"),
            RouteState::Up => write!(f, "UP"),
            RouteState::InRepair => write!(f, "IN_REPAIR"),
        }
    }
}

/// Result of offering new information to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The entry now reflects the offered route
    Accepted,
    /// The offer was older or longer than what is stored
    Stale,
}

impl UpdateOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UpdateOutcome::Accepted)
    }
}

/// Route to one destination
#[derive(Debug, Clone)]
pub struct RouteEntry {
    destination: NodeAddr,
    seqno: u32,
    hop_count: u16,
    /// Hop count the route had before it last went down
    last_hop_count: u16,
    next_hop: Option<NodeAddr>,
    state: RouteState,
    expire: Timestamp,

    /// Network-wide discovery attempts in the current search
    pub(crate) req_cnt: u32,
    /// No new discovery may start before this
    pub(crate) req_timeout: Timestamp,
    /// TTL of the most recent discovery attempt (0 = none yet)
    pub(crate) last_ttl: u8,

    latency: [u64; LATENCY_SLOTS],
    latency_index: usize,

    precursors: BTreeSet<NodeAddr>,
    relays: BTreeSet<NodeAddr>,
}

impl RouteEntry {
    /// Create a DOWN entry with no known sequence number
    pub fn new(destination: NodeAddr) -> Self {
        RouteEntry {
            destination,
            seqno: 0,
            hop_count: INFINITE_HOPS,
            last_hop_count: INFINITE_HOPS,
            next_hop: None,
            state: RouteState::Down,
            expire: Timestamp::ZERO,
            req_cnt: 0,
            req_timeout: Timestamp::ZERO,
            last_ttl: 0,
            latency: [0; LATENCY_SLOTS],
            latency_index: 0,
            precursors: BTreeSet::new(),
            relays: BTreeSet::new(),
        }
    }

    pub fn destination(&self) -> NodeAddr {
        self.destination
    }

    pub fn seqno(&self) -> u32 {
        self.seqno
    }

    pub fn hop_count(&self) -> u16 {
        self.hop_count
    }

    pub fn last_hop_count(&self) -> u16 {
        self.last_hop_count
    }

    pub fn next_hop(&self) -> Option<NodeAddr> {
        self.next_hop
    }

    pub fn state(&self) -> RouteState {
        self.state
    }

    pub fn expire(&self) -> Timestamp {
        self.expire
    }

    pub fn req_cnt(&self) -> u32 {
        self.req_cnt
    }

    pub fn last_ttl(&self) -> u8 {
        self.last_ttl
    }

    pub fn is_up(&self) -> bool {
        self.state == RouteState::Up
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expire <= now
    }

    /// Offer a route; applies the freshness rule
    ///
    /// Accepted iff the entry is DOWN, or `seqno` is newer, or `seqno` is equal
    /// and the path is no longer than the stored one. An IN_REPAIR entry is
    /// treated like a DOWN one, so any answer completes the repair.
    pub fn update(
        &mut self,
        seqno: u32,
        hop_count: u16,
        next_hop: NodeAddr,
        expire: Timestamp,
    ) -> UpdateOutcome {
        let accept = self.state != RouteState::Up
            || seqno > self.seqno
            || (seqno == self.seqno && hop_count <= self.hop_count);

        if !accept {
            return UpdateOutcome::Stale;
        }

        self.seqno = seqno;
        self.hop_count = hop_count;
        self.next_hop = Some(next_hop);
        self.state = RouteState::Up;
        self.expire = self.expire.max(expire);
        UpdateOutcome::Accepted
    }

    /// Invalidate the route
    ///
    /// The sequence number is kept for later freshness comparisons. Returns
    /// every precursor and relaying neighbor that must hear about it; both
    /// sets are left empty.
    pub fn down(&mut self, now: Timestamp, delete_period: Duration) -> Vec<NodeAddr> {
        if self.hop_count != INFINITE_HOPS {
            self.last_hop_count = self.hop_count;
        }
        self.hop_count = INFINITE_HOPS;
        self.state = RouteState::Down;
        self.expire = now + delete_period;

        let mut notify = std::mem::take(&mut self.precursors);
        notify.append(&mut self.relays);
        notify.into_iter().collect()
    }

    /// Mark the route as being repaired; it keeps its next hop for bookkeeping
    pub(crate) fn start_repair(&mut self) {
        if self.hop_count != INFINITE_HOPS {
            self.last_hop_count = self.hop_count;
        }
        self.state = RouteState::InRepair;
    }

    /// Adopt a sequence number learned from an error or a link break
    pub(crate) fn set_seqno(&mut self, seqno: u32) {
        self.seqno = seqno;
    }

    /// Extend the lifetime to at least `expire`
    pub(crate) fn extend(&mut self, expire: Timestamp) {
        self.expire = self.expire.max(expire);
    }

    /// Clear the discovery state after an answer arrived
    pub(crate) fn reset_discovery(&mut self) {
        self.req_cnt = 0;
        self.req_timeout = Timestamp::ZERO;
        self.last_ttl = self.hop_count.min(u8::MAX as u16) as u8;
    }

    pub fn precursors(&self) -> &BTreeSet<NodeAddr> {
        &self.precursors
    }

    pub fn relays(&self) -> &BTreeSet<NodeAddr> {
        &self.relays
    }

    pub(crate) fn add_precursor(&mut self, addr: NodeAddr) {
        self.precursors.insert(addr);
    }

    pub(crate) fn add_relay(&mut self, addr: NodeAddr) {
        self.relays.insert(addr);
    }

    /// Forget a neighbor in both usage sets
    pub(crate) fn forget_neighbor(&mut self, addr: NodeAddr) {
        self.precursors.remove(&addr);
        self.relays.remove(&addr);
    }

    /// Record the per-hop latency of a completed discovery
    pub fn record_latency(&mut self, per_hop: Duration) {
        self.latency[self.latency_index] = per_hop.as_millis() as u64;
        self.latency_index = (self.latency_index + 1) % LATENCY_SLOTS;
    }

    /// Mean of the recorded latencies, `default` when none are recorded
    pub fn per_hop_time(&self, default: Duration) -> Duration {
        let samples: Vec<u64> = self.latency.iter().copied().filter(|&l| l > 0).collect();
        if samples.is_empty() {
            return default;
        }
        Duration::from_millis(samples.iter().sum::<u64>() / samples.len() as u64)
    }
}

/// All routes known to a node
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: HashMap<NodeAddr, RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a DOWN entry; fails if one exists
    pub fn add(&mut self, destination: NodeAddr) -> Result<&mut RouteEntry> {
        if self.entries.contains_key(&destination) {
            return Err(RoutingError::DuplicateRoute(destination));
        }
        Ok(self
            .entries
            .entry(destination)
            .or_insert_with(|| RouteEntry::new(destination)))
    }

    pub fn lookup(&self, destination: NodeAddr) -> Option<&RouteEntry> {
        self.entries.get(&destination)
    }

    pub(crate) fn lookup_mut(&mut self, destination: NodeAddr) -> Option<&mut RouteEntry> {
        self.entries.get_mut(&destination)
    }

    /// Existing entry, or a freshly added DOWN one
    pub(crate) fn entry(&mut self, destination: NodeAddr) -> &mut RouteEntry {
        self.entries
            .entry(destination)
            .or_insert_with(|| RouteEntry::new(destination))
    }

    pub fn remove(&mut self, destination: NodeAddr) -> Option<RouteEntry> {
        self.entries.remove(&destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offer a route to an existing entry
    pub fn update(
        &mut self,
        destination: NodeAddr,
        seqno: u32,
        hop_count: u16,
        next_hop: NodeAddr,
        expire: Timestamp,
    ) -> Result<UpdateOutcome> {
        let entry = self
            .entries
            .get_mut(&destination)
            .ok_or(RoutingError::NoRoute(destination))?;
        Ok(entry.update(seqno, hop_count, next_hop, expire))
    }

    /// Invalidate a route, returning the neighbors to notify
    pub fn down(
        &mut self,
        destination: NodeAddr,
        now: Timestamp,
        delete_period: Duration,
    ) -> Result<Vec<NodeAddr>> {
        let entry = self
            .entries
            .get_mut(&destination)
            .ok_or(RoutingError::NoRoute(destination))?;
        Ok(entry.down(now, delete_period))
    }

    /// Destinations of UP routes whose next hop is `neighbor`, sorted
    pub fn routes_via(&self, neighbor: NodeAddr) -> Vec<NodeAddr> {
        let mut routes: Vec<NodeAddr> = self
            .entries
            .values()
            .filter(|e| e.is_up() && e.next_hop == Some(neighbor))
            .map(|e| e.destination)
            .collect();
        routes.sort();
        routes
    }

    /// Destinations of UP routes past their expiry, sorted
    pub fn expired_up(&self, now: Timestamp) -> Vec<NodeAddr> {
        let mut routes: Vec<NodeAddr> = self
            .entries
            .values()
            .filter(|e| e.is_up() && e.is_expired(now))
            .map(|e| e.destination)
            .collect();
        routes.sort();
        routes
    }

    /// Drop a lost neighbor from every precursor and relay set
    pub(crate) fn forget_neighbor(&mut self, neighbor: NodeAddr) {
        for entry in self.entries.values_mut() {
            entry.forget_neighbor(neighbor);
        }
    }

    /// Remove expired entries that are not being repaired
    ///
    /// Returns how many entries were removed.
    pub fn purge(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.state == RouteState::InRepair || !e.is_expired(now));
        before - self.entries.len()
    }
}
