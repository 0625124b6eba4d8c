//! Link-layer failure smoothing
//!
//! Decides whether a transmission failure reported by the link layer counts
//! as a broken link.

use crate::config::LinkFailurePolicy;
use aorglu_protocol::{NodeAddr, Timestamp};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Tracks recent failures per neighbor
#[derive(Debug, Clone)]
pub struct LinkFailureFilter {
    policy: LinkFailurePolicy,
    failures: HashMap<NodeAddr, VecDeque<Timestamp>>,
}

impl LinkFailureFilter {
    pub fn new(policy: LinkFailurePolicy) -> Self {
        LinkFailureFilter {
            policy,
            failures: HashMap::new(),
        }
    }

    /// Record a failed transmission to `neighbor`; true if the link is now considered broken
    pub fn record_failure(&mut self, neighbor: NodeAddr, now: Timestamp) -> bool {
        let (max_errors, window) = match self.policy {
            LinkFailurePolicy::Immediate => return true,
            LinkFailurePolicy::ErrorWindow {
                max_errors,
                window_ms,
            } => (max_errors as usize, Duration::from_millis(window_ms)),
        };

        let history = self.failures.entry(neighbor).or_default();
        history.push_back(now);
        while let Some(oldest) = history.front() {
            if now.saturating_duration_since(*oldest) >= window {
                history.pop_front();
            } else {
                break;
            }
        }

        if history.len() >= max_errors {
            self.failures.remove(&neighbor);
            true
        } else {
            false
        }
    }

    /// Forget the failure history of `neighbor`
    pub fn reset(&mut self, neighbor: NodeAddr) {
        self.failures.remove(&neighbor);
    }

    /// Failures currently counted against `neighbor`
    pub fn failure_count(&self, neighbor: NodeAddr) -> usize {
        self.failures.get(&neighbor).map_or(0, |h| h.len())
    }
}
