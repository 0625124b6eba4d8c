//! Protocol configuration
//!
//! Every tunable of the routing agent lives here. Defaults reproduce the
//! reference constants of the protocol; deployments override them from YAML.

use crate::error::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long positions learned from location updates are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationCachePolicy {
    /// Never cache positions; every lookup is unknown
    Disabled,
    /// Entries expire `lifetime_ms` after their last refresh
    Expire { lifetime_ms: u64 },
    /// Entries are only ever overwritten, never swept
    Permanent,
}

impl LocationCachePolicy {
    /// Map a signed lifetime in seconds onto a policy (`<= 0` disables caching)
    pub fn from_lifetime_secs(secs: f64) -> Self {
        if secs <= 0.0 {
            LocationCachePolicy::Disabled
        } else {
            LocationCachePolicy::Expire {
                lifetime_ms: (secs * 1000.0) as u64,
            }
        }
    }
}

impl Default for LocationCachePolicy {
    fn default() -> Self {
        LocationCachePolicy::Expire {
            lifetime_ms: 30_000,
        }
    }
}

/// Link-layer failure smoothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkFailurePolicy {
    /// Every reported transmission failure breaks the link
    Immediate,
    /// `max_errors` failures within `window_ms` break the link
    ErrorWindow { max_errors: u32, window_ms: u64 },
}

impl Default for LinkFailurePolicy {
    fn default() -> Self {
        LinkFailurePolicy::Immediate
    }
}

/// Beacon jitter as fractions of the beacon interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelloJitter {
    pub min: f64,
    pub max: f64,
}

impl Default for HelloJitter {
    fn default() -> Self {
        Self {
            min: 0.75,
            max: 0.85,
        }
    }
}

/// Routing agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Lifetime advertised by a destination answering for itself
    pub my_route_timeout_ms: u64,
    /// Lifetime extension applied whenever a route forwards data
    pub active_route_timeout_ms: u64,
    /// Minimum lifetime of a reverse route learned from a request
    pub reverse_route_life_ms: u64,
    /// How long a (source, broadcast id) pair suppresses duplicates
    pub broadcast_id_save_ms: u64,
    /// Route table sweep period
    pub route_purge_interval_ms: u64,
    /// How long a DOWN entry is kept before it can be purged
    pub delete_period_ms: u64,

    pub hello_interval_ms: u64,
    pub allowed_hello_loss: u32,
    pub hello_jitter: HelloJitter,

    pub node_traversal_time_ms: u64,
    pub network_diameter: u8,
    pub ttl_start: u8,
    pub ttl_increment: u8,
    pub ttl_threshold: u8,
    /// Network-wide discovery attempts before giving up
    pub rreq_retries: u32,
    pub max_rreq_timeout_ms: u64,

    pub local_repair: bool,
    /// Routes longer than this are not repaired locally
    pub max_repair_hops: u16,
    pub local_add_ttl: u8,
    pub repair_retransmit_ms: u64,
    pub repair_window_ms: u64,
    /// Repair transmissions per attempt, the first one included
    pub max_repair_retries: u32,

    #[serde(with = "serde_yaml::with::singleton_map")]
    pub location_cache: LocationCachePolicy,
    pub location_purge_interval_ms: u64,
    pub communication_cache_save_ms: u64,
    pub communication_purge_interval_ms: u64,
    pub location_update_interval_ms: u64,
    pub location_update_radius: f64,

    pub queue_capacity: usize,
    pub queue_timeout_ms: u64,

    #[serde(with = "serde_yaml::with::singleton_map")]
    pub link_failure_filter: LinkFailurePolicy,

    /// Seed for beacon jitter
    pub rng_seed: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            my_route_timeout_ms: 10_000,
            active_route_timeout_ms: 10_000,
            reverse_route_life_ms: 6_000,
            broadcast_id_save_ms: 6_000,
            route_purge_interval_ms: 500,
            delete_period_ms: 3_000,
            hello_interval_ms: 500,
            allowed_hello_loss: 3,
            hello_jitter: HelloJitter::default(),
            node_traversal_time_ms: 30,
            network_diameter: 30,
            ttl_start: 5,
            ttl_increment: 2,
            ttl_threshold: 7,
            rreq_retries: 3,
            max_rreq_timeout_ms: 10_000,
            local_repair: true,
            max_repair_hops: 9,
            local_add_ttl: 2,
            repair_retransmit_ms: 800,
            repair_window_ms: 3_000,
            max_repair_retries: 3,
            location_cache: LocationCachePolicy::default(),
            location_purge_interval_ms: 1_000,
            communication_cache_save_ms: 30_000,
            communication_purge_interval_ms: 1_000,
            location_update_interval_ms: 5_000,
            location_update_radius: 50.0,
            queue_capacity: 64,
            queue_timeout_ms: 30_000,
            link_failure_filter: LinkFailurePolicy::default(),
            rng_seed: 0,
        }
    }
}

impl ProtocolConfig {
    /// Parse a YAML document; missing fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ProtocolConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("hello_interval_ms", self.hello_interval_ms),
            ("route_purge_interval_ms", self.route_purge_interval_ms),
            ("location_purge_interval_ms", self.location_purge_interval_ms),
            (
                "communication_purge_interval_ms",
                self.communication_purge_interval_ms,
            ),
            ("location_update_interval_ms", self.location_update_interval_ms),
            ("broadcast_id_save_ms", self.broadcast_id_save_ms),
            ("repair_retransmit_ms", self.repair_retransmit_ms),
            ("repair_window_ms", self.repair_window_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(RoutingError::InvalidConfig(format!(
                    "{} must be non-zero",
                    name
                )));
            }
        }

        if self.ttl_start == 0 || self.ttl_start > self.network_diameter {
            return Err(RoutingError::InvalidConfig(format!(
                "ttl_start {} must be within 1..={}",
                self.ttl_start, self.network_diameter
            )));
        }

        if self.ttl_increment == 0 {
            return Err(RoutingError::InvalidConfig(
                "ttl_increment must be non-zero".to_string(),
            ));
        }

        if self.ttl_threshold > self.network_diameter {
            return Err(RoutingError::InvalidConfig(format!(
                "ttl_threshold {} exceeds network_diameter {}",
                self.ttl_threshold, self.network_diameter
            )));
        }

        if self.hello_jitter.min <= 0.0 || self.hello_jitter.min > self.hello_jitter.max {
            return Err(RoutingError::InvalidConfig(format!(
                "hello_jitter min {} / max {} out of order",
                self.hello_jitter.min, self.hello_jitter.max
            )));
        }

        if self.queue_capacity == 0 {
            return Err(RoutingError::InvalidConfig(
                "queue_capacity must be non-zero".to_string(),
            ));
        }

        if self.local_repair && self.max_repair_retries == 0 {
            return Err(RoutingError::InvalidConfig(
                "max_repair_retries must be non-zero when local_repair is on".to_string(),
            ));
        }

        if let LinkFailurePolicy::ErrorWindow { max_errors, .. } = self.link_failure_filter {
            if max_errors == 0 {
                return Err(RoutingError::InvalidConfig(
                    "link_failure_filter max_errors must be non-zero".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Neighbor lifetime: allowed beacon loss times the beacon interval
    pub fn neighbor_lifetime(&self) -> Duration {
        Duration::from_millis(self.allowed_hello_loss as u64 * self.hello_interval_ms)
    }

    pub fn hello_interval(&self) -> Duration {
        Duration::from_millis(self.hello_interval_ms)
    }

    pub fn node_traversal_time(&self) -> Duration {
        Duration::from_millis(self.node_traversal_time_ms)
    }

    pub fn max_rreq_timeout(&self) -> Duration {
        Duration::from_millis(self.max_rreq_timeout_ms)
    }

    pub fn active_route_timeout(&self) -> Duration {
        Duration::from_millis(self.active_route_timeout_ms)
    }

    pub fn reverse_route_life(&self) -> Duration {
        Duration::from_millis(self.reverse_route_life_ms)
    }

    pub fn delete_period(&self) -> Duration {
        Duration::from_millis(self.delete_period_ms)
    }
}
