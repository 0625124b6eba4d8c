//! Routing error types

use aorglu_protocol::NodeAddr;
use thiserror::Error;

/// Routing-specific errors
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Route to {0} already exists")]
    DuplicateRoute(NodeAddr),

    #[error("No route to destination {0}")]
    NoRoute(NodeAddr),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] aorglu_protocol::ProtocolError),

    #[error("Node runtime stopped")]
    RuntimeStopped,
}

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;
