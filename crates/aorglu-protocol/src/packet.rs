//! Packet kinds exchanged between routing agents

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::types::{NodeAddr, Position, Timestamp};

/// Default TTL for application data packets
pub const DEFAULT_DATA_TTL: u8 = 32;

/// Packet type discriminant, carried in every frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketType {
    /// Route request, flooded with an expanding ring (0x01)
    Request = 0x01,
    /// Route reply, unicast back along the reverse route (0x02)
    Reply = 0x02,
    /// Route error listing unreachable destinations (0x03)
    Error = 0x03,
    /// One-hop liveness beacon (0x04)
    Beacon = 0x04,
    /// Position advertisement (0x05)
    LocationUpdate = 0x05,
    /// Location-biased local repair request (0x06)
    Repair = 0x06,
    /// Application data (0x10)
    Data = 0x10,
}

impl PacketType {
    /// Create from u8
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(PacketType::Request),
            0x02 => Ok(PacketType::Reply),
            0x03 => Ok(PacketType::Error),
            0x04 => Ok(PacketType::Beacon),
            0x05 => Ok(PacketType::LocationUpdate),
            0x06 => Ok(PacketType::Repair),
            0x10 => Ok(PacketType::Data),
            _ => Err(ProtocolError::InvalidPacketType(value)),
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            PacketType::Request => "RREQ",
            PacketType::Reply => "RREP",
            PacketType::Error => "RERR",
            PacketType::Beacon => "BEACON",
            PacketType::LocationUpdate => "LUDP",
            PacketType::Repair => "REPA",
            PacketType::Data => "DATA",
        }
    }
}

/// Route request (RREQ)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Node that started the discovery
    pub originator: NodeAddr,
    /// Originator's own sequence number
    pub originator_seq: u32,
    /// Node being searched for
    pub destination: NodeAddr,
    /// Minimum destination sequence number an answer must carry, if known
    pub destination_seq: Option<u32>,
    /// Per-originator flood identifier
    pub broadcast_id: u32,
    /// Hops travelled so far (1 when leaving the originator)
    pub hop_count: u16,
    /// Remaining hop budget
    pub ttl: u8,
    /// When the originator sent it
    pub timestamp: Timestamp,
}

/// Route reply (RREP)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteReply {
    /// Destination the route leads to
    pub destination: NodeAddr,
    /// Destination sequence number backing this route
    pub destination_seq: u32,
    /// Requester the reply travels back to
    pub originator: NodeAddr,
    /// Hops from the receiving node to the destination
    pub hop_count: u16,
    /// How long the route may be used, in milliseconds
    pub lifetime_ms: u32,
    /// Timestamp copied from the request, used for latency estimates
    pub timestamp: Timestamp,
}

/// One entry of a route error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreachableDestination {
    pub address: NodeAddr,
    pub seqno: u32,
}

/// Route error (RERR)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteError {
    pub unreachable: Vec<UnreachableDestination>,
}

/// One-hop beacon (HELLO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    pub sender: NodeAddr,
    pub seqno: u32,
}

/// Position advertisement, routed hop-by-hop to `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub sender: NodeAddr,
    pub target: NodeAddr,
    pub position: Position,
    pub timestamp: Timestamp,
    pub ttl: u8,
}

/// Local repair request (REPA)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairRequest {
    /// Destination whose route broke
    pub destination: NodeAddr,
    /// Freshness floor an answer must satisfy
    pub destination_seq: u32,
    /// Node performing the repair
    pub origin: NodeAddr,
    /// Origin's own sequence number
    pub origin_seq: u32,
    /// Next hop that failed; answers through it are ignored
    pub broken_next_hop: NodeAddr,
    /// Retry identifier, drawn from the origin's broadcast-id space
    pub repair_id: u32,
    /// Last known position of the destination
    pub target: Option<Position>,
    /// Position of the node that (re)broadcast this copy
    pub relay_position: Option<Position>,
    pub hop_count: u16,
    pub ttl: u8,
    pub timestamp: Timestamp,
}

/// Application data routed by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPacket {
    pub source: NodeAddr,
    pub destination: NodeAddr,
    pub ttl: u8,
    pub payload: Vec<u8>,
}

impl DataPacket {
    /// Create a data packet with the default TTL
    pub fn new(source: NodeAddr, destination: NodeAddr, payload: Vec<u8>) -> Self {
        DataPacket {
            source,
            destination,
            ttl: DEFAULT_DATA_TTL,
            payload,
        }
    }
}

/// Every packet the routing agent sends or receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    Request(RouteRequest),
    Reply(RouteReply),
    Error(RouteError),
    Beacon(Beacon),
    LocationUpdate(LocationUpdate),
    Repair(RepairRequest),
    Data(DataPacket),
}

impl Packet {
    /// Get the type discriminant
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Request(_) => PacketType::Request,
            Packet::Reply(_) => PacketType::Reply,
            Packet::Error(_) => PacketType::Error,
            Packet::Beacon(_) => PacketType::Beacon,
            Packet::LocationUpdate(_) => PacketType::LocationUpdate,
            Packet::Repair(_) => PacketType::Repair,
            Packet::Data(_) => PacketType::Data,
        }
    }

    /// Whether this is a routing control packet (everything except data)
    pub fn is_control(&self) -> bool {
        !matches!(self, Packet::Data(_))
    }
}
