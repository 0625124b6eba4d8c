//! AORGLU Protocol Module
//!
//! This module defines the addresses, time and position types, the packet
//! kinds exchanged between routing agents, and their wire framing.

pub mod error;
pub mod frame;
pub mod packet;
pub mod types;

pub use error::{ProtocolError, Result};
pub use frame::{decode, encode, FrameHeader};
pub use packet::{
    Beacon, DataPacket, LocationUpdate, Packet, PacketType, RepairRequest, RouteError,
    RouteReply, RouteRequest, UnreachableDestination,
};
pub use types::{NodeAddr, Position, Timestamp};
