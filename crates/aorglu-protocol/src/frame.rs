//! Frame format for wire transmission
//!
//! Frame Structure (12-byte header + body):
//! - Magic (4 bytes): 0x41474C55 ("AGLU")
//! - Version (1 byte): Protocol version (0x01)
//! - Packet Type (1 byte): Type of packet
//! - Body Length (2 bytes): Length of body (big-endian)
//! - Checksum (4 bytes): CRC-32 of the body (big-endian)
//! - Body (variable): bincode encoding of the packet

use crate::error::{ProtocolError, Result};
use crate::packet::{Packet, PacketType};

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Magic bytes to identify frames: "AGLU"
pub const MAGIC_BYTES: [u8; 4] = [0x41, 0x47, 0x4C, 0x55];

/// Total header size: 4 + 1 + 1 + 2 + 4 = 12 bytes
pub const HEADER_SIZE: usize = 12;

/// Maximum body size
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;

/// Frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub packet_type: PacketType,
    pub body_length: u16,
    pub checksum: u32,
}

impl FrameHeader {
    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&MAGIC_BYTES);
        bytes[4] = PROTOCOL_VERSION;
        bytes[5] = self.packet_type.to_u8();
        bytes[6..8].copy_from_slice(&self.body_length.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.checksum.to_be_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::InvalidFrameFormat);
        }

        if bytes[0..4] != MAGIC_BYTES {
            return Err(ProtocolError::BadMagic);
        }

        if bytes[4] != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(bytes[4]));
        }

        let packet_type = PacketType::from_u8(bytes[5])?;
        let body_length = u16::from_be_bytes([bytes[6], bytes[7]]);
        let checksum = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        Ok(FrameHeader {
            packet_type,
            body_length,
            checksum,
        })
    }
}

/// Encode a packet into a frame
pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    let body =
        bincode::serialize(packet).map_err(|e| ProtocolError::SerializationFailed(e.to_string()))?;

    if body.len() > MAX_BODY_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: body.len(),
            max: MAX_BODY_SIZE,
        });
    }

    let header = FrameHeader {
        packet_type: packet.packet_type(),
        body_length: body.len() as u16,
        checksum: crc32fast::hash(&body),
    };

    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode a frame into a packet
pub fn decode(bytes: &[u8]) -> Result<Packet> {
    let header = FrameHeader::from_bytes(bytes)?;

    let expected_size = HEADER_SIZE + header.body_length as usize;
    if bytes.len() != expected_size {
        return Err(ProtocolError::InvalidFrameFormat);
    }

    let body = &bytes[HEADER_SIZE..];
    let actual = crc32fast::hash(body);
    if actual != header.checksum {
        return Err(ProtocolError::ChecksumMismatch {
            expected: header.checksum,
            actual,
        });
    }

    let packet: Packet = bincode::deserialize(body)
        .map_err(|e| ProtocolError::DeserializationFailed(e.to_string()))?;

    if packet.packet_type() != header.packet_type {
        return Err(ProtocolError::PacketTypeMismatch {
            header: header.packet_type.to_u8(),
            body: packet.packet_type().to_u8(),
        });
    }

    Ok(packet)
}
