//! Packet header encoding and decoding.
//!
//! Every message on the wire is a fixed 4-byte header followed by the
//! payload:
//!
//! ```text
//! ┌───────────┬────────┬────────┐
//! │ Length    │ Kind   │ Flags  │
//! │ 2 bytes   │ 1 byte │ 1 byte │
//! │ u16 LE    │        │        │
//! └───────────┴────────┴────────┘
//! ```
//!
//! `Length` counts payload bytes only, so a packet is at most
//! `HEADER_SIZE + u16::MAX` bytes long.

use thiserror::Error;

/// Header size in bytes (fixed, exactly 4).
pub const HEADER_SIZE: usize = 4;

/// Largest payload a single packet can carry.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Packet kind tag, one byte on the wire.
///
/// Unrecognized tags decode to [`PacketKind::Unknown`] instead of failing,
/// so a newer peer can introduce kinds without desynchronizing an older
/// receiver; receivers consume and drop such payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Chat text, written verbatim to the receiver's local output.
    Text,
    /// Reserved for audio transport; never produced or interpreted.
    Sound,
    /// Any tag this build does not recognize.
    Unknown(u8),
}

impl PacketKind {
    pub fn from_wire(tag: u8) -> Self {
        match tag {
            0 => PacketKind::Text,
            1 => PacketKind::Sound,
            other => PacketKind::Unknown(other),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            PacketKind::Text => 0,
            PacketKind::Sound => 1,
            PacketKind::Unknown(tag) => tag,
        }
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Number of payload bytes following the header.
    pub length: u16,
    /// Packet kind tag.
    pub kind: PacketKind,
    /// Flag bits; none are assigned, must round-trip unchanged.
    pub flags: u8,
}

impl Header {
    pub fn new(length: u16, kind: PacketKind, flags: u8) -> Self {
        Self {
            length,
            kind,
            flags,
        }
    }

    /// Encode to the 4-byte wire layout.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.length.to_le_bytes();
        [len[0], len[1], self.kind.to_wire(), self.flags]
    }

    /// Decode a 4-byte header. Infallible: every 4-byte value is a valid
    /// header, unrecognized kind tags included.
    pub fn decode(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            length: u16::from_le_bytes([bytes[0], bytes[1]]),
            kind: PacketKind::from_wire(bytes[2]),
            flags: bytes[3],
        }
    }
}

/// Payload does not fit the 16-bit length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("payload of {length} bytes does not fit the 16-bit length field")]
pub struct PayloadTooLarge {
    pub length: usize,
}

/// Frame a payload as one complete packet, header included.
///
/// Pure function with no I/O; fails before anything could be transmitted
/// when the payload exceeds [`MAX_PAYLOAD`].
pub fn encode_packet(
    kind: PacketKind,
    flags: u8,
    payload: &[u8],
) -> Result<Vec<u8>, PayloadTooLarge> {
    if payload.len() > MAX_PAYLOAD {
        return Err(PayloadTooLarge {
            length: payload.len(),
        });
    }

    let header = Header::new(payload.len() as u16, kind, flags);
    let mut packet = Vec::with_capacity(HEADER_SIZE + payload.len());
    packet.extend_from_slice(&header.encode());
    packet.extend_from_slice(payload);
    Ok(packet)
}
