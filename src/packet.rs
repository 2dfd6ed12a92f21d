//! Reassembled application payloads moving between a node's ISO-TP session
//! and its backend TCP connection.

use crate::error::BridgeError;

/// The largest payload a single ISO-TP transaction can carry, per spec.
pub const MAX_PACKET_LEN: usize = 4095;

/// A reassembled byte payload, bounded to [`MAX_PACKET_LEN`] at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet(Vec<u8>);

impl Packet {
    pub fn new(data: Vec<u8>) -> Result<Self, BridgeError> {
        if data.len() > MAX_PACKET_LEN {
            return Err(BridgeError::TooLarge {
                len: data.len(),
                max: MAX_PACKET_LEN,
            });
        }
        Ok(Self(data))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// A packet reassembled from a node's uplink, tagged with the address it
/// came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecvPacket {
    pub src_addr: u8,
    pub packet: Packet,
}

impl RecvPacket {
    pub fn new(src_addr: u8, data: Vec<u8>) -> Result<Self, BridgeError> {
        Ok(Self {
            src_addr,
            packet: Packet::new(data)?,
        })
    }

    pub fn data(&self) -> &[u8] {
        self.packet.as_bytes()
    }
}

/// A packet destined for a node's downlink, tagged with the address to send it to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendPacket {
    pub dst_addr: u8,
    pub packet: Packet,
}

impl SendPacket {
    pub fn new(dst_addr: u8, data: Vec<u8>) -> Result<Self, BridgeError> {
        Ok(Self {
            dst_addr,
            packet: Packet::new(data)?,
        })
    }

    pub fn data(&self) -> &[u8] {
        self.packet.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_payload() {
        let data = vec![0u8; MAX_PACKET_LEN + 1];
        let err = Packet::new(data).unwrap_err();
        assert!(matches!(err, BridgeError::TooLarge { len, max } if len == MAX_PACKET_LEN + 1 && max == MAX_PACKET_LEN));
    }

    #[test]
    fn accepts_boundary_size() {
        let data = vec![0u8; MAX_PACKET_LEN];
        assert_eq!(Packet::new(data).unwrap().len(), MAX_PACKET_LEN);
    }
}
