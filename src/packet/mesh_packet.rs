//! Mesh packet fields used by flood routing.
//!
//! A received packet carries two hop counters:
//! - `hop_start`: the transmit budget the originator started with
//! - `hop_limit`: the budget that remains, decremented on each relay
//!
//! `hop_start - hop_limit` is the number of hops already travelled. A packet
//! whose counters are equal has not been relayed yet; seeing it again in that
//! state means the originator is retrying.

use super::PortNum;
use crate::error::RouterError;

/// Node number (32-bit mesh address).
pub type NodeNum = u32;

/// Packet identifier. `0` marks a packet that may not be retransmitted.
pub type PacketId = u32;

/// Destination address for broadcast packets.
pub const NODENUM_BROADCAST: NodeNum = 0xFFFF_FFFF;

/// `next_hop` value meaning "any relay may forward this".
pub const NO_NEXT_HOP_PREFERENCE: u8 = 0;

/// Largest meaningful value for either hop counter.
pub const HOP_MAX: u8 = 7;

/// Bitfield flag granting permission to bridge the packet off-mesh.
pub const BITFIELD_OK_TO_MQTT_MASK: u32 = 1;

/// How the packet reached this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMechanism {
    /// Received over the LoRa radio.
    #[default]
    Radio,
    /// Arrived through a bridge (MQTT, API client, ...).
    Bridged,
}

/// Decoded (plaintext) payload header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    /// Application port.
    pub portnum: PortNum,
    /// Id of the request this packet answers (ACKs set this).
    pub request_id: PacketId,
    /// Id of the message this packet replies to.
    pub reply_id: PacketId,
    /// Policy flags, only meaningful when `has_bitfield` is set.
    pub bitfield: u32,
    /// Whether the sender populated `bitfield`.
    pub has_bitfield: bool,
    /// Application payload bytes.
    pub payload: Vec<u8>,
}

impl Data {
    /// Create a payload header for the given port with no ids or flags.
    pub fn new(portnum: PortNum) -> Self {
        Self {
            portnum,
            request_id: 0,
            reply_id: 0,
            bitfield: 0,
            has_bitfield: false,
            payload: Vec::new(),
        }
    }

    /// True if this is an ACK or an application reply.
    pub fn is_ack_or_reply(&self) -> bool {
        self.request_id != 0 || self.reply_id != 0
    }
}

/// Packet payload variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Decrypted payload with a known port.
    Decoded(Data),
    /// Still-encrypted bytes; the category is unknown to this node.
    Encrypted(Vec<u8>),
}

/// A mesh packet as seen by the flooding router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Originating node.
    pub from: NodeNum,
    /// Destination node, or [`NODENUM_BROADCAST`].
    pub to: NodeNum,
    /// Packet id, unique per originator.
    pub id: PacketId,
    /// Hop budget the originator started with.
    pub hop_start: u8,
    /// Remaining hop budget.
    pub hop_limit: u8,
    /// How the packet arrived.
    pub transport_mechanism: TransportMechanism,
    /// Preferred relay, [`NO_NEXT_HOP_PREFERENCE`] if none.
    pub next_hop: u8,
    /// Last byte of the node number that last transmitted this packet.
    pub relay_node: u8,
    /// Decoded or encrypted payload.
    pub payload: Payload,
}

impl Packet {
    /// Create a decoded packet with a full, unrelayed hop budget.
    pub fn decoded(from: NodeNum, to: NodeNum, id: PacketId, data: Data, hops: u8) -> Self {
        Self {
            from,
            to,
            id,
            hop_start: hops,
            hop_limit: hops,
            transport_mechanism: TransportMechanism::Radio,
            next_hop: NO_NEXT_HOP_PREFERENCE,
            relay_node: 0,
            payload: Payload::Decoded(data),
        }
    }

    /// Create an encrypted packet with a full, unrelayed hop budget.
    pub fn encrypted(from: NodeNum, to: NodeNum, id: PacketId, bytes: Vec<u8>, hops: u8) -> Self {
        Self {
            payload: Payload::Encrypted(bytes),
            ..Self::decoded(from, to, id, Data::new(PortNum::Other(0)), hops)
        }
    }

    /// Decoded payload header, if the packet is not encrypted.
    pub fn decoded_data(&self) -> Option<&Data> {
        match &self.payload {
            Payload::Decoded(data) => Some(data),
            Payload::Encrypted(_) => None,
        }
    }

    /// Mutable decoded payload header, if the packet is not encrypted.
    pub fn decoded_data_mut(&mut self) -> Option<&mut Data> {
        match &mut self.payload {
            Payload::Decoded(data) => Some(data),
            Payload::Encrypted(_) => None,
        }
    }

    /// Port of the decoded payload.
    pub fn portnum(&self) -> Option<PortNum> {
        self.decoded_data().map(|d| d.portnum)
    }

    /// True if addressed to every node.
    pub fn is_broadcast(&self) -> bool {
        self.to == NODENUM_BROADCAST
    }

    /// True if the originator is retransmitting an unrelayed copy.
    pub fn is_repeated_original(&self) -> bool {
        self.hop_start > 0 && self.hop_start == self.hop_limit
    }

    /// Hops travelled so far, if the originator recorded `hop_start`.
    pub fn hops_away(&self) -> Option<u8> {
        if self.hop_start == 0 {
            return None;
        }
        self.hop_start.checked_sub(self.hop_limit)
    }

    /// Check that `hop_limit <= hop_start <= HOP_MAX`.
    ///
    /// `hop_start == 0` is accepted with any in-range `hop_limit`: legacy
    /// firmware does not set it.
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.hop_limit > HOP_MAX {
            return Err(RouterError::Malformed("hop_limit out of range"));
        }
        if self.hop_start > HOP_MAX {
            return Err(RouterError::Malformed("hop_start out of range"));
        }
        if self.hop_start != 0 && self.hop_limit > self.hop_start {
            return Err(RouterError::Malformed("hop_limit exceeds hop_start"));
        }
        Ok(())
    }
}
