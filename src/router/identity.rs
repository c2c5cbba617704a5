//! This node's own address and the addressing tests built on it.

use crate::packet::{NodeNum, Packet, NODENUM_BROADCAST};

/// Identity of the local node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    node_num: NodeNum,
}

impl NodeIdentity {
    /// Create an identity for `node_num`.
    pub const fn new(node_num: NodeNum) -> Self {
        Self { node_num }
    }

    /// Full node number.
    pub fn node_num(&self) -> NodeNum {
        self.node_num
    }

    /// Short identifier stamped into `relay_node`: the last byte of the node number.
    pub fn relay_byte(&self) -> u8 {
        (self.node_num & 0xFF) as u8
    }

    /// True if this node originated the packet.
    pub fn is_from_us(&self, packet: &Packet) -> bool {
        packet.from == self.node_num
    }

    /// True if the packet is addressed to this node specifically.
    pub fn is_to_us(&self, packet: &Packet) -> bool {
        packet.to == self.node_num
    }

    /// True if `to` is the broadcast address.
    pub fn is_broadcast(to: NodeNum) -> bool {
        to == NODENUM_BROADCAST
    }
}
