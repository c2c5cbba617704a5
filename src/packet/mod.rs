//! Mesh packet model.
//!
//! This module provides:
//! - [`Packet`]: the fields of a mesh packet that flood routing reads and mutates
//! - [`PortNum`]: application port numbers used to classify decoded payloads
//!
//! Field widths and constants match the network-wide packet schema so that
//! mutated copies stay interoperable with every other node on the mesh.

mod mesh_packet;
mod port;

pub use mesh_packet::{
    Data, NodeNum, Packet, PacketId, Payload, TransportMechanism, BITFIELD_OK_TO_MQTT_MASK,
    HOP_MAX, NODENUM_BROADCAST, NO_NEXT_HOP_PREFERENCE,
};
pub use port::PortNum;
