//! Hop-field arithmetic applied to a packet before it is relayed.
//!
//! Every path is capped explicitly: `hop_limit` never goes below 0 and
//! `hop_start` never above [`HOP_MAX`].

use crate::config::Role;
use crate::packet::{Packet, Payload, PortNum, BITFIELD_OK_TO_MQTT_MASK, HOP_MAX};
use log::debug;

/// Hop limit ceiling for the constrained profile and for late-relayed telemetry.
pub(crate) const CONSTRAINED_HOP_LIMIT: u8 = 2;

/// Clamp `hop_limit` to [`CONSTRAINED_HOP_LIMIT`], lowering `hop_start` by the
/// same amount so "hops away" stays correct.
pub(crate) fn constrain_hops(packet: &mut Packet) {
    if packet.hop_limit > CONSTRAINED_HOP_LIMIT {
        let excess = packet.hop_limit - CONSTRAINED_HOP_LIMIT;
        packet.hop_start = packet.hop_start.saturating_sub(excess);
        packet.hop_limit = CONSTRAINED_HOP_LIMIT;
    }
}

/// Hop policy for client-class relays: spend one hop.
pub(crate) fn apply_client_hops(packet: &mut Packet) {
    packet.hop_limit = packet.hop_limit.saturating_sub(1);
}

/// Hop policy for router-class relays, chosen by payload category.
pub(crate) fn apply_router_hops(role: Role, packet: &mut Packet) {
    let portnum = match &packet.payload {
        Payload::Encrypted(_) => {
            packet.hop_limit = packet.hop_limit.saturating_sub(1);
            debug!("Decrementing hop limit of encrypted packet");
            return;
        }
        Payload::Decoded(data) => data.portnum,
    };

    match portnum {
        PortNum::Telemetry => {
            if matches!(role, Role::Router | Role::Repeater) {
                // Relayed unchanged. Still handled locally.
                debug!("Dropping TELEMETRY_APP (67) from rebroadcast");
            } else if packet.hop_limit > CONSTRAINED_HOP_LIMIT {
                packet.hop_limit = CONSTRAINED_HOP_LIMIT;
                debug!("Broadcasting telemetry packet with hop limit 2");
            } else {
                packet.hop_limit = packet.hop_limit.saturating_sub(1);
                debug!("Broadcasting telemetry packet and decrementing hop limit");
            }
        }
        PortNum::Position => {
            packet.hop_limit = packet.hop_limit.saturating_sub(1);
            debug!("Decrementing hop count of position packet");
        }
        _ => {
            if packet.hop_start < HOP_MAX {
                packet.hop_start += 1;
                debug!("Incrementing hop start of {} packet", portnum);
            } else if packet.hop_limit == HOP_MAX {
                packet.hop_limit -= 1;
                debug!("Decrementing hop limit to prevent direct node in node list");
            } else {
                debug!("Zero hop packet");
            }
        }
    }
}

/// Grant bridging permission downstream if the packet carries a bitfield
/// without it. Other bits are preserved.
pub(crate) fn grant_ok_to_mqtt(packet: &mut Packet) -> bool {
    match packet.decoded_data_mut() {
        Some(data) if data.has_bitfield && data.bitfield & BITFIELD_OK_TO_MQTT_MASK == 0 => {
            data.bitfield |= BITFIELD_OK_TO_MQTT_MASK;
            true
        }
        _ => false,
    }
}
