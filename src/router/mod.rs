//! Flood routing decisions for a mesh node.
//!
//! This module provides:
//! - [`FloodingRouter`]: duplicate classification, relay cancellation and
//!   the rebroadcast policy engine
//! - [`RouterBase`] / [`RadioInterface`]: the generic router and radio
//!   capabilities the flooding layer calls through
//! - [`TxQueue`]: bounded in-memory send path implementing [`RouterBase`]
//! - [`RouterStats`]: suppression and relay counters
//!
//! # Control flow
//!
//! ```text
//! rx packet -> classify --Duplicate--> retry? rebroadcast : maybe cancel own relay
//!                   \
//!                    Fresh --> sniff (ACK cancel) --> maybe_rebroadcast --> RouterBase::send
//! local packet -> send hook --> seen cache --> RouterBase::send
//! ```

mod flooding;
mod hops;
mod identity;
mod stats;
mod tx_queue;

pub use flooding::{Classification, FloodingRouter, ReceiveOutcome, RebroadcastOutcome, SkipReason};
pub use identity::NodeIdentity;
pub use stats::{RouterStats, RouterStatsSnapshot};
pub use tx_queue::{TxQueue, TxQueueConfig, DEFAULT_TX_QUEUE_LEN};

use crate::error::RouterError;
use crate::packet::{NodeNum, Packet, PacketId};

/// Generic router behaviour the flooding layer builds on.
///
/// Implementations own the outbound queue and packet memory. None of these
/// calls may block.
pub trait RouterBase {
    /// Queue a packet for transmission.
    ///
    /// Returns [`RouterError::QueueFull`] instead of waiting for space.
    fn send(&mut self, packet: Packet) -> Result<(), RouterError>;

    /// Withdraw a still-pending transmission. Returns `true` if one was removed.
    fn cancel_sending(&mut self, from: NodeNum, id: PacketId) -> bool;

    /// True if `(from, id)` is still waiting in the outbound queue.
    fn find_in_tx_queue(&self, from: NodeNum, id: PacketId) -> bool;

    /// Obtain a mutable copy of `packet` for retransmission.
    ///
    /// Returns `None` when packet memory is exhausted.
    fn alloc_copy(&mut self, packet: &Packet) -> Option<Packet> {
        Some(packet.clone())
    }

    /// Additional, non-flood filtering of received packets.
    fn should_filter_received(&mut self, _packet: &Packet) -> bool {
        false
    }

    /// Observe a received packet after flood handling.
    fn sniff_received(&mut self, _packet: &Packet) {}
}

/// Radio interface hooks used by late-relaying routers.
pub trait RadioInterface {
    /// Shrink the pending late-rebroadcast delay for `(from, id)` so a
    /// fallback relay still happens but faster paths keep priority.
    fn clamp_to_late_rebroadcast_window(&mut self, from: NodeNum, id: PacketId);
}
