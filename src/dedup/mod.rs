//! Duplicate detection for flooded packets.
//!
//! This module provides:
//! - [`SeenPackets`]: the seen-packet store the flooding router queries
//! - [`SeenCache`]: bounded TTL + LRU implementation keyed by `(from, id)`

mod seen_cache;

pub use seen_cache::{
    SeenCache, SeenCacheConfig, SeenEntry, SeenKey, DEFAULT_MAX_ENTRIES, DEFAULT_TTL,
};

use crate::packet::Packet;
use std::time::Instant;

/// Store of recently seen packets.
///
/// Implementations own their expiry policy. The router only relies on the
/// first observation of a `(from, id)` pair being recorded.
pub trait SeenPackets {
    /// Return `true` if the packet was seen recently, otherwise record it and
    /// return `false`.
    fn was_seen_recently(&mut self, packet: &Packet, now: Instant) -> bool;
}
