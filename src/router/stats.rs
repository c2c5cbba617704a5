//! Flood routing counters.
//!
//! Suppressions, cancellations and failures are never reported to the mesh
//! as errors. They are counted here so operators can see what a node is
//! holding back.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Router counters.
///
/// Shared between the router and the stats server. All fields use atomic
/// types for thread-safe access without locking.
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Duplicate packets received.
    pub rx_dupe: AtomicUsize,
    /// Own pending relays withdrawn because another node relayed first.
    pub tx_relay_canceled: AtomicUsize,
    /// Pending relays withdrawn after sniffing an ACK or reply.
    pub ack_cancels: AtomicUsize,
    /// Late-rebroadcast windows clamped (ROUTER_LATE).
    pub late_window_clamps: AtomicUsize,
    /// Duplicates relayed again because the originator is retrying.
    pub retry_relays: AtomicUsize,
    /// Packets rebroadcast.
    pub rebroadcasts: AtomicUsize,
    /// Rebroadcasts suppressed by the recency throttle.
    pub throttled: AtomicUsize,
    /// Rebroadcasts abandoned because no packet copy was available.
    pub alloc_failures: AtomicUsize,
    /// Sends rejected by a full transmit queue.
    pub queue_full: AtomicUsize,
    /// Packets refused as malformed.
    pub malformed: AtomicUsize,
    /// Packets originated by this node.
    pub local_sent: AtomicUsize,
}

/// Point-in-time copy of [`RouterStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RouterStatsSnapshot {
    /// Duplicates received.
    pub rx_dupe: usize,
    /// Own relays withdrawn on a duplicate.
    pub tx_relay_canceled: usize,
    /// Relays withdrawn on a sniffed ACK or reply.
    pub ack_cancels: usize,
    /// Late-rebroadcast windows clamped.
    pub late_window_clamps: usize,
    /// Originator retries relayed again.
    pub retry_relays: usize,
    /// Packets rebroadcast.
    pub rebroadcasts: usize,
    /// Relays held back by the recency throttle.
    pub throttled: usize,
    /// Relays abandoned for lack of a packet copy.
    pub alloc_failures: usize,
    /// Sends rejected by a full queue.
    pub queue_full: usize,
    /// Malformed packets refused.
    pub malformed: usize,
    /// Locally originated packets.
    pub local_sent: usize,
}

impl RouterStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        RouterStatsSnapshot {
            rx_dupe: load(&self.rx_dupe),
            tx_relay_canceled: load(&self.tx_relay_canceled),
            ack_cancels: load(&self.ack_cancels),
            late_window_clamps: load(&self.late_window_clamps),
            retry_relays: load(&self.retry_relays),
            rebroadcasts: load(&self.rebroadcasts),
            throttled: load(&self.throttled),
            alloc_failures: load(&self.alloc_failures),
            queue_full: load(&self.queue_full),
            malformed: load(&self.malformed),
            local_sent: load(&self.local_sent),
        }
    }

    /// Serialize all counters to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}
