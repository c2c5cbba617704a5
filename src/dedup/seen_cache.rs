//! Seen-packet cache for duplicate detection.
//!
//! Every node floods what it hears, so the same packet reaches a node many
//! times over different paths. Each node tracks which `(from, id)` pairs it
//! has already handled to:
//! 1. Avoid relaying the same packet twice
//! 2. Recognise echoes of packets it originated itself
//! 3. Detect an originator retrying an unacknowledged packet
//!
//! Entries expire after a TTL. When the cache is full, expired entries are
//! purged first and then the least recently used entry is evicted, so memory
//! stays bounded.

use super::SeenPackets;
use crate::error::ConfigError;
use crate::packet::{NodeNum, Packet, PacketId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default number of tracked packets.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Default time a packet stays in the cache.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Key identifying a packet network-wide.
pub type SeenKey = (NodeNum, PacketId);

/// Seen cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenCacheConfig {
    /// Entries kept before LRU eviction starts.
    pub max_entries: usize,
    /// How long a `(from, id)` pair counts as seen.
    pub ttl: Duration,
}

impl Default for SeenCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: DEFAULT_TTL,
        }
    }
}

impl SeenCacheConfig {
    /// Reject a cache that could never hold or keep an entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.max_entries, self.ttl.is_zero()) {
            (0, _) => Err(ConfigError::InvalidConfig(
                "seen cache max_entries must be greater than 0",
            )),
            (_, true) => Err(ConfigError::InvalidConfig("seen cache ttl must be greater than 0")),
            _ => Ok(()),
        }
    }
}

/// Entry stored in the seen cache.
#[derive(Debug, Clone)]
pub struct SeenEntry {
    /// When this packet was first seen.
    pub first_seen: Instant,
    /// When this entry was last hit (for LRU eviction).
    pub last_accessed: Instant,
    /// Number of times this packet has been seen.
    pub seen_count: u32,
}

impl SeenEntry {
    fn new(now: Instant) -> Self {
        Self {
            first_seen: now,
            last_accessed: now,
            seen_count: 1,
        }
    }
}

/// Bounded cache of recently seen packets.
///
/// # Example
///
/// ```
/// use std::time::Instant;
/// use mesh_flood_rs_esp32::dedup::{SeenCache, SeenCacheConfig, SeenPackets};
/// use mesh_flood_rs_esp32::packet::{Data, Packet, PortNum, NODENUM_BROADCAST};
///
/// let mut cache = SeenCache::new(SeenCacheConfig::default()).unwrap();
/// let packet = Packet::decoded(0x1111, NODENUM_BROADCAST, 7, Data::new(PortNum::TextMessage), 3);
/// let now = Instant::now();
///
/// assert!(!cache.was_seen_recently(&packet, now));
/// assert!(cache.was_seen_recently(&packet, now));
/// ```
pub struct SeenCache {
    config: SeenCacheConfig,
    entries: HashMap<SeenKey, SeenEntry>,
}

impl Default for SeenCache {
    fn default() -> Self {
        Self::new(SeenCacheConfig::default()).expect("default config should be valid")
    }
}

impl SeenCache {
    /// Create a new seen cache with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SeenCacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            entries: HashMap::with_capacity(config.max_entries),
        })
    }

    /// Record a sighting of `key` at `now`.
    ///
    /// Returns `true` if a live entry already existed.
    pub fn observe(&mut self, key: SeenKey, now: Instant) -> bool {
        let ttl = self.config.ttl;

        if let Some(entry) = self.entries.get_mut(&key) {
            if now.saturating_duration_since(entry.first_seen) < ttl {
                entry.last_accessed = now;
                entry.seen_count = entry.seen_count.saturating_add(1);
                return true;
            }
            // Expired: forget it and treat this sighting as the first.
            self.entries.remove(&key);
        }

        if self.entries.len() >= self.config.max_entries {
            self.evict_expired_or_lru(now);
        }
        self.entries.insert(key, SeenEntry::new(now));
        false
    }

    /// Check if a key is cached (without updating access time or expiry).
    pub fn contains(&self, key: &SeenKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Get an entry without updating access time.
    pub fn peek(&self, key: &SeenKey) -> Option<&SeenEntry> {
        self.entries.get(key)
    }

    /// Get the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &SeenCacheConfig {
        &self.config
    }

    /// Remove all entries older than the TTL.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self, now: Instant) -> usize {
        let ttl = self.config.ttl;
        let before = self.entries.len();

        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.first_seen) < ttl);

        before - self.entries.len()
    }

    /// Evict expired entries, or the LRU entry if none expired.
    fn evict_expired_or_lru(&mut self, now: Instant) {
        if self.cleanup_expired(now) == 0 {
            self.evict_lru();
        }
    }

    /// Evict the least recently used entry.
    ///
    /// Full scan, O(n) in the number of entries.
    fn evict_lru(&mut self) {
        let lru_key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| *key);

        if let Some(key) = lru_key {
            self.entries.remove(&key);
        }
    }
}

impl SeenPackets for SeenCache {
    fn was_seen_recently(&mut self, packet: &Packet, now: Instant) -> bool {
        self.observe((packet.from, packet.id), now)
    }
}
