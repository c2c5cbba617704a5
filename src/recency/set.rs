//! Bounded recency set with positional eviction.
//!
//! # Algorithm
//!
//! 1. Scan the table for a valid entry matching the origin
//! 2. Match seen less than `timeout` ago: report "drop", leave state untouched
//! 3. Stale match: refresh its timestamp
//! 4. No match: write it at the cursor slot and advance the cursor
//!
//! Eviction is purely positional. The slot under the cursor is overwritten
//! even if its occupant was seen a moment ago.

use crate::error::ConfigError;
use crate::packet::NodeNum;
use std::time::{Duration, Instant};

/// One slot in a [`RecencySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedOrigin {
    /// Origin node.
    pub origin: NodeNum,
    /// When the origin was last let through.
    pub last_seen: Instant,
    /// Whether this slot holds an entry.
    pub valid: bool,
}

/// Fixed-capacity table of recently seen origins.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use mesh_flood_rs_esp32::recency::RecencySet;
///
/// let mut set = RecencySet::new(4, Duration::from_secs(60)).unwrap();
/// let now = Instant::now();
///
/// assert!(!set.should_drop(0xCAFE, now));
/// assert!(set.should_drop(0xCAFE, now + Duration::from_secs(10)));
/// assert!(!set.should_drop(0xCAFE, now + Duration::from_secs(60)));
/// ```
#[derive(Debug, Clone)]
pub struct RecencySet {
    slots: Vec<TrackedOrigin>,
    cursor: usize,
    timeout: Duration,
}

impl RecencySet {
    /// Create an empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` or `timeout` is zero.
    pub fn new(capacity: usize, timeout: Duration) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "recency set capacity must be greater than 0",
            ));
        }
        if timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "recency timeout must be greater than 0",
            ));
        }

        let epoch = Instant::now();
        let empty = TrackedOrigin {
            origin: 0,
            last_seen: epoch,
            valid: false,
        };
        Ok(Self {
            slots: vec![empty; capacity],
            cursor: 0,
            timeout,
        })
    }

    /// Decide whether a packet from `origin` arrives too soon after the last
    /// one that was let through.
    ///
    /// Returns `true` to suppress. A suppressed hit does not refresh the
    /// entry, so a burst cannot extend its own window.
    pub fn should_drop(&mut self, origin: NodeNum, now: Instant) -> bool {
        let timeout = self.timeout;

        if let Some(slot) = self.slots.iter_mut().find(|s| s.valid && s.origin == origin) {
            if now.saturating_duration_since(slot.last_seen) < timeout {
                return true;
            }
            slot.last_seen = now;
            return false;
        }

        self.slots[self.cursor] = TrackedOrigin {
            origin,
            last_seen: now,
            valid: true,
        };
        self.cursor = (self.cursor + 1) % self.slots.len();
        false
    }

    /// True if `origin` currently occupies a slot.
    pub fn contains(&self, origin: NodeNum) -> bool {
        self.slots.iter().any(|s| s.valid && s.origin == origin)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.valid).count()
    }

    /// True if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Table capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Suppression window.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
