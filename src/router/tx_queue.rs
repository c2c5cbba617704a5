//! Bounded transmit queue.
//!
//! Packets wait here until the radio driver pulls them. The queue never
//! blocks: a send into a full queue fails with [`RouterError::QueueFull`] and
//! the caller drops the packet.
//!
//! Relay copies come out of a fixed packet pool. Every queued packet holds
//! one pool slot until the driver pops it or the relay is cancelled, so
//! [`RouterBase::alloc_copy`] returns `None` once queued traffic has taken
//! the whole pool.

use super::RouterBase;
use crate::error::{ConfigError, RouterError};
use crate::packet::{NodeNum, Packet, PacketId};
use std::collections::VecDeque;

/// Default transmit queue length.
pub const DEFAULT_TX_QUEUE_LEN: usize = 16;

/// Sizing for a [`TxQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxQueueConfig {
    /// Maximum number of pending packets.
    pub capacity: usize,
    /// Packet buffers shared by queued packets and fresh relay copies.
    pub copy_budget: usize,
}

impl Default for TxQueueConfig {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TX_QUEUE_LEN)
    }
}

impl TxQueueConfig {
    /// Queue of `capacity` packets with one pool buffer per queue slot.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            copy_budget: capacity,
        }
    }

    /// Validate queue sizing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfig`] if either size is 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "tx queue capacity must be greater than 0",
            ));
        }
        if self.copy_budget == 0 {
            return Err(ConfigError::InvalidConfig(
                "copy_budget must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// FIFO transmit queue implementing [`RouterBase`].
#[derive(Debug, Clone)]
pub struct TxQueue {
    queue: VecDeque<Packet>,
    config: TxQueueConfig,
}

impl Default for TxQueue {
    fn default() -> Self {
        Self::new(TxQueueConfig::default()).expect("default tx queue config should be valid")
    }
}

impl TxQueue {
    /// Create an empty queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: TxQueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            queue: VecDeque::with_capacity(config.capacity),
            config,
        })
    }

    /// Take the next packet to transmit. Frees its pool buffer.
    pub fn pop_front(&mut self) -> Option<Packet> {
        self.queue.pop_front()
    }

    /// Pending packets, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.queue.iter()
    }

    /// Number of pending packets.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// True if a send would fail.
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.config.capacity
    }

    /// Maximum number of pending packets.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Pool buffers not held by queued packets.
    pub fn copies_available(&self) -> usize {
        self.config.copy_budget.saturating_sub(self.queue.len())
    }
}

impl RouterBase for TxQueue {
    fn send(&mut self, packet: Packet) -> Result<(), RouterError> {
        if self.is_full() {
            return Err(RouterError::QueueFull);
        }
        self.queue.push_back(packet);
        Ok(())
    }

    fn cancel_sending(&mut self, from: NodeNum, id: PacketId) -> bool {
        match self.queue.iter().position(|p| p.from == from && p.id == id) {
            Some(index) => {
                self.queue.remove(index);
                true
            }
            None => false,
        }
    }

    fn find_in_tx_queue(&self, from: NodeNum, id: PacketId) -> bool {
        self.queue.iter().any(|p| p.from == from && p.id == id)
    }

    fn alloc_copy(&mut self, packet: &Packet) -> Option<Packet> {
        if self.copies_available() == 0 {
            return None;
        }
        Some(packet.clone())
    }
}
