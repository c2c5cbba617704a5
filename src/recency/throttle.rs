//! Category-partitioned recency throttle.

use super::RecencySet;
use crate::config::ThrottleConfig;
use crate::error::ConfigError;
use crate::packet::{NodeNum, Packet, Payload, PortNum};
use log::debug;
use std::fmt;
use std::time::{Duration, Instant};

/// Packet classes subject to recency throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedCategory {
    /// Telemetry reports.
    Telemetry,
    /// Position reports.
    Position,
    /// Node identity broadcasts.
    NodeInfo,
    /// Payloads this node cannot decrypt.
    Encrypted,
}

impl TrackedCategory {
    /// All categories, in table order.
    pub const ALL: [TrackedCategory; 4] = [
        Self::Telemetry,
        Self::Position,
        Self::NodeInfo,
        Self::Encrypted,
    ];

    /// Classify a packet. Returns `None` for untracked traffic.
    pub fn of(packet: &Packet) -> Option<Self> {
        match &packet.payload {
            Payload::Encrypted(_) => Some(Self::Encrypted),
            Payload::Decoded(data) => match data.portnum {
                PortNum::Telemetry => Some(Self::Telemetry),
                PortNum::Position => Some(Self::Position),
                PortNum::NodeInfo => Some(Self::NodeInfo),
                _ => None,
            },
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Telemetry => 0,
            Self::Position => 1,
            Self::NodeInfo => 2,
            Self::Encrypted => 3,
        }
    }

    fn timeout(self, config: &ThrottleConfig) -> Duration {
        match self {
            Self::Telemetry => config.telemetry_timeout,
            Self::Position => config.position_timeout,
            Self::NodeInfo => config.node_info_timeout,
            Self::Encrypted => config.encrypted_timeout,
        }
    }
}

impl fmt::Display for TrackedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telemetry => write!(f, "telemetry"),
            Self::Position => write!(f, "position"),
            Self::NodeInfo => write!(f, "user info"),
            Self::Encrypted => write!(f, "encrypted"),
        }
    }
}

/// One [`RecencySet`] per [`TrackedCategory`].
///
/// Created once at node start and kept for the process lifetime. Never
/// persisted.
#[derive(Debug, Clone)]
pub struct RecencyThrottle {
    tables: [RecencySet; 4],
}

impl RecencyThrottle {
    /// Create the four tracking tables.
    pub fn new(config: &ThrottleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let table = |category: TrackedCategory| {
            RecencySet::new(config.max_tracked_nodes, category.timeout(config))
        };
        Ok(Self {
            tables: [
                table(TrackedCategory::Telemetry)?,
                table(TrackedCategory::Position)?,
                table(TrackedCategory::NodeInfo)?,
                table(TrackedCategory::Encrypted)?,
            ],
        })
    }

    /// Decide whether to suppress a relay of `category` traffic from `origin`.
    pub fn should_drop(&mut self, origin: NodeNum, category: TrackedCategory, now: Instant) -> bool {
        let drop = self.tables[category.index()].should_drop(origin, now);
        if drop {
            debug!("Dropping {} packet from 0x{:08x} - too recent", category, origin);
        }
        drop
    }

    /// Tracking table for a category.
    pub fn table(&self, category: TrackedCategory) -> &RecencySet {
        &self.tables[category.index()]
    }
}
