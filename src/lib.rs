//! Flood routing core for a LoRa mesh node.
//!
//! For every packet a node hears or originates, this library decides whether
//! it is a duplicate, whether to relay it, and how to rewrite its hop fields
//! before it goes back on air. Everything here is platform-independent and
//! can be tested on the host machine without radio hardware.

pub mod config;
pub mod dedup;
pub mod error;
pub mod network;
pub mod packet;
pub mod recency;
pub mod router;

// Re-export commonly used items
pub use config::{RebroadcastMode, Role, RouterConfig, ThrottleConfig};
pub use dedup::{SeenCache, SeenCacheConfig, SeenPackets};
pub use error::{ConfigError, RouterError};
pub use packet::{Data, NodeNum, Packet, PacketId, Payload, PortNum, TransportMechanism};
pub use recency::{RecencySet, RecencyThrottle, TrackedCategory};
pub use router::{
    FloodingRouter, NodeIdentity, RadioInterface, RebroadcastOutcome, ReceiveOutcome, RouterBase,
    RouterStats, TxQueue, TxQueueConfig,
};

#[cfg(feature = "stats-server")]
pub use network::{StatsServer, DEFAULT_STATS_PORT};
