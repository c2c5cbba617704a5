//! Router configuration and JSON loading.
//!
//! # Example
//!
//! ```
//! use mesh_flood_rs_esp32::config::{RouterConfig, Role};
//!
//! let config = RouterConfig::from_json_str(r#"{
//!     "role": "ROUTER_LATE",
//!     "ignored_nodes": [305419896],
//!     "throttle": { "encrypted_timeout_ms": 600000 }
//! }"#).unwrap();
//!
//! assert_eq!(config.role, Role::RouterLate);
//! assert!(config.is_ignored(0x1234_5678));
//! ```

use super::{RebroadcastMode, Role};
use crate::error::ConfigError;
use crate::packet::NodeNum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of origins tracked per throttled category.
pub const DEFAULT_MAX_TRACKED_NODES: usize = 64;

/// Default recency window for telemetry, position and node info.
pub const DEFAULT_PACKET_TIMEOUT: Duration = Duration::from_secs(60);

/// Default recency window for encrypted packets.
pub const DEFAULT_ENCRYPTED_TIMEOUT: Duration = Duration::from_secs(300);

/// Recency throttle parameters.
///
/// Note: This is `Copy` for efficient passing to constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Tracking table capacity per category.
    pub max_tracked_nodes: usize,
    /// Suppression window for telemetry.
    #[serde(rename = "telemetry_timeout_ms", with = "duration_ms")]
    pub telemetry_timeout: Duration,
    /// Suppression window for position reports.
    #[serde(rename = "position_timeout_ms", with = "duration_ms")]
    pub position_timeout: Duration,
    /// Suppression window for node info.
    #[serde(rename = "node_info_timeout_ms", with = "duration_ms")]
    pub node_info_timeout: Duration,
    /// Suppression window for encrypted packets.
    #[serde(rename = "encrypted_timeout_ms", with = "duration_ms")]
    pub encrypted_timeout: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_tracked_nodes: DEFAULT_MAX_TRACKED_NODES,
            telemetry_timeout: DEFAULT_PACKET_TIMEOUT,
            position_timeout: DEFAULT_PACKET_TIMEOUT,
            node_info_timeout: DEFAULT_PACKET_TIMEOUT,
            encrypted_timeout: DEFAULT_ENCRYPTED_TIMEOUT,
        }
    }
}

impl ThrottleConfig {
    /// Validate configuration parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_tracked_nodes` is 0
    /// - any timeout is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tracked_nodes == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_tracked_nodes must be greater than 0",
            ));
        }
        let timeouts = [
            self.telemetry_timeout,
            self.position_timeout,
            self.node_info_timeout,
            self.encrypted_timeout,
        ];
        if timeouts.iter().any(Duration::is_zero) {
            return Err(ConfigError::InvalidConfig(
                "throttle timeouts must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Flooding router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Device role.
    pub role: Role,
    /// Rebroadcast mode.
    pub rebroadcast_mode: RebroadcastMode,
    /// Origins whose packets are never relayed.
    pub ignored_nodes: Vec<NodeNum>,
    /// Cap relayed packets at two remaining hops, for dense deployments.
    pub constrained_hops: bool,
    /// Recency throttle parameters.
    pub throttle: ThrottleConfig,
}

impl RouterConfig {
    /// Create a configuration for the given role with defaults elsewhere.
    pub fn with_role(role: Role) -> Self {
        Self {
            role,
            ..Default::default()
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.throttle.validate()
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// True if packets from `node` must not be relayed.
    pub fn is_ignored(&self, node: NodeNum) -> bool {
        self.ignored_nodes.contains(&node)
    }

    /// True if this node relays packets at all.
    pub fn is_rebroadcaster(&self) -> bool {
        self.role != Role::ClientMute && self.rebroadcast_mode != RebroadcastMode::None
    }
}

/// Serialize a `Duration` as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
