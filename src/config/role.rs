//! Device role and rebroadcast mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device role.
///
/// The role decides whether this node relays at all, whether it cancels its
/// own pending relays when another node beats it to it, and which hop policy
/// applies when it does relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Ordinary client, relays as needed.
    #[default]
    Client,
    /// Client that never relays.
    ClientMute,
    /// Infrastructure node, always relays.
    Router,
    /// Legacy router that also acts as a client.
    RouterClient,
    /// Relay-only infrastructure node.
    Repeater,
    /// GPS tracker.
    Tracker,
    /// Telemetry sensor.
    Sensor,
    /// ATAK client.
    Tak,
    /// Client that keeps a low profile.
    ClientHidden,
    /// Broadcasts its location to help recovery.
    LostAndFound,
    /// ATAK tracker.
    TakTracker,
    /// Router that relays after a delay, as a fallback for other paths.
    RouterLate,
}

impl Role {
    /// Router-class roles provide backbone relay and use the router hop policy.
    pub fn is_router_class(self) -> bool {
        matches!(self, Self::Router | Self::RouterLate | Self::Repeater)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Client => "CLIENT",
            Self::ClientMute => "CLIENT_MUTE",
            Self::Router => "ROUTER",
            Self::RouterClient => "ROUTER_CLIENT",
            Self::Repeater => "REPEATER",
            Self::Tracker => "TRACKER",
            Self::Sensor => "SENSOR",
            Self::Tak => "TAK",
            Self::ClientHidden => "CLIENT_HIDDEN",
            Self::LostAndFound => "LOST_AND_FOUND",
            Self::TakTracker => "TAK_TRACKER",
            Self::RouterLate => "ROUTER_LATE",
        };
        f.write_str(name)
    }
}

/// Which received packets the node is willing to rebroadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebroadcastMode {
    /// Rebroadcast everything.
    #[default]
    All,
    /// Rebroadcast everything without trying to decode it.
    AllSkipDecoding,
    /// Only rebroadcast packets from the local channels.
    LocalOnly,
    /// Only rebroadcast packets from known nodes.
    KnownOnly,
    /// Never rebroadcast.
    None,
    /// Only rebroadcast core application ports.
    CorePortnumsOnly,
}
