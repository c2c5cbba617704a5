//! Error types shared by the flooding router and its collaborators.

use std::fmt;

/// Failure kinds on the forwarding path.
///
/// None of these are surfaced to the mesh. The router converts them into a
/// "do not relay" outcome and bumps the matching counter in
/// [`RouterStats`](crate::router::RouterStats).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Outbound send path is saturated. The caller drops the packet.
    QueueFull,
    /// No mutable copy could be obtained for a rebroadcast.
    AllocationFailure,
    /// Packet fields are inconsistent (e.g. hop counters out of range).
    Malformed(&'static str),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "transmit queue full"),
            Self::AllocationFailure => write!(f, "packet allocation failed"),
            Self::Malformed(msg) => write!(f, "malformed packet: {}", msg),
        }
    }
}

impl std::error::Error for RouterError {}

/// Errors raised while loading or validating router configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A parameter is out of range.
    InvalidConfig(&'static str),
    /// The configuration document could not be parsed.
    Parse(String),
    /// The configuration file could not be read.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Self::Parse(msg) => write!(f, "config parse error: {}", msg),
            Self::Io(msg) => write!(f, "config read error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
