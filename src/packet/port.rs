//! Application port numbers.

use std::fmt;

/// Port number of a decoded payload.
///
/// Only the ports that flood routing treats specially get their own variant.
/// Every other value is carried through untouched in [`PortNum::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortNum {
    /// Plain text messages.
    TextMessage,
    /// Position reports.
    Position,
    /// Node identity (user info) broadcasts.
    NodeInfo,
    /// Routing control, including ACK/NAK.
    Routing,
    /// Device and environment telemetry.
    Telemetry,
    /// Any other application port.
    Other(u32),
}

impl PortNum {
    /// Wire value of this port.
    pub fn value(self) -> u32 {
        match self {
            Self::TextMessage => 1,
            Self::Position => 3,
            Self::NodeInfo => 4,
            Self::Routing => 5,
            Self::Telemetry => 67,
            Self::Other(v) => v,
        }
    }
}

impl From<u32> for PortNum {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::TextMessage,
            3 => Self::Position,
            4 => Self::NodeInfo,
            5 => Self::Routing,
            67 => Self::Telemetry,
            v => Self::Other(v),
        }
    }
}

impl fmt::Display for PortNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextMessage => write!(f, "TEXT_MESSAGE_APP"),
            Self::Position => write!(f, "POSITION_APP"),
            Self::NodeInfo => write!(f, "NODEINFO_APP"),
            Self::Routing => write!(f, "ROUTING_APP"),
            Self::Telemetry => write!(f, "TELEMETRY_APP"),
            Self::Other(v) => write!(f, "PORT_{}", v),
        }
    }
}
