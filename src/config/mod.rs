//! Node configuration for the flooding router.
//!
//! This module provides configuration types for the forwarding core.
//!
//! # Components
//!
//! - [`role`] - Device role and rebroadcast mode
//! - [`router`] - Router and recency throttle parameters, JSON loading
//!
//! Configuration is read once at startup. The router treats it as read-only.

mod role;
mod router;

pub use role::{RebroadcastMode, Role};
pub use router::{
    RouterConfig, ThrottleConfig, DEFAULT_ENCRYPTED_TIMEOUT, DEFAULT_MAX_TRACKED_NODES,
    DEFAULT_PACKET_TIMEOUT,
};
