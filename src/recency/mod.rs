//! Per-category recency throttling for chatty packet classes.
//!
//! This module provides:
//! - [`RecencySet`]: a bounded, round-robin set of recently seen origins
//! - [`RecencyThrottle`]: one [`RecencySet`] per [`TrackedCategory`]
//!
//! Router-class nodes consult the throttle before relaying telemetry,
//! position, node info and encrypted packets, so a single chatty origin
//! cannot monopolise airtime on the backbone.

mod set;
mod throttle;

pub use set::{RecencySet, TrackedOrigin};
pub use throttle::{RecencyThrottle, TrackedCategory};
