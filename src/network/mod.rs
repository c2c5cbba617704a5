//! Network-facing observability.
//!
//! - [`StatsServer`]: HTTP `/stats` endpoint serving [`RouterStats`] as JSON
//!   (`stats-server` feature)
//!
//! [`RouterStats`]: crate::router::RouterStats

#[cfg(feature = "stats-server")]
mod stats_server;

#[cfg(feature = "stats-server")]
pub use stats_server::{StatsServer, DEFAULT_STATS_PORT};
