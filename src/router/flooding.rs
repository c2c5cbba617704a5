//! Flooding router: duplicate handling and the rebroadcast policy engine.
//!
//! Every node runs this independently. There is no coordinator: the mesh
//! stays consistent through redundant per-node decisions plus `(from, id)`
//! duplicate suppression.
//!
//! # Example
//!
//! ```
//! use std::time::Instant;
//! use mesh_flood_rs_esp32::config::{RouterConfig, Role};
//! use mesh_flood_rs_esp32::dedup::SeenCache;
//! use mesh_flood_rs_esp32::packet::{Data, Packet, PortNum, NODENUM_BROADCAST};
//! use mesh_flood_rs_esp32::router::{FloodingRouter, NodeIdentity, ReceiveOutcome, TxQueue};
//!
//! let mut router = FloodingRouter::new(
//!     NodeIdentity::new(0x0000_00AA),
//!     RouterConfig::with_role(Role::Client),
//!     TxQueue::default(),
//!     SeenCache::default(),
//! )
//! .unwrap();
//!
//! let packet = Packet::decoded(0x0000_00BB, NODENUM_BROADCAST, 42, Data::new(PortNum::TextMessage), 3);
//! let now = Instant::now();
//!
//! assert!(matches!(router.handle_received(&packet, now), ReceiveOutcome::Accepted(_)));
//! assert_eq!(router.base().len(), 1);
//! assert_eq!(router.handle_received(&packet, now), ReceiveOutcome::Duplicate);
//! ```

use super::hops::{apply_client_hops, apply_router_hops, constrain_hops, grant_ok_to_mqtt};
use super::{NodeIdentity, RadioInterface, RouterBase, RouterStats};
use crate::config::{Role, RouterConfig};
use crate::dedup::{SeenCache, SeenPackets};
use crate::error::{ConfigError, RouterError};
use crate::packet::{Packet, TransportMechanism, NO_NEXT_HOP_PREFERENCE};
use crate::recency::{RecencyThrottle, TrackedCategory};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

/// Result of duplicate classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// First sighting of `(from, id)`.
    Fresh,
    /// Already seen. The caller must stop processing the packet.
    Duplicate,
}

/// Why a packet was not considered for rebroadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Origin is on the ignore list.
    IgnoredNode,
    /// Addressed to this node.
    ToUs,
    /// No hops left.
    HopLimitExhausted,
    /// Originated by this node.
    FromUs,
    /// Id 0 packets are never relayed.
    ZeroId,
    /// Role or rebroadcast mode forbids relaying.
    NotRebroadcaster,
}

/// Outcome of the rebroadcast policy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the outcome records whether the packet was relayed"]
pub enum RebroadcastOutcome {
    /// Not eligible for rebroadcast.
    Skipped(SkipReason),
    /// Suppressed by the recency throttle.
    Throttled(TrackedCategory),
    /// Mutated copy handed to the send path with these hop fields.
    Rebroadcast {
        /// Outgoing `hop_start`.
        hop_start: u8,
        /// Outgoing `hop_limit`.
        hop_limit: u8,
    },
    /// Relay abandoned. Counted, never surfaced to the mesh.
    Failed(RouterError),
}

/// Result of handling a received packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Seen before; filtered.
    Duplicate,
    /// Filtered by the base router.
    Filtered,
    /// Passed on for local handling, with the rebroadcast decision.
    Accepted(RebroadcastOutcome),
}

/// Flood routing layer for one node.
///
/// Owns the node-local recency tables and seen-packet store. Runs
/// synchronously on the thread that dispatches receive and send events.
pub struct FloodingRouter<B, C = SeenCache> {
    identity: NodeIdentity,
    config: RouterConfig,
    base: B,
    seen: C,
    throttle: RecencyThrottle,
    iface: Option<Box<dyn RadioInterface + Send>>,
    stats: Arc<RouterStats>,
}

impl<B: RouterBase, C: SeenPackets> FloodingRouter<B, C> {
    /// Create a router.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        identity: NodeIdentity,
        config: RouterConfig,
        base: B,
        seen: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let throttle = RecencyThrottle::new(&config.throttle)?;
        info!(
            "Flooding router 0x{:08x} started as {} (rebroadcaster: {})",
            identity.node_num(),
            config.role,
            config.is_rebroadcaster()
        );
        Ok(Self {
            identity,
            config,
            base,
            seen,
            throttle,
            iface: None,
            stats: Arc::new(RouterStats::new()),
        })
    }

    /// Attach the radio interface used to clamp late-rebroadcast windows.
    pub fn with_radio_interface(mut self, iface: Box<dyn RadioInterface + Send>) -> Self {
        self.iface = Some(iface);
        self
    }

    /// Share an existing counter set (e.g. one served by the stats server).
    pub fn with_stats(mut self, stats: Arc<RouterStats>) -> Self {
        self.stats = stats;
        self
    }

    /// This node's identity.
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Active configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Underlying router.
    pub fn base(&self) -> &B {
        &self.base
    }

    /// Underlying router (mutable, e.g. to drain its queue).
    pub fn base_mut(&mut self) -> &mut B {
        &mut self.base
    }

    /// Recency tracking tables.
    pub fn throttle(&self) -> &RecencyThrottle {
        &self.throttle
    }

    /// Counters.
    pub fn stats(&self) -> &Arc<RouterStats> {
        &self.stats
    }

    /// Send hook for packets this node originates.
    ///
    /// Stamps `relay_node` with our short id and records the packet as seen,
    /// so an echo of it is treated as a duplicate rather than a foreign
    /// retransmission. Never blocks: a full queue is reported to the caller.
    pub fn send(&mut self, mut packet: Packet, now: Instant) -> Result<(), RouterError> {
        packet.relay_node = self.identity.relay_byte();
        // Result ignored: this call only records the packet.
        let _ = self.seen.was_seen_recently(&packet, now);
        RouterStats::incr(&self.stats.local_sent);

        self.base.send(packet).map_err(|e| self.record_send_error(e))
    }

    /// Full receive path: classify, then sniff and maybe rebroadcast.
    pub fn handle_received(&mut self, packet: &Packet, now: Instant) -> ReceiveOutcome {
        if self.classify(packet, now) == Classification::Duplicate {
            return ReceiveOutcome::Duplicate;
        }
        if self.base.should_filter_received(packet) {
            return ReceiveOutcome::Filtered;
        }
        ReceiveOutcome::Accepted(self.sniff_received(packet, now))
    }

    /// True if the packet must not be processed further.
    pub fn should_filter_received(&mut self, packet: &Packet, now: Instant) -> bool {
        self.classify(packet, now) == Classification::Duplicate
            || self.base.should_filter_received(packet)
    }

    /// Duplicate classifier.
    ///
    /// On a duplicate, either relays again for a retrying originator or
    /// applies the cancellation policy.
    pub fn classify(&mut self, packet: &Packet, now: Instant) -> Classification {
        if !self.seen.was_seen_recently(packet, now) {
            return Classification::Fresh;
        }

        debug!(
            "Ignore dupe incoming msg from 0x{:08x} id 0x{:08x}",
            packet.from, packet.id
        );
        RouterStats::incr(&self.stats.rx_dupe);

        if packet.is_repeated_original() {
            debug!("Repeated reliable tx");
            // Relay again so the retrying sender gets an implicit ACK.
            if !self.base.find_in_tx_queue(packet.from, packet.id) {
                let outcome = self.maybe_rebroadcast(packet, now);
                if matches!(outcome, RebroadcastOutcome::Rebroadcast { .. }) {
                    RouterStats::incr(&self.stats.retry_relays);
                }
            }
        } else {
            self.maybe_cancel_dupe(packet);
        }

        Classification::Duplicate
    }

    /// Cancellation policy for a duplicate heard from elsewhere.
    ///
    /// Client-class nodes withdraw their own pending relay of a radio packet.
    /// ROUTER_LATE shortens its late window instead. Other router-class roles
    /// keep their relay.
    pub fn maybe_cancel_dupe(&mut self, packet: &Packet) {
        let role = self.config.role;

        if !role.is_router_class()
            && packet.transport_mechanism == TransportMechanism::Radio
            && self.base.cancel_sending(packet.from, packet.id)
        {
            debug!(
                "Cancelled pending relay of 0x{:08x}/0x{:08x}",
                packet.from, packet.id
            );
            RouterStats::incr(&self.stats.tx_relay_canceled);
        }

        if role == Role::RouterLate {
            if let Some(iface) = self.iface.as_mut() {
                iface.clamp_to_late_rebroadcast_window(packet.from, packet.id);
                RouterStats::incr(&self.stats.late_window_clamps);
            }
        }
    }

    /// Observe a fresh packet.
    ///
    /// An ACK or reply for someone else proves the directed message it
    /// answers already arrived, so our pending relay of it is withdrawn.
    pub fn sniff_received(&mut self, packet: &Packet, now: Instant) -> RebroadcastOutcome {
        if let Some(data) = packet.decoded_data() {
            if data.is_ack_or_reply()
                && !self.identity.is_to_us(packet)
                && !NodeIdentity::is_broadcast(packet.to)
            {
                debug!("Rxd an ACK/reply not for me, cancel rebroadcast");
                if self.base.cancel_sending(packet.to, data.request_id) {
                    RouterStats::incr(&self.stats.ack_cancels);
                }
            }
        }

        let outcome = self.maybe_rebroadcast(packet, now);
        self.base.sniff_received(packet);
        outcome
    }

    /// Rebroadcast policy engine.
    ///
    /// Checks eligibility, mutates a copy of the packet for its category and
    /// our role, and hands the copy straight to the base send path (bypassing
    /// [`send`](Self::send), so it is not recorded or evaluated again).
    pub fn maybe_rebroadcast(&mut self, packet: &Packet, now: Instant) -> RebroadcastOutcome {
        if let Some(reason) = self.skip_reason(packet) {
            return RebroadcastOutcome::Skipped(reason);
        }

        if let Err(e) = packet.validate() {
            warn!(
                "Not relaying 0x{:08x}/0x{:08x}: {}",
                packet.from, packet.id, e
            );
            RouterStats::incr(&self.stats.malformed);
            return RebroadcastOutcome::Failed(e);
        }

        let Some(mut tosend) = self.base.alloc_copy(packet) else {
            warn!("No packet memory to relay 0x{:08x}/0x{:08x}", packet.from, packet.id);
            RouterStats::incr(&self.stats.alloc_failures);
            return RebroadcastOutcome::Failed(RouterError::AllocationFailure);
        };

        if self.config.constrained_hops {
            constrain_hops(&mut tosend);
        }
        tosend.next_hop = NO_NEXT_HOP_PREFERENCE;

        let role = self.config.role;
        if role.is_router_class() {
            if let Some(category) = TrackedCategory::of(packet) {
                if self.throttle.should_drop(packet.from, category, now) {
                    RouterStats::incr(&self.stats.throttled);
                    return RebroadcastOutcome::Throttled(category);
                }
            }
            apply_router_hops(role, &mut tosend);
        } else {
            apply_client_hops(&mut tosend);
        }

        if grant_ok_to_mqtt(&mut tosend) {
            debug!("Setting OK-to-MQTT bit on relayed packet");
        }

        let hop_start = tosend.hop_start;
        let hop_limit = tosend.hop_limit;
        info!(
            "Rebroadcast received floodmsg 0x{:08x}/0x{:08x} (hop_start {}, hop_limit {})",
            packet.from, packet.id, hop_start, hop_limit
        );

        match self.base.send(tosend) {
            Ok(()) => {
                RouterStats::incr(&self.stats.rebroadcasts);
                RebroadcastOutcome::Rebroadcast {
                    hop_start,
                    hop_limit,
                }
            }
            Err(e) => RebroadcastOutcome::Failed(self.record_send_error(e)),
        }
    }

    /// First eligibility gate the packet fails, if any.
    fn skip_reason(&self, packet: &Packet) -> Option<SkipReason> {
        if self.config.is_ignored(packet.from) {
            debug!("Ignoring rebroadcast from blocked node 0x{:08x}", packet.from);
            return Some(SkipReason::IgnoredNode);
        }
        if self.identity.is_to_us(packet) {
            return Some(SkipReason::ToUs);
        }
        if packet.hop_limit == 0 {
            return Some(SkipReason::HopLimitExhausted);
        }
        if self.identity.is_from_us(packet) {
            return Some(SkipReason::FromUs);
        }
        if packet.id == 0 {
            debug!("Ignore 0 id broadcast");
            return Some(SkipReason::ZeroId);
        }
        if !self.config.is_rebroadcaster() {
            debug!("No rebroadcast: Role = CLIENT_MUTE or Rebroadcast Mode = NONE");
            return Some(SkipReason::NotRebroadcaster);
        }
        None
    }

    fn record_send_error(&self, e: RouterError) -> RouterError {
        if e == RouterError::QueueFull {
            RouterStats::incr(&self.stats.queue_full);
        }
        warn!("Send failed: {}", e);
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RebroadcastMode, ThrottleConfig};
    use crate::dedup::SeenCacheConfig;
    use crate::packet::{
        Data, NodeNum, PacketId, PortNum, BITFIELD_OK_TO_MQTT_MASK, HOP_MAX, NODENUM_BROADCAST,
    };
    use crate::router::{TxQueue, TxQueueConfig};
    use std::sync::Mutex;
    use std::time::Duration;

    const ME: NodeNum = 0x0000_1001;
    const ALICE: NodeNum = 0x0000_2002;
    const BOB: NodeNum = 0x0000_3003;
    const CAROL: NodeNum = 0x0000_4004;

    /// Base router that records every call.
    #[derive(Default)]
    struct RecordingBase {
        sent: Vec<Packet>,
        cancels: Vec<(NodeNum, PacketId)>,
        queued: Vec<(NodeNum, PacketId)>,
        sniffed: usize,
        no_memory: bool,
        queue_full: bool,
        filter_all: bool,
    }

    impl RouterBase for RecordingBase {
        fn send(&mut self, packet: Packet) -> Result<(), RouterError> {
            if self.queue_full {
                return Err(RouterError::QueueFull);
            }
            self.sent.push(packet);
            Ok(())
        }

        fn cancel_sending(&mut self, from: NodeNum, id: PacketId) -> bool {
            self.cancels.push((from, id));
            true
        }

        fn find_in_tx_queue(&self, from: NodeNum, id: PacketId) -> bool {
            self.queued.contains(&(from, id))
        }

        fn alloc_copy(&mut self, packet: &Packet) -> Option<Packet> {
            if self.no_memory {
                None
            } else {
                Some(packet.clone())
            }
        }

        fn should_filter_received(&mut self, _packet: &Packet) -> bool {
            self.filter_all
        }

        fn sniff_received(&mut self, _packet: &Packet) {
            self.sniffed += 1;
        }
    }

    #[derive(Clone, Default)]
    struct RecordingRadio(Arc<Mutex<Vec<(NodeNum, PacketId)>>>);

    impl RadioInterface for RecordingRadio {
        fn clamp_to_late_rebroadcast_window(&mut self, from: NodeNum, id: PacketId) {
            self.0.lock().unwrap().push((from, id));
        }
    }

    fn router(role: Role) -> FloodingRouter<RecordingBase> {
        router_with(RouterConfig::with_role(role))
    }

    fn router_with(config: RouterConfig) -> FloodingRouter<RecordingBase> {
        FloodingRouter::new(
            NodeIdentity::new(ME),
            config,
            RecordingBase::default(),
            SeenCache::default(),
        )
        .unwrap()
    }

    fn text(from: NodeNum, to: NodeNum, id: PacketId, hops: u8) -> Packet {
        Packet::decoded(from, to, id, Data::new(PortNum::TextMessage), hops)
    }

    fn port(from: NodeNum, id: PacketId, portnum: PortNum, hops: u8) -> Packet {
        Packet::decoded(from, NODENUM_BROADCAST, id, Data::new(portnum), hops)
    }

    fn relayed(p: &Packet) -> Packet {
        Packet {
            hop_limit: p.hop_limit - 1,
            ..p.clone()
        }
    }

    // ---- eligibility gate ----

    #[test]
    fn test_client_relays_with_one_hop_spent() {
        let mut r = router(Role::Client);
        let mut p = text(ALICE, NODENUM_BROADCAST, 1, 3);
        p.next_hop = 0x42;

        let outcome = r.maybe_rebroadcast(&p, Instant::now());
        assert_eq!(
            outcome,
            RebroadcastOutcome::Rebroadcast {
                hop_start: 3,
                hop_limit: 2
            }
        );

        let sent = &r.base().sent[0];
        assert_eq!(sent.hop_limit, 2);
        assert_eq!(sent.next_hop, NO_NEXT_HOP_PREFERENCE);
        assert_eq!(sent.from, ALICE);
        assert_eq!(r.stats().snapshot().rebroadcasts, 1);
    }

    #[test]
    fn test_never_relays_own_packets() {
        let mut r = router(Role::Router);
        let p = text(ME, NODENUM_BROADCAST, 1, 3);
        assert_eq!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Skipped(SkipReason::FromUs)
        );
        assert!(r.base().sent.is_empty());
    }

    #[test]
    fn test_packets_to_us_not_relayed() {
        let mut r = router(Role::Client);
        let p = text(ALICE, ME, 1, 3);
        assert_eq!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Skipped(SkipReason::ToUs)
        );
    }

    #[test]
    fn test_exhausted_hop_limit_not_relayed() {
        let mut r = router(Role::Client);
        let mut p = text(ALICE, NODENUM_BROADCAST, 1, 3);
        p.hop_limit = 0;
        assert_eq!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Skipped(SkipReason::HopLimitExhausted)
        );
    }

    #[test]
    fn test_zero_id_not_relayed() {
        let mut r = router(Role::Client);
        let p = text(ALICE, NODENUM_BROADCAST, 0, 3);
        assert_eq!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Skipped(SkipReason::ZeroId)
        );
    }

    #[test]
    fn test_ignored_node_not_relayed() {
        let mut r = router_with(RouterConfig {
            ignored_nodes: vec![ALICE],
            ..RouterConfig::with_role(Role::Router)
        });
        let p = text(ALICE, NODENUM_BROADCAST, 1, 3);
        assert_eq!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Skipped(SkipReason::IgnoredNode)
        );
        assert!(r.base().sent.is_empty());
    }

    #[test]
    fn test_client_mute_never_relays() {
        let mut r = router(Role::ClientMute);
        let now = Instant::now();
        let mut packets = vec![
            text(ALICE, NODENUM_BROADCAST, 1, 7),
            text(ALICE, BOB, 2, 3),
            port(ALICE, 3, PortNum::Telemetry, 3),
            port(ALICE, 4, PortNum::Position, 1),
            Packet::encrypted(ALICE, NODENUM_BROADCAST, 5, vec![9; 16], 3),
        ];
        // Retrying originator duplicates go through the engine too
        packets.push(packets[0].clone());

        for p in &packets {
            let _ = r.handle_received(p, now);
        }
        assert!(r.base().sent.is_empty());
        assert_eq!(r.stats().snapshot().rebroadcasts, 0);
    }

    #[test]
    fn test_rebroadcast_mode_none_never_relays() {
        let mut r = router_with(RouterConfig {
            rebroadcast_mode: RebroadcastMode::None,
            ..RouterConfig::with_role(Role::Router)
        });
        assert_eq!(
            r.maybe_rebroadcast(&text(ALICE, NODENUM_BROADCAST, 1, 3), Instant::now()),
            RebroadcastOutcome::Skipped(SkipReason::NotRebroadcaster)
        );
    }

    #[test]
    fn test_malformed_not_relayed() {
        let mut r = router(Role::Client);
        let mut p = text(ALICE, NODENUM_BROADCAST, 1, 3);
        p.hop_start = HOP_MAX + 1;

        assert!(matches!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Failed(RouterError::Malformed(_))
        ));
        assert!(r.base().sent.is_empty());
        assert_eq!(r.stats().snapshot().malformed, 1);
    }

    #[test]
    fn test_hop_limit_above_hop_start_not_relayed() {
        let mut r = router_with(RouterConfig {
            constrained_hops: true,
            ..RouterConfig::with_role(Role::Client)
        });
        let mut p = text(ALICE, NODENUM_BROADCAST, 1, 2);
        p.hop_limit = 5;

        assert_eq!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Failed(RouterError::Malformed("hop_limit exceeds hop_start"))
        );
        assert!(r.base().sent.is_empty());
        assert_eq!(r.stats().snapshot().malformed, 1);
    }

    #[test]
    fn test_allocation_failure_counted() {
        let mut r = router(Role::Client);
        r.base_mut().no_memory = true;

        assert_eq!(
            r.maybe_rebroadcast(&text(ALICE, NODENUM_BROADCAST, 1, 3), Instant::now()),
            RebroadcastOutcome::Failed(RouterError::AllocationFailure)
        );
        assert_eq!(r.stats().snapshot().alloc_failures, 1);
    }

    #[test]
    fn test_relay_fails_when_packet_pool_is_held() {
        let mut r = FloodingRouter::new(
            NodeIdentity::new(ME),
            RouterConfig::with_role(Role::Client),
            TxQueue::new(TxQueueConfig {
                capacity: 8,
                copy_budget: 1,
            })
            .unwrap(),
            SeenCache::default(),
        )
        .unwrap();
        let now = Instant::now();

        assert!(matches!(
            r.maybe_rebroadcast(&text(ALICE, NODENUM_BROADCAST, 1, 3), now),
            RebroadcastOutcome::Rebroadcast { .. }
        ));
        assert_eq!(
            r.maybe_rebroadcast(&text(BOB, NODENUM_BROADCAST, 2, 3), now),
            RebroadcastOutcome::Failed(RouterError::AllocationFailure)
        );
        assert_eq!(r.stats().snapshot().alloc_failures, 1);
        assert_eq!(r.base().len(), 1);

        // Transmitting the first relay frees its buffer.
        r.base_mut().pop_front().unwrap();
        assert!(matches!(
            r.maybe_rebroadcast(&text(CAROL, NODENUM_BROADCAST, 3, 3), now),
            RebroadcastOutcome::Rebroadcast { .. }
        ));
    }

    #[test]
    fn test_full_queue_on_relay_counted() {
        let mut r = router(Role::Client);
        r.base_mut().queue_full = true;

        assert_eq!(
            r.maybe_rebroadcast(&text(ALICE, NODENUM_BROADCAST, 1, 3), Instant::now()),
            RebroadcastOutcome::Failed(RouterError::QueueFull)
        );
        let snap = r.stats().snapshot();
        assert_eq!(snap.queue_full, 1);
        assert_eq!(snap.rebroadcasts, 0);
    }

    // ---- hop mutation ----

    #[test]
    fn test_constrained_profile_caps_relay_depth() {
        let mut r = router_with(RouterConfig {
            constrained_hops: true,
            ..RouterConfig::with_role(Role::Client)
        });
        let mut p = text(ALICE, NODENUM_BROADCAST, 1, 7);
        p.hop_limit = 6;

        assert_eq!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Rebroadcast {
                hop_start: 3,
                hop_limit: 1
            }
        );
    }

    #[test]
    fn test_router_keeps_zero_hop_look_for_node_info() {
        let mut r = router(Role::Router);
        let p = port(ALICE, 1, PortNum::NodeInfo, 3);

        assert_eq!(
            r.maybe_rebroadcast(&p, Instant::now()),
            RebroadcastOutcome::Rebroadcast {
                hop_start: 4,
                hop_limit: 3
            }
        );
    }

    #[test]
    fn test_router_telemetry_is_still_forwarded() {
        // Router and repeater relay telemetry unchanged; only the recency
        // throttle holds it back.
        for role in [Role::Router, Role::Repeater] {
            let mut r = router(role);
            let p = port(ALICE, 1, PortNum::Telemetry, 5);
            assert_eq!(
                r.maybe_rebroadcast(&p, Instant::now()),
                RebroadcastOutcome::Rebroadcast {
                    hop_start: 5,
                    hop_limit: 5
                }
            );
        }
    }

    #[test]
    fn test_hop_limit_never_increases() {
        let roles = [
            Role::Client,
            Role::Router,
            Role::RouterLate,
            Role::Repeater,
            Role::Tracker,
        ];
        let ports = [
            PortNum::TextMessage,
            PortNum::Telemetry,
            PortNum::Position,
            PortNum::NodeInfo,
            PortNum::Other(256),
        ];
        let mut id = 1;

        for role in roles {
            for constrained_hops in [false, true] {
                let mut r = router_with(RouterConfig {
                    constrained_hops,
                    ..RouterConfig::with_role(role)
                });
                for hop_limit in 1..=HOP_MAX {
                    let mut packets: Vec<Packet> = ports
                        .iter()
                        .map(|&portnum| port(ALICE, 0, portnum, HOP_MAX))
                        .collect();
                    packets.push(Packet::encrypted(ALICE, NODENUM_BROADCAST, 0, vec![1], HOP_MAX));

                    for mut p in packets {
                        id += 1;
                        p.id = id;
                        p.hop_limit = hop_limit;
                        if let RebroadcastOutcome::Rebroadcast {
                            hop_start: out_start,
                            hop_limit: out_limit,
                        } = r.maybe_rebroadcast(&p, Instant::now())
                        {
                            assert!(out_limit <= hop_limit, "{} raised hop_limit", role);
                            assert!(out_start <= HOP_MAX);
                        }
                    }
                }
                assert!(!r.base().sent.is_empty());
            }
        }
    }

    #[test]
    fn test_bitfield_repair() {
        let mut r = router(Role::Client);
        let mut data = Data::new(PortNum::TextMessage);
        data.has_bitfield = true;
        data.bitfield = 0b0110;
        let p = Packet::decoded(ALICE, NODENUM_BROADCAST, 1, data, 3);

        let _ = r.maybe_rebroadcast(&p, Instant::now());

        let sent = r.base().sent[0].decoded_data().unwrap();
        assert_eq!(sent.bitfield, 0b0110 | BITFIELD_OK_TO_MQTT_MASK);
        // Original untouched
        assert_eq!(p.decoded_data().unwrap().bitfield, 0b0110);
    }

    // ---- recency throttle ----

    fn throttled_router(role: Role) -> FloodingRouter<RecordingBase> {
        router_with(RouterConfig {
            throttle: ThrottleConfig {
                max_tracked_nodes: 2,
                telemetry_timeout: Duration::from_secs(30),
                position_timeout: Duration::from_secs(30),
                node_info_timeout: Duration::from_secs(30),
                encrypted_timeout: Duration::from_secs(120),
            },
            ..RouterConfig::with_role(role)
        })
    }

    #[test]
    fn test_recency_window_suppresses_second_position() {
        let mut r = throttled_router(Role::Router);
        let t0 = Instant::now();

        assert!(matches!(
            r.maybe_rebroadcast(&port(ALICE, 1, PortNum::Position, 3), t0),
            RebroadcastOutcome::Rebroadcast { .. }
        ));
        assert_eq!(
            r.maybe_rebroadcast(&port(ALICE, 2, PortNum::Position, 3), t0 + Duration::from_secs(10)),
            RebroadcastOutcome::Throttled(TrackedCategory::Position)
        );
        assert!(matches!(
            r.maybe_rebroadcast(&port(ALICE, 3, PortNum::Position, 3), t0 + Duration::from_secs(30)),
            RebroadcastOutcome::Rebroadcast { .. }
        ));
        assert_eq!(r.base().sent.len(), 2);
        assert_eq!(r.stats().snapshot().throttled, 1);
    }

    #[test]
    fn test_encrypted_throttled_per_origin() {
        let mut r = throttled_router(Role::RouterLate);
        let t0 = Instant::now();
        let enc = |from, id| Packet::encrypted(from, NODENUM_BROADCAST, id, vec![7; 8], 3);

        assert!(matches!(
            r.maybe_rebroadcast(&enc(ALICE, 1), t0),
            RebroadcastOutcome::Rebroadcast { .. }
        ));
        assert!(matches!(
            r.maybe_rebroadcast(&enc(BOB, 2), t0),
            RebroadcastOutcome::Rebroadcast { .. }
        ));
        assert_eq!(
            r.maybe_rebroadcast(&enc(ALICE, 3), t0 + Duration::from_secs(60)),
            RebroadcastOutcome::Throttled(TrackedCategory::Encrypted)
        );
    }

    #[test]
    fn test_round_robin_eviction_forgets_earliest_origin() {
        let mut r = throttled_router(Role::Repeater);
        let t0 = Instant::now();

        for (id, from) in [ALICE, BOB, CAROL].into_iter().enumerate() {
            let _ = r.maybe_rebroadcast(&port(from, id as PacketId + 1, PortNum::Telemetry, 3), t0);
        }
        // Capacity 2: ALICE was overwritten by CAROL and is unseen again
        assert!(matches!(
            r.maybe_rebroadcast(&port(ALICE, 10, PortNum::Telemetry, 3), t0),
            RebroadcastOutcome::Rebroadcast { .. }
        ));
        assert!(!r.throttle().table(TrackedCategory::Telemetry).contains(BOB));
    }

    #[test]
    fn test_clients_and_text_are_not_throttled() {
        let mut client = throttled_router(Role::Client);
        let mut router = throttled_router(Role::Router);
        let t0 = Instant::now();

        for id in 1..=3 {
            assert!(matches!(
                client.maybe_rebroadcast(&port(ALICE, id, PortNum::Position, 3), t0),
                RebroadcastOutcome::Rebroadcast { .. }
            ));
            assert!(matches!(
                router.maybe_rebroadcast(&port(ALICE, id, PortNum::TextMessage, 3), t0),
                RebroadcastOutcome::Rebroadcast { .. }
            ));
        }
    }

    // ---- duplicates and cancellation ----

    #[test]
    fn test_duplicate_suppression_and_expiry() {
        let mut r = FloodingRouter::new(
            NodeIdentity::new(ME),
            RouterConfig::default(),
            RecordingBase::default(),
            SeenCache::new(SeenCacheConfig {
                max_entries: 16,
                ttl: Duration::from_secs(60),
            })
            .unwrap(),
        )
        .unwrap();
        let t0 = Instant::now();
        let p = text(ALICE, NODENUM_BROADCAST, 7, 3);

        assert_eq!(r.classify(&p, t0), Classification::Fresh);
        assert_eq!(
            r.classify(&relayed(&p), t0 + Duration::from_secs(1)),
            Classification::Duplicate
        );
        assert_eq!(
            r.classify(&relayed(&p), t0 + Duration::from_secs(61)),
            Classification::Fresh
        );
        assert_eq!(r.stats().snapshot().rx_dupe, 1);
    }

    #[test]
    fn test_client_cancels_own_relay_on_radio_dupe() {
        let mut r = router(Role::Client);
        let now = Instant::now();
        let p = text(ALICE, NODENUM_BROADCAST, 7, 3);

        let _ = r.handle_received(&p, now);
        assert_eq!(r.handle_received(&relayed(&p), now), ReceiveOutcome::Duplicate);

        assert_eq!(r.base().cancels, vec![(ALICE, 7)]);
        assert_eq!(r.stats().snapshot().tx_relay_canceled, 1);
    }

    #[test]
    fn test_bridged_dupe_does_not_cancel() {
        let mut r = router(Role::Client);
        let now = Instant::now();
        let p = text(ALICE, NODENUM_BROADCAST, 7, 3);

        let _ = r.handle_received(&p, now);
        let mut bridged = relayed(&p);
        bridged.transport_mechanism = TransportMechanism::Bridged;
        let _ = r.handle_received(&bridged, now);

        assert!(r.base().cancels.is_empty());
    }

    #[test]
    fn test_router_class_keeps_relay_on_dupe() {
        for role in [Role::Router, Role::Repeater, Role::RouterLate] {
            let mut r = router(role);
            let now = Instant::now();
            let p = text(ALICE, NODENUM_BROADCAST, 7, 3);

            let _ = r.handle_received(&p, now);
            let _ = r.handle_received(&relayed(&p), now);
            assert!(r.base().cancels.is_empty(), "{} cancelled", role);
        }
    }

    #[test]
    fn test_router_late_clamps_window() {
        let radio = RecordingRadio::default();
        let mut r = router(Role::RouterLate).with_radio_interface(Box::new(radio.clone()));
        let now = Instant::now();
        let p = text(ALICE, NODENUM_BROADCAST, 7, 3);

        let _ = r.handle_received(&p, now);
        let _ = r.handle_received(&relayed(&p), now);

        assert_eq!(*radio.0.lock().unwrap(), vec![(ALICE, 7)]);
        assert!(r.base().cancels.is_empty());
        assert_eq!(r.stats().snapshot().late_window_clamps, 1);
    }

    #[test]
    fn test_retrying_originator_gets_relayed_again() {
        let mut r = router(Role::Client);
        let now = Instant::now();
        let p = text(ALICE, NODENUM_BROADCAST, 7, 3);

        let _ = r.handle_received(&p, now);
        assert_eq!(r.handle_received(&p, now), ReceiveOutcome::Duplicate);

        assert_eq!(r.base().sent.len(), 2);
        assert!(r.base().cancels.is_empty());
        assert_eq!(r.stats().snapshot().retry_relays, 1);
    }

    #[test]
    fn test_retry_still_queued_not_relayed_twice() {
        let mut r = router(Role::Client);
        let now = Instant::now();
        let p = text(ALICE, NODENUM_BROADCAST, 7, 3);

        let _ = r.handle_received(&p, now);
        r.base_mut().queued.push((ALICE, 7));
        let _ = r.handle_received(&p, now);

        assert_eq!(r.base().sent.len(), 1);
    }

    #[test]
    fn test_ack_cancels_pending_directed_relay() {
        let mut r = FloodingRouter::new(
            NodeIdentity::new(ME),
            RouterConfig::with_role(Role::Client),
            TxQueue::new(TxQueueConfig::with_capacity(8)).unwrap(),
            SeenCache::default(),
        )
        .unwrap();
        let now = Instant::now();

        // ALICE -> BOB directed message, relayed by us
        let message = text(ALICE, BOB, 0x77, 3);
        let _ = r.handle_received(&message, now);
        assert!(r.base().find_in_tx_queue(ALICE, 0x77));

        // BOB's ACK to ALICE, heard via a third party before our relay went out
        let mut ack_data = Data::new(PortNum::Routing);
        ack_data.request_id = 0x77;
        let mut ack = Packet::decoded(BOB, ALICE, 0x99, ack_data, 3);
        ack.hop_limit = 2;
        let _ = r.handle_received(&ack, now);

        assert!(!r.base().find_in_tx_queue(ALICE, 0x77));
        assert_eq!(r.stats().snapshot().ack_cancels, 1);
    }

    #[test]
    fn test_ack_for_us_or_broadcast_does_not_cancel() {
        let mut r = router(Role::Client);
        let now = Instant::now();

        let mut data = Data::new(PortNum::Routing);
        data.request_id = 0x77;
        let to_us = Packet::decoded(BOB, ME, 1, data.clone(), 3);
        let broadcast = Packet::decoded(BOB, NODENUM_BROADCAST, 2, data, 3);

        let _ = r.sniff_received(&to_us, now);
        let _ = r.sniff_received(&broadcast, now);
        assert!(r.base().cancels.is_empty());
        assert_eq!(r.base().sniffed, 2);
    }

    #[test]
    fn test_reply_cancels_by_request_id() {
        let mut r = router(Role::Client);
        let mut data = Data::new(PortNum::TextMessage);
        data.reply_id = 0x55;
        let reply = Packet::decoded(BOB, ALICE, 3, data, 3);

        let _ = r.sniff_received(&reply, Instant::now());
        assert_eq!(r.base().cancels, vec![(ALICE, 0)]);
    }

    #[test]
    fn test_base_filter_applies_to_fresh_packets() {
        let mut r = router(Role::Client);
        r.base_mut().filter_all = true;

        assert_eq!(
            r.handle_received(&text(ALICE, NODENUM_BROADCAST, 1, 3), Instant::now()),
            ReceiveOutcome::Filtered
        );
        assert!(r.base().sent.is_empty());
    }

    // ---- send hook ----

    #[test]
    fn test_send_hook_stamps_and_records() {
        let mut r = router(Role::Client);
        let now = Instant::now();
        let p = text(ME, NODENUM_BROADCAST, 5, 3);

        r.send(p.clone(), now).unwrap();
        assert_eq!(r.base().sent[0].relay_node, 0x01);

        // Our own packet echoed back by a neighbour is a duplicate
        assert_eq!(r.handle_received(&relayed(&p), now), ReceiveOutcome::Duplicate);
        assert_eq!(r.base().sent.len(), 1);
        assert_eq!(r.stats().snapshot().local_sent, 1);
    }

    #[test]
    fn test_send_hook_reports_full_queue() {
        let mut r = router(Role::Client);
        r.base_mut().queue_full = true;

        assert_eq!(
            r.send(text(ME, NODENUM_BROADCAST, 5, 3), Instant::now()),
            Err(RouterError::QueueFull)
        );
        assert_eq!(r.stats().snapshot().queue_full, 1);
    }

    #[test]
    fn test_should_filter_received() {
        let mut r = router(Role::Client);
        let now = Instant::now();
        let p = text(ALICE, NODENUM_BROADCAST, 9, 3);

        assert!(!r.should_filter_received(&p, now));
        assert!(r.should_filter_received(&relayed(&p), now));
    }
}
