//! Host-side flood routing simulation.
//!
//! Builds a line of nodes (each only hears its direct neighbours), has the
//! first node originate a few packets, and steps the mesh until every
//! transmit queue drains. Every relay decision is logged.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin flood-sim -- [nodes] [config.json]
//! RUST_LOG=debug cargo run --bin flood-sim -- 6
//! ```

use log::{debug, error, info, warn};
use mesh_flood_rs_esp32::packet::{Data, NodeNum, PacketId, NODENUM_BROADCAST};
use mesh_flood_rs_esp32::{
    FloodingRouter, NodeIdentity, Packet, PortNum, RadioInterface, ReceiveOutcome, RouterConfig,
    SeenCache, TxQueue,
};
use std::path::Path;
use std::time::{Duration, Instant};

/// Default number of simulated nodes.
const DEFAULT_NODES: usize = 5;

/// Node number of the first simulated node.
const BASE_NODE_NUM: NodeNum = 0x0A00_0000;

/// Simulated time per round.
const ROUND: Duration = Duration::from_millis(250);

/// Safety bound on simulation length.
const MAX_ROUNDS: usize = 1_000;

/// Hop budget used by originators.
const DEFAULT_HOPS: u8 = 3;

/// Radio stub that logs late-window clamps.
struct LoggingRadio(NodeNum);

impl RadioInterface for LoggingRadio {
    fn clamp_to_late_rebroadcast_window(&mut self, from: NodeNum, id: PacketId) {
        debug!(
            "[0x{:08x}] clamp late window for 0x{:08x}/0x{:08x}",
            self.0, from, id
        );
    }
}

type SimNode = FloodingRouter<TxQueue>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let nodes = match args.first().map(|s| s.parse::<usize>()) {
        None => DEFAULT_NODES,
        Some(Ok(n)) if n >= 2 => n,
        Some(_) => {
            error!("Usage: flood-sim [nodes >= 2] [config.json]");
            std::process::exit(2);
        }
    };
    let config = match args.get(1) {
        Some(path) => match RouterConfig::from_path(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => RouterConfig::default(),
    };

    info!("=== Flood simulation: {} nodes as {} ===", nodes, config.role);

    let mut mesh: Vec<SimNode> = match (0..nodes)
        .map(|i| build_node(BASE_NODE_NUM + i as NodeNum, config.clone()))
        .collect::<Result<_, _>>()
    {
        Ok(mesh) => mesh,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let t0 = Instant::now();
    originate(&mut mesh, t0);

    let rounds = run(&mut mesh, t0);
    info!("Mesh drained after {} rounds", rounds);

    for node in &mesh {
        println!(
            "0x{:08x} {}",
            node.identity().node_num(),
            node.stats().to_json()
        );
    }
}

fn build_node(node_num: NodeNum, config: RouterConfig) -> Result<SimNode, String> {
    let router = FloodingRouter::new(
        NodeIdentity::new(node_num),
        config,
        TxQueue::default(),
        SeenCache::default(),
    )
    .map_err(|e| e.to_string())?;
    Ok(router.with_radio_interface(Box::new(LoggingRadio(node_num))))
}

/// First node sends a broadcast, a directed message to the far end, and telemetry.
fn originate(mesh: &mut [SimNode], now: Instant) {
    let last = mesh[mesh.len() - 1].identity().node_num();
    let origin = &mut mesh[0];
    let from = origin.identity().node_num();

    let packets = [
        Packet::decoded(from, NODENUM_BROADCAST, 1, text(b"hello mesh"), DEFAULT_HOPS),
        Packet::decoded(from, last, 2, text(b"hello far end"), DEFAULT_HOPS),
        Packet::decoded(from, NODENUM_BROADCAST, 3, Data::new(PortNum::Telemetry), DEFAULT_HOPS),
    ];
    for packet in packets {
        if let Err(e) = origin.send(packet, now) {
            warn!("Originate failed: {}", e);
        }
    }
}

fn text(body: &[u8]) -> Data {
    Data {
        payload: body.to_vec(),
        ..Data::new(PortNum::TextMessage)
    }
}

/// Step the mesh until no node has anything left to transmit.
fn run(mesh: &mut [SimNode], t0: Instant) -> usize {
    let mut next_id: PacketId = 0x100;

    for round in 0..MAX_ROUNDS {
        let now = t0 + ROUND * round as u32;

        // Each node transmits at most one frame per round.
        let frames: Vec<(usize, Packet)> = mesh
            .iter_mut()
            .enumerate()
            .filter_map(|(i, node)| node.base_mut().pop_front().map(|p| (i, p)))
            .collect();
        if frames.is_empty() {
            return round;
        }

        for (sender, frame) in frames {
            for neighbour in [sender.wrapping_sub(1), sender + 1] {
                let Some(node) = mesh.get_mut(neighbour) else {
                    continue;
                };
                let outcome = node.handle_received(&frame, now);
                debug!(
                    "[0x{:08x}] rx 0x{:08x}/0x{:08x} via {:02x}: {:?}",
                    node.identity().node_num(),
                    frame.from,
                    frame.id,
                    frame.relay_node,
                    outcome
                );

                if should_ack(node, &frame, &outcome) {
                    next_id += 1;
                    let mut ack = Data::new(PortNum::Routing);
                    ack.request_id = frame.id;
                    let me = node.identity().node_num();
                    let reply = Packet::decoded(me, frame.from, next_id, ack, DEFAULT_HOPS);
                    if let Err(e) = node.send(reply, now) {
                        warn!("ACK send failed: {}", e);
                    }
                }
            }
        }
    }

    warn!("Simulation stopped after {} rounds", MAX_ROUNDS);
    MAX_ROUNDS
}

/// Directed, non-ACK packets addressed to this node get an ACK back.
fn should_ack(node: &SimNode, frame: &Packet, outcome: &ReceiveOutcome) -> bool {
    matches!(outcome, ReceiveOutcome::Accepted(_))
        && node.identity().is_to_us(frame)
        && frame
            .decoded_data()
            .is_some_and(|d| d.portnum != PortNum::Routing)
}
