//! HTTP stats server for router monitoring.
//!
//! Provides a simple `/stats` endpoint that returns router counters as JSON.
//! Uses `tiny_http` which works on both host and ESP32 (via std::net).
//!
//! # Example Response
//!
//! ```json
//! {
//!   "rx_dupe": 230,
//!   "tx_relay_canceled": 41,
//!   "ack_cancels": 3,
//!   "rebroadcasts": 150,
//!   "throttled": 12,
//!   ...
//! }
//! ```

use crate::router::RouterStats;
use log::{error, info, warn};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Response, Server};

/// Default port for the stats server.
pub const DEFAULT_STATS_PORT: u16 = 8080;

/// Poll interval for the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// HTTP stats server.
///
/// Runs in a background thread and serves router statistics as JSON.
pub struct StatsServer {
    /// Server thread handle.
    handle: Option<thread::JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
    /// Address the server is bound to.
    addr: String,
}

impl StatsServer {
    /// Start the stats server.
    ///
    /// # Arguments
    ///
    /// * `bind_addr` - IP address to bind to (use `None` for 0.0.0.0)
    /// * `port` - Port to listen on (0 picks a free port)
    /// * `stats` - Shared counters to serve
    ///
    /// # Returns
    ///
    /// A handle to the running server. Drop it to stop the server.
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        stats: Arc<RouterStats>,
    ) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;

        let addr = server
            .server_addr()
            .to_ip()
            .map(|a| a.to_string())
            .unwrap_or(addr);
        info!("Stats server listening on http://{}/stats", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::run_server(server, stats, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            addr,
        })
    }

    /// Address the server is listening on (`ip:port`).
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Run the server loop.
    fn run_server(server: Server, stats: Arc<RouterStats>, shutdown: Arc<AtomicBool>) {
        let content_type = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            .expect("static header");
        let allow_get = Header::from_bytes(&b"Allow"[..], &b"GET"[..]).expect("static header");

        loop {
            // Acquire pairs with the Release store in stop()
            if shutdown.load(Ordering::Acquire) {
                info!("Stats server shutting down");
                break;
            }

            match server.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => {
                    let response = if request.method() != &Method::Get {
                        Response::from_string("Method Not Allowed")
                            .with_status_code(405)
                            .with_header(allow_get.clone())
                    } else if matches!(request.url(), "/stats" | "/stats/") {
                        Response::from_string(stats.to_json())
                            .with_header(content_type.clone())
                            .with_status_code(200)
                    } else {
                        Response::from_string("Not Found").with_status_code(404)
                    };

                    if let Err(e) = request.respond(response) {
                        warn!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the server.
    ///
    /// Note: May take up to 100ms due to polling interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsServer {
    fn drop(&mut self) {
        self.stop();
    }
}
