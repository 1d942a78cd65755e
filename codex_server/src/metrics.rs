//! Prometheus metrics for monitoring the match server.
//!
//! Metrics are exposed in Prometheus text format when an exporter address
//! is configured. Without one, every recording call is a no-op.
//!
//! # Metrics
//!
//! - `connections_total{transport}`: links accepted per transport
//! - `disconnects_total{transport}`: links lost per transport
//! - `remote_calls_total{method}`: calls on the remote object
//! - `sessions_online`: players currently online
//! - `matches_completed_total`: matches that reached final scoring
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use codex_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::connection_opened("stream");
//! ```

use std::{net::SocketAddr, sync::Arc, time::Duration};

use codex::{
    CoordinatorHandle, Message, SessionRegistry,
    game::Phase,
    net::connection::{ConnectionId, SharedConnection, SharedSink, TransportSink},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::{task::JoinHandle, time};

use crate::logging;

/// How often the match gauges are refreshed.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Errors
///
/// Returns an error message if the exporter can't be installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

pub fn connection_opened(transport: &'static str) {
    metrics::counter!("connections_total", "transport" => transport).increment(1);
}

pub fn connection_closed(transport: &'static str) {
    metrics::counter!("disconnects_total", "transport" => transport).increment(1);
}

pub fn remote_call(method: &'static str) {
    metrics::counter!("remote_calls_total", "method" => method).increment(1);
}

pub fn sessions_online(count: usize) {
    metrics::gauge!("sessions_online").set(count as f64);
}

pub fn matches_completed(total: u64) {
    metrics::counter!("matches_completed_total").absolute(total);
}

/// Transport sink that counts and logs session traffic before handing
/// it to the coordinator.
pub struct MeteredSink {
    inner: SharedSink,
    registry: Arc<SessionRegistry>,
    transport: &'static str,
}

impl MeteredSink {
    pub fn new(inner: SharedSink, registry: Arc<SessionRegistry>, transport: &'static str) -> Self {
        Self {
            inner,
            registry,
            transport,
        }
    }
}

impl TransportSink for MeteredSink {
    fn connected(&self, connection: ConnectionId) {
        connection_opened(self.transport);
        self.inner.connected(connection);
    }

    fn join(&self, identity: String, connection: SharedConnection) {
        logging::log_session_event("login", &identity, self.transport);
        self.inner.join(identity, connection);
    }

    fn inbound(&self, connection: ConnectionId, message: Message) {
        self.inner.inbound(connection, message);
    }

    fn disconnected(&self, connection: ConnectionId) {
        connection_closed(self.transport);
        // The coordinator hasn't seen the loss yet, so the mapping is still there.
        let identity = self
            .registry
            .identity_of(connection)
            .map_or_else(|| "-".to_string(), |identity| identity.to_string());
        logging::log_session_event("disconnect", &identity, self.transport);
        self.inner.disconnected(connection);
    }
}

/// Poll the coordinator for the match gauges until it stops.
pub fn spawn_sampler(coordinator: CoordinatorHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        let mut last_phase = Phase::Lobby;
        let mut last_completed = 0;

        loop {
            ticker.tick().await;
            let Some(snapshot) = coordinator.snapshot().await else {
                break;
            };

            sessions_online(snapshot.online);
            matches_completed(snapshot.matches_completed);

            if snapshot.phase != last_phase {
                logging::log_match_event("phase", &format!("{last_phase} -> {}", snapshot.phase));
                last_phase = snapshot.phase;
            }
            if snapshot.matches_completed > last_completed {
                logging::log_match_event(
                    "completed",
                    &format!("{} matches completed", snapshot.matches_completed),
                );
                last_completed = snapshot.matches_completed;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<&'static str>>,
    }

    impl TransportSink for RecordingSink {
        fn connected(&self, _connection: ConnectionId) {
            self.events.lock().unwrap().push("connected");
        }

        fn join(&self, _identity: String, _connection: SharedConnection) {
            self.events.lock().unwrap().push("join");
        }

        fn inbound(&self, _connection: ConnectionId, _message: Message) {
            self.events.lock().unwrap().push("inbound");
        }

        fn disconnected(&self, _connection: ConnectionId) {
            self.events.lock().unwrap().push("disconnected");
        }
    }

    #[test]
    fn test_metered_sink_forwards_everything() {
        let inner = Arc::new(RecordingSink::default());
        let sink = MeteredSink::new(inner.clone(), Arc::new(SessionRegistry::new()), "stream");
        let id = ConnectionId::new();

        sink.connected(id);
        sink.inbound(id, Message::ping("alice"));
        sink.disconnected(id);

        assert_eq!(
            *inner.events.lock().unwrap(),
            vec!["connected", "inbound", "disconnected"]
        );
    }

    #[test]
    fn test_recording_without_exporter() {
        connection_opened("remote");
        connection_closed("remote");
        remote_call("join_client");
        sessions_online(3);
        matches_completed(1);
    }
}
