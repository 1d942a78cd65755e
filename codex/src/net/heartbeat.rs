//! Periodic liveness probes.

use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::{connection::SharedConnection, messages::Message};

/// Default time a connection may stay silent before it is dropped.
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(10);

/// Transport timing shared by both transports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TransportConfig {
    /// Read timeout of the stream transport.
    pub liveness_window: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            liveness_window: DEFAULT_LIVENESS_WINDOW,
        }
    }
}

impl TransportConfig {
    pub fn new(liveness_window: Duration) -> Self {
        Self { liveness_window }
    }

    /// Probes go out twice per window so at least one lands inside any
    /// single timeout window.
    pub fn heartbeat_interval(&self) -> Duration {
        self.liveness_window / 2
    }
}

/// Sends a probe on one connection at a fixed interval until the
/// connection dies.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    connection: SharedConnection,
    interval: Duration,
    sender: String,
}

impl HeartbeatMonitor {
    pub fn new(connection: SharedConnection, interval: Duration, sender: impl Into<String>) -> Self {
        Self {
            connection,
            interval,
            sender: sender.into(),
        }
    }

    /// Run the probe loop on its own task. The task ends as soon as
    /// `shutdown` flips or the connection reports itself dead.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !self.connection.is_alive() {
                            break;
                        }
                        self.connection.send(Message::ping(self.sender.clone()));
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            log::debug!("Heartbeat stopped for {}", self.connection.id());
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::net::{
        connection::{Connection, ConnectionId},
        messages::Payload,
    };

    #[derive(Debug)]
    struct ProbeCounter {
        id: ConnectionId,
        alive: AtomicBool,
        sent: Mutex<Vec<Message>>,
    }

    impl ProbeCounter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::new(),
                alive: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn probes(&self) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|msg| msg.payload == Payload::Ping)
                .count()
        }
    }

    impl Connection for ProbeCounter {
        fn id(&self) -> ConnectionId {
            self.id
        }

        fn send(&self, message: Message) {
            self.sent.lock().unwrap().push(message);
        }

        fn disconnect(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_interval_is_half_the_window() {
        let config = TransportConfig::new(Duration::from_millis(10_000));
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(5_000));
        assert_eq!(TransportConfig::default().liveness_window, DEFAULT_LIVENESS_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_at_fixed_interval() {
        let conn = ProbeCounter::new();
        let (_tx, rx) = watch::channel(false);
        let handle = HeartbeatMonitor::new(conn.clone(), Duration::from_secs(5), "server").spawn(rx);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(conn.probes(), 0);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(conn.probes(), 1);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(conn.probes(), 3);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown() {
        let conn = ProbeCounter::new();
        let (tx, rx) = watch::channel(false);
        let handle = HeartbeatMonitor::new(conn.clone(), Duration::from_secs(5), "server").spawn(rx);

        tx.send_replace(true);
        handle.await.unwrap();
        assert_eq!(conn.probes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_connection_dies() {
        let conn = ProbeCounter::new();
        let (_tx, rx) = watch::channel(false);
        let handle = HeartbeatMonitor::new(conn.clone(), Duration::from_secs(5), "server").spawn(rx);

        time::sleep(Duration::from_millis(5_100)).await;
        conn.disconnect();
        handle.await.unwrap();
        assert_eq!(conn.probes(), 1);
    }
}
