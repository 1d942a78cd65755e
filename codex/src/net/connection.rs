//! The uniform connection capability shared by both transports.
//!
//! A transport turns a physical link into a [`Connection`] and reports
//! everything it learns about that link to a [`TransportSink`]. The sink
//! is the only way transports talk to the rest of the server.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::messages::Message;

/// Stable handle for one physical connection, independent of the identity
/// that eventually logs in over it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A live link to one client.
///
/// `send` never blocks and never fails loudly: a message that can't be
/// delivered tears the connection down instead. `disconnect` is
/// idempotent and reports the loss to the sink exactly once.
pub trait Connection: Send + Sync + fmt::Debug {
    fn id(&self) -> ConnectionId;

    fn send(&self, message: Message);

    fn disconnect(&self);

    fn is_alive(&self) -> bool;
}

pub type SharedConnection = Arc<dyn Connection>;

/// Receiver of transport events.
pub trait TransportSink: Send + Sync + 'static {
    /// A physical link was accepted, before any login.
    fn connected(&self, _connection: ConnectionId) {}

    /// A peer asked to log in as `identity`.
    fn join(&self, identity: String, connection: SharedConnection);

    /// A non-probe message arrived on a connection.
    fn inbound(&self, connection: ConnectionId, message: Message);

    /// The connection is gone, for whatever reason.
    fn disconnected(&self, connection: ConnectionId);
}

pub type SharedSink = Arc<dyn TransportSink>;

/// What a connection's writer task is asked to do next.
#[derive(Debug)]
pub enum Outbound {
    Message(Message),
    Close,
}

/// Alive flag, shutdown signal and loss notification of one connection.
pub struct Liveness {
    id: ConnectionId,
    alive: AtomicBool,
    shutdown: watch::Sender<bool>,
    sink: SharedSink,
}

impl fmt::Debug for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Liveness")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl Liveness {
    pub fn new(sink: SharedSink) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            id: ConnectionId::new(),
            alive: AtomicBool::new(true),
            shutdown,
            sink,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    /// Resolves when the connection is marked dead.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Flip the connection to dead. Only the first caller wakes the
    /// connection's tasks and notifies the sink; returns whether this
    /// call was that first one.
    pub fn mark_dead(&self) -> bool {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.shutdown.send_replace(true);
        self.sink.disconnected(self.id);
        true
    }
}

/// Queue a message for a connection's writer task, tearing the
/// connection down when the writer is already gone.
pub fn enqueue(
    liveness: &Liveness,
    outbound: &mpsc::UnboundedSender<Outbound>,
    message: Message,
    connection: &dyn Connection,
) {
    if !liveness.is_alive() {
        log::debug!("Dropping {message} for dead connection {}", liveness.id());
        return;
    }
    if outbound.send(Outbound::Message(message)).is_err() {
        connection.disconnect();
    }
}

/// Mark the connection dead and ask its writer to close the link once
/// everything already queued has been flushed.
pub fn close(liveness: &Liveness, outbound: &mpsc::UnboundedSender<Outbound>) {
    if liveness.mark_dead() {
        let _ = outbound.send(Outbound::Close);
    }
}
