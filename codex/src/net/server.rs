//! Stream transport: length-prefixed bincode frames over TCP.
//!
//! Every accepted socket gets a reader task, a writer task and a
//! heartbeat. The reader blocks on the next frame for at most one
//! liveness window; the writer drains the connection's outbound queue
//! so sends from the coordinator never wait on the network.

use std::{fmt, net::SocketAddr, sync::Arc};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpListener, TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
    time,
};

use super::{
    connection::{self, Connection, ConnectionId, Liveness, Outbound, SharedConnection, SharedSink},
    errors::TransportError,
    heartbeat::{HeartbeatMonitor, TransportConfig},
    messages::{Message, Payload},
    utils,
};
use crate::game::entities::SERVER_NAME;

/// Server side of one stream socket.
pub struct StreamConnection {
    liveness: Liveness,
    outbound: mpsc::UnboundedSender<Outbound>,
    peer: SocketAddr,
}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.liveness.id())
            .field("peer", &self.peer)
            .field("alive", &self.liveness.is_alive())
            .finish()
    }
}

impl StreamConnection {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for StreamConnection {
    fn id(&self) -> ConnectionId {
        self.liveness.id()
    }

    fn send(&self, message: Message) {
        connection::enqueue(&self.liveness, &self.outbound, message, self);
    }

    fn disconnect(&self) {
        connection::close(&self.liveness, &self.outbound);
    }

    fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }
}

/// TCP listener feeding accepted connections to a [`TransportSink`].
///
/// [`TransportSink`]: super::connection::TransportSink
pub struct StreamServer {
    listener: TcpListener,
    config: TransportConfig,
    sink: SharedSink,
}

impl StreamServer {
    /// Bind the listening socket. Failing to bind is the only fatal
    /// error of the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the address can't be bound.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        config: TransportConfig,
        sink: SharedSink,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            config,
            sink,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever. Accept errors are logged and skipped.
    pub async fn run(self) {
        log::info!(
            "Stream transport listening on {}",
            self.local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string())
        );
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let connection = spawn_connection(stream, peer, self.config, self.sink.clone());
                    log::info!("Accepted stream connection {} from {peer}", connection.id());
                }
                Err(error) => {
                    log::warn!("Failed to accept stream connection: {error}");
                }
            }
        }
    }
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: TransportConfig,
    sink: SharedSink,
) -> SharedConnection {
    let _ = stream.set_nodelay(true);
    let (reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let connection = Arc::new(StreamConnection {
        liveness: Liveness::new(sink.clone()),
        outbound: outbound_tx,
        peer,
    });
    let shared: SharedConnection = connection.clone();
    sink.connected(shared.id());

    HeartbeatMonitor::new(shared.clone(), config.heartbeat_interval(), SERVER_NAME)
        .spawn(connection.liveness.subscribe());
    tokio::spawn(write_loop(connection.clone(), writer, outbound_rx, config));
    tokio::spawn(read_loop(connection, reader, config));

    shared
}

async fn read_loop(connection: Arc<StreamConnection>, mut reader: OwnedReadHalf, config: TransportConfig) {
    let mut shutdown = connection.liveness.subscribe();
    let sink = connection.liveness.sink().clone();
    let window = config.liveness_window;

    let reason = loop {
        if !connection.is_alive() {
            break TransportError::Closed;
        }
        let frame = tokio::select! {
            _ = shutdown.changed() => break TransportError::Closed,
            frame = time::timeout(window, utils::read_frame::<Message, _>(&mut reader)) => frame,
        };
        let message = match frame {
            Ok(Ok(message)) => message,
            Ok(Err(error)) => break error,
            Err(_) => break TransportError::Timeout(window),
        };

        match message.payload {
            Payload::Ping => {}
            Payload::LoginRequest => {
                let shared: SharedConnection = connection.clone();
                sink.join(message.sender, shared);
            }
            _ => sink.inbound(connection.id(), message),
        }
    };

    log::info!("Stream connection {} ({}) closed: {reason}", connection.id(), connection.peer);
    connection.disconnect();
}

async fn write_loop(
    connection: Arc<StreamConnection>,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    config: TransportConfig,
) {
    while let Some(next) = outbound.recv().await {
        let message = match next {
            Outbound::Message(message) => message,
            Outbound::Close => break,
        };
        match time::timeout(config.liveness_window, utils::write_frame(&mut writer, &message)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                log::debug!("Failed to write to {}: {error}", connection.id());
                break;
            }
            Err(_) => {
                log::debug!("Write to {} timed out", connection.id());
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
    connection.disconnect();
}
