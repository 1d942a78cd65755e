//! Remote-object transport over WebSocket.
//!
//! The named object lives at `GET /{object_name}`. Every text frame is one
//! JSON [`RemoteCall`]: peers call `join_client` and `send_to_server`, and
//! the server calls `send_to_client` back on the same socket.
//!
//! # Connection Flow
//!
//! 1. Client upgrades `GET /CodexNaturalisServer`
//! 2. Server spawns a writer task, a heartbeat and a call worker
//! 3. Incoming calls are queued to the worker, which hands them to the
//!    coordinator one at a time
//! 4. On close, queued calls are flushed before the loss is reported
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:1099/CodexNaturalisServer');
//! ws.send(JSON.stringify({ method: "join_client", identity: "alice" }));
//! ```

use std::{fmt, sync::Arc};

use axum::{
    extract::{
        Path, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use codex::{
    Connection, ConnectionId, Message, SharedConnection, TransportConfig,
    entities::SERVER_NAME,
    messages::RemoteCall,
    net::{
        connection::{self, Liveness, Outbound, SharedSink},
        heartbeat::HeartbeatMonitor,
    },
    utils::MAX_MESSAGE_SIZE,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use log::{debug, info, warn};
use tokio::{sync::mpsc, time};

use super::AppState;
use crate::metrics;

/// Server side of one remote-object session.
pub struct RemoteConnection {
    liveness: Liveness,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl fmt::Debug for RemoteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnection")
            .field("id", &self.liveness.id())
            .field("alive", &self.liveness.is_alive())
            .finish()
    }
}

impl Connection for RemoteConnection {
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

/// Upgrade a request for the named remote object.
///
/// Any other name is answered with `404 Not Found`.
pub async fn remote_handler(
    Path(object_name): Path<String>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if object_name != *state.object_name {
        return (
            StatusCode::NOT_FOUND,
            format!("No remote object bound as {object_name}"),
        )
            .into_response();
    }

    match ws {
        Ok(ws) => ws
            .max_message_size(MAX_MESSAGE_SIZE)
            .on_upgrade(move |socket| handle_socket(socket, state)),
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let connection = Arc::new(RemoteConnection {
        liveness: Liveness::new(state.sink.clone()),
        outbound: outbound_tx,
    });
    let mut shutdown = connection.liveness.subscribe();
    let shared: SharedConnection = connection.clone();
    state.sink.connected(shared.id());
    info!("Remote connection {} opened", shared.id());

    HeartbeatMonitor::new(shared, state.transport.heartbeat_interval(), SERVER_NAME)
        .spawn(connection.liveness.subscribe());
    tokio::spawn(write_loop(connection.clone(), sender, outbound_rx, state.transport));

    let (calls_tx, calls_rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(dispatch_calls(connection.clone(), state.sink.clone(), calls_rx));

    while connection.is_alive() {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = receiver.next() => frame,
        };
        match frame {
            Some(Ok(WsMessage::Text(text))) => match RemoteCall::from_json(text.as_str()) {
                Ok(call) => {
                    metrics::remote_call(call.method());
                    if calls_tx.send(call).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Malformed remote call on {}: {e}", connection.id());
                    break;
                }
            },
            Some(Ok(WsMessage::Close(_))) | None => {
                info!("Remote connection {} closed by peer", connection.id());
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                info!("Remote connection {} failed: {e}", connection.id());
                break;
            }
        }
    }

    // Calls already accepted are delivered before the loss.
    drop(calls_tx);
    let _ = worker.await;
    connection.disconnect();
}

/// Hand queued calls to the sink in arrival order.
async fn dispatch_calls(
    connection: Arc<RemoteConnection>,
    sink: SharedSink,
    mut calls: mpsc::UnboundedReceiver<RemoteCall>,
) {
    while let Some(call) = calls.recv().await {
        match call {
            RemoteCall::JoinClient { identity } => sink.join(identity, connection.clone()),
            RemoteCall::SendToServer { message } if message.is_ping() => {}
            RemoteCall::SendToServer { message } => sink.inbound(connection.id(), message),
            RemoteCall::SendToClient { .. } => {
                warn!("Ignoring send_to_client from remote peer {}", connection.id());
            }
        }
    }
}

async fn write_loop(
    connection: Arc<RemoteConnection>,
    mut sender: SplitSink<WebSocket, WsMessage>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    config: TransportConfig,
) {
    while let Some(next) = outbound.recv().await {
        let frame = match next {
            Outbound::Message(message) => match (RemoteCall::SendToClient { message }).to_json() {
                Ok(json) => WsMessage::Text(json.into()),
                Err(e) => {
                    warn!("Failed to serialize call for {}: {e}", connection.id());
                    break;
                }
            },
            Outbound::Close => {
                let _ = time::timeout(config.liveness_window, sender.send(WsMessage::Close(None))).await;
                break;
            }
        };

        match time::timeout(config.liveness_window, sender.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Failed to write to {}: {e}", connection.id());
                break;
            }
            Err(_) => {
                debug!("Write to {} timed out", connection.id());
                break;
            }
        }
    }

    connection.disconnect();
}
