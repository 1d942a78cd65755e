//! Coordinator mailbox types.

use serde::Serialize;
use tokio::sync::oneshot;

use crate::{
    game::{entities::PlayerIdentity, state_machine::Phase},
    net::{
        connection::{ConnectionId, SharedConnection},
        messages::Message,
    },
};

/// Everything the coordinator reacts to, in arrival order.
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// Login entry point of both transports.
    Join {
        identity: String,
        connection: SharedConnection,
    },

    /// Application message from a connection. Probes are filtered out
    /// before this point.
    Inbound {
        connection: ConnectionId,
        message: Message,
    },

    /// A connection was lost.
    Disconnected { connection: ConnectionId },

    /// Read-only view for health checks and tests
    Snapshot {
        response: oneshot::Sender<MatchSnapshot>,
    },
}

/// Point-in-time view of the current match.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MatchSnapshot {
    pub phase: Phase,
    pub players: Vec<PlayerIdentity>,
    pub active: Option<PlayerIdentity>,
    pub online: usize,
    pub suspended: bool,
    pub first_to_threshold: Option<PlayerIdentity>,
    pub first_to_finish_deck: Option<PlayerIdentity>,
    pub target_players: Option<usize>,
    pub history_len: usize,
    pub matches_completed: u64,
}
