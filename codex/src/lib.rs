//! # Codex
//!
//! Match server core for a turn-based, multiplayer card game.
//!
//! Players reach the server through one of two transports and are routed
//! by identity to a single match coordinator:
//!
//! - **Transports** ([`net`]): a length-prefixed stream transport and the
//!   [`Connection`] capability the remote-object transport also implements
//! - **Sessions** ([`session`]): identity to connection routing, new
//!   logins versus reconnections
//! - **Coordinator** ([`coordinator`]): the phase-aware match state
//!   machine, run as an actor
//! - **Game** ([`game`]): match state, turn order and the rules engine seam
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use codex::{Coordinator, MatchConfig, SessionRegistry, StandardRules, game::Phase};
//!
//! let registry = Arc::new(SessionRegistry::new());
//! let coordinator = Coordinator::new(MatchConfig::default(), registry, StandardRules::new);
//! assert_eq!(coordinator.state().phase(), Phase::Lobby);
//! ```

/// Match coordination.
pub mod coordinator;
pub use coordinator::{Coordinator, CoordinatorActor, CoordinatorHandle, MatchConfig, MatchSnapshot};

/// Core game model, state machine and rules.
pub mod game;
pub use game::{
    RuleError, RulesEngine, StandardRules,
    entities::{self, PlayerIdentity},
    functional,
};

/// Networking components for client-server communication.
pub mod net;
pub use net::{
    client::Client,
    connection::{Connection, ConnectionId, SharedConnection, TransportSink},
    heartbeat::TransportConfig,
    messages::{self, Message, MessageKind, Payload},
    server::StreamServer,
    utils,
};

/// Player sessions.
pub mod session;
pub use session::SessionRegistry;
