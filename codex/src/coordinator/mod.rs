//! Turn coordination for one match at a time.
//!
//! [`Coordinator`] is a plain synchronous state machine: every transport
//! event is fed to [`Coordinator::handle`] one at a time, which makes the
//! whole match logic testable without sockets or tasks. The
//! [`CoordinatorActor`] wraps it in a single-consumer mailbox so that
//! events from different connections never interleave inside one
//! transition.

pub mod actor;
pub mod config;
mod handler;
mod lobby;
pub mod messages;
mod turns;

pub use actor::{CoordinatorActor, CoordinatorHandle};
pub use config::MatchConfig;
pub use messages::{CoordinatorEvent, MatchSnapshot};

use std::{fmt, sync::Arc};

use crate::{
    game::{rules::RulesEngine, state_machine::MatchState},
    session::SessionRegistry,
};

/// Builds a fresh rules engine for every match.
pub type RulesFactory<R> = Box<dyn Fn() -> R + Send>;

pub struct Coordinator<R: RulesEngine> {
    config: MatchConfig,
    registry: Arc<SessionRegistry>,
    rules_factory: RulesFactory<R>,
    rules: R,
    state: MatchState,
    matches_completed: u64,
}

impl<R: RulesEngine> fmt::Debug for Coordinator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("matches_completed", &self.matches_completed)
            .finish_non_exhaustive()
    }
}

impl<R: RulesEngine> Coordinator<R> {
    pub fn new(
        config: MatchConfig,
        registry: Arc<SessionRegistry>,
        rules_factory: impl Fn() -> R + Send + 'static,
    ) -> Self {
        let rules = rules_factory();
        Self {
            config,
            registry,
            rules_factory: Box::new(rules_factory),
            rules,
            state: MatchState::new(),
            matches_completed: 0,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn matches_completed(&self) -> u64 {
        self.matches_completed
    }

    /// Process one event to completion.
    pub fn handle(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Join {
                identity,
                connection,
            } => self.on_join(&identity, connection),
            CoordinatorEvent::Inbound {
                connection,
                message,
            } => self.on_inbound(connection, message),
            CoordinatorEvent::Disconnected { connection } => self.on_disconnect(connection),
            CoordinatorEvent::Snapshot { response } => {
                let _ = response.send(self.snapshot());
            }
        }
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            phase: self.state.phase(),
            players: self.state.players().to_vec(),
            active: self.state.active_player().cloned(),
            online: self.registry.online_count(),
            suspended: self.state.is_suspended(),
            first_to_threshold: self.state.first_to_threshold().cloned(),
            first_to_finish_deck: self.state.first_to_finish_deck().cloned(),
            target_players: self.state.target_players(),
            history_len: self.state.history().len(),
            matches_completed: self.matches_completed,
        }
    }

    /// Throw the match away and open a fresh lobby. Every session is
    /// dropped, so clients must log in again.
    fn reset(&mut self) {
        for connection in self.registry.drain() {
            connection.disconnect();
        }
        self.state = MatchState::new();
        self.rules = (self.rules_factory)();
        log::info!("Fresh lobby open");
    }
}
