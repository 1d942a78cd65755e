//! Coordinator actor with a single-consumer mailbox.

use tokio::sync::{mpsc, oneshot};

use super::{
    Coordinator,
    messages::{CoordinatorEvent, MatchSnapshot},
};
use crate::{
    game::rules::RulesEngine,
    net::{
        connection::{ConnectionId, SharedConnection, TransportSink},
        messages::Message,
    },
};

/// Coordinator handle for sending events
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    sender: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    /// Queue an event for the coordinator
    pub fn send(&self, event: CoordinatorEvent) -> Result<(), String> {
        self.sender
            .send(event)
            .map_err(|_| "Coordinator is closed".to_string())
    }

    /// Current view of the match, or `None` once the actor stopped.
    pub async fn snapshot(&self) -> Option<MatchSnapshot> {
        let (response, rx) = oneshot::channel();
        self.send(CoordinatorEvent::Snapshot { response }).ok()?;
        rx.await.ok()
    }
}

impl TransportSink for CoordinatorHandle {
    fn join(&self, identity: String, connection: SharedConnection) {
        let event = CoordinatorEvent::Join {
            identity,
            connection: connection.clone(),
        };
        if let Err(error) = self.send(event) {
            log::error!("Dropping login on {}: {error}", connection.id());
            connection.disconnect();
        }
    }

    fn inbound(&self, connection: ConnectionId, message: Message) {
        if let Err(error) = self.send(CoordinatorEvent::Inbound {
            connection,
            message,
        }) {
            log::error!("Dropping message from {connection}: {error}");
        }
    }

    fn disconnected(&self, connection: ConnectionId) {
        if let Err(error) = self.send(CoordinatorEvent::Disconnected { connection }) {
            log::debug!("Dropping disconnect of {connection}: {error}");
        }
    }
}

/// Owns the coordinator and feeds it one event at a time.
pub struct CoordinatorActor<R: RulesEngine> {
    coordinator: Coordinator<R>,
    inbox: mpsc::UnboundedReceiver<CoordinatorEvent>,
}

impl<R: RulesEngine> CoordinatorActor<R> {
    /// Create the actor and the handle transports talk to.
    pub fn new(coordinator: Coordinator<R>) -> (Self, CoordinatorHandle) {
        let (sender, inbox) = mpsc::unbounded_channel();
        (Self { coordinator, inbox }, CoordinatorHandle { sender })
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        log::info!("Coordinator starting");

        while let Some(event) = self.inbox.recv().await {
            self.coordinator.handle(event);
        }

        log::info!(
            "Coordinator stopped after {} matches",
            self.coordinator.matches_completed()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        coordinator::MatchConfig,
        game::{StandardRules, state_machine::Phase},
        session::SessionRegistry,
    };

    #[tokio::test]
    async fn test_snapshot_of_fresh_lobby() {
        let registry = Arc::new(SessionRegistry::new());
        let coordinator =
            Coordinator::new(MatchConfig::default(), registry, || StandardRules::with_seed(3));
        let (actor, handle) = CoordinatorActor::new(coordinator);
        let task = tokio::spawn(actor.run());

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Lobby);
        assert!(snapshot.players.is_empty());
        assert_eq!(snapshot.online, 0);
        assert!(!snapshot.suspended);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_reports_closed_actor() {
        let registry = Arc::new(SessionRegistry::new());
        let coordinator = Coordinator::new(MatchConfig::default(), registry, StandardRules::new);
        let (actor, handle) = CoordinatorActor::new(coordinator);
        drop(actor);

        assert!(handle.snapshot().await.is_none());
        assert_eq!(
            handle.send(CoordinatorEvent::Disconnected {
                connection: ConnectionId::new()
            }),
            Err("Coordinator is closed".to_string())
        );
    }
}
