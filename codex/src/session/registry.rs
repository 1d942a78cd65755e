//! Identity to connection routing.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use thiserror::Error;

use crate::{
    game::{
        entities::{IdentityError, PlayerIdentity},
        state_machine::Phase,
    },
    net::{
        connection::{ConnectionId, SharedConnection},
        messages::Message,
    },
};

/// One player known to the current match.
#[derive(Clone, Debug)]
pub struct PlayerSession {
    pub identity: PlayerIdentity,
    /// `None` once the player went offline; the old connection is never
    /// used again.
    pub connection: Option<SharedConnection>,
    pub online: bool,
}

/// An accepted login.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JoinOutcome {
    /// A new player entered the lobby.
    Admitted(PlayerIdentity),
    /// An offline player of the running match is back.
    Reconnected(PlayerIdentity),
}

/// A refused login.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum JoinError {
    /// Bad lobby nickname. The peer may try again on the same connection.
    #[error(transparent)]
    Invalid(#[from] IdentityError),
    /// The match is running and the identity isn't an offline player of it.
    #[error("a match is already in progress and {0} is not one of its disconnected players")]
    MatchInProgress(String),
}

impl JoinError {
    /// Whether the connection must be closed after the rejection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MatchInProgress(_))
    }
}

/// Result of a connection going away.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Departure {
    pub identity: PlayerIdentity,
    /// The session was deleted because the match hadn't started yet.
    pub removed: bool,
}

#[derive(Debug, Default)]
struct Sessions {
    by_identity: HashMap<PlayerIdentity, PlayerSession>,
    by_connection: HashMap<ConnectionId, PlayerIdentity>,
}

/// Sessions of the current match, indexed both ways.
///
/// Sends never happen while the lock is held: connections are collected
/// first and written to after the guard is released.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<Sessions>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Sessions> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Sessions> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a login. In the lobby this creates a new session; in any
    /// other phase it can only bring back a known offline player.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Invalid`] for a bad or taken lobby nickname and
    /// [`JoinError::MatchInProgress`] for anyone else once the lobby closed.
    pub fn join(
        &self,
        raw: &str,
        connection: SharedConnection,
        phase: Phase,
    ) -> Result<JoinOutcome, JoinError> {
        let mut sessions = self.write();

        if phase == Phase::Lobby {
            let identity = PlayerIdentity::parse(raw)?;
            if sessions.by_identity.contains_key(&identity) {
                return Err(IdentityError::Taken(raw.to_string()).into());
            }
            sessions.by_connection.insert(connection.id(), identity.clone());
            sessions.by_identity.insert(
                identity.clone(),
                PlayerSession {
                    identity: identity.clone(),
                    connection: Some(connection),
                    online: true,
                },
            );
            return Ok(JoinOutcome::Admitted(identity));
        }

        let Ok(identity) = PlayerIdentity::parse(raw) else {
            return Err(JoinError::MatchInProgress(raw.to_string()));
        };
        let Some(session) = sessions.by_identity.get_mut(&identity) else {
            return Err(JoinError::MatchInProgress(raw.to_string()));
        };
        if session.online {
            return Err(JoinError::MatchInProgress(raw.to_string()));
        }
        let identity = session.identity.clone();
        let connection_id = connection.id();
        session.connection = Some(connection);
        session.online = true;
        sessions.by_connection.insert(connection_id, identity.clone());
        Ok(JoinOutcome::Reconnected(identity))
    }

    /// Resolve a lost connection. Lobby sessions are deleted outright;
    /// later ones only go offline.
    ///
    /// Returns `None` if the connection never completed a login.
    pub fn leave(&self, connection: ConnectionId, phase: Phase) -> Option<Departure> {
        let mut sessions = self.write();
        let identity = sessions.by_connection.remove(&connection)?;

        if phase == Phase::Lobby {
            sessions.by_identity.remove(&identity);
            return Some(Departure {
                identity,
                removed: true,
            });
        }

        if let Some(session) = sessions.by_identity.get_mut(&identity) {
            session.online = false;
            session.connection = None;
        }
        Some(Departure {
            identity,
            removed: false,
        })
    }

    /// Forget a session entirely, whatever its state.
    pub fn remove(&self, identity: &PlayerIdentity) -> Option<PlayerSession> {
        let mut sessions = self.write();
        let session = sessions.by_identity.remove(identity)?;
        if let Some(connection) = &session.connection {
            sessions.by_connection.remove(&connection.id());
        }
        Some(session)
    }

    pub fn identity_of(&self, connection: ConnectionId) -> Option<PlayerIdentity> {
        self.read().by_connection.get(&connection).cloned()
    }

    pub fn contains(&self, identity: &PlayerIdentity) -> bool {
        self.read().by_identity.contains_key(identity)
    }

    pub fn is_online(&self, identity: &PlayerIdentity) -> bool {
        self.read()
            .by_identity
            .get(identity)
            .is_some_and(|session| session.online)
    }

    pub fn online_count(&self) -> usize {
        self.read()
            .by_identity
            .values()
            .filter(|session| session.online)
            .count()
    }

    pub fn online_identities(&self) -> Vec<PlayerIdentity> {
        self.read()
            .by_identity
            .values()
            .filter(|session| session.online)
            .map(|session| session.identity.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().by_identity.is_empty()
    }

    fn connection_of(&self, identity: &PlayerIdentity) -> Option<SharedConnection> {
        self.read()
            .by_identity
            .get(identity)
            .filter(|session| session.online)
            .and_then(|session| session.connection.clone())
    }

    /// Send to one online player. Returns whether the player was online.
    pub fn send_to(&self, identity: &PlayerIdentity, message: Message) -> bool {
        match self.connection_of(identity) {
            Some(connection) => {
                connection.send(message);
                true
            }
            None => false,
        }
    }

    /// Send to every online player.
    pub fn broadcast(&self, message: &Message) {
        for connection in self.online_connections(None) {
            connection.send(message.clone());
        }
    }

    /// Send to every online player except `excluded`.
    pub fn broadcast_except(&self, excluded: &PlayerIdentity, message: &Message) {
        for connection in self.online_connections(Some(excluded)) {
            connection.send(message.clone());
        }
    }

    fn online_connections(&self, excluded: Option<&PlayerIdentity>) -> Vec<SharedConnection> {
        self.read()
            .by_identity
            .values()
            .filter(|session| session.online && Some(&session.identity) != excluded)
            .filter_map(|session| session.connection.clone())
            .collect()
    }

    /// Empty the registry, handing back every connection still attached.
    pub fn drain(&self) -> Vec<SharedConnection> {
        let mut sessions = self.write();
        sessions.by_connection.clear();
        sessions
            .by_identity
            .drain()
            .filter_map(|(_, session)| session.connection)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
    };

    use proptest::prelude::*;

    use super::*;
    use crate::net::connection::Connection;

    #[derive(Debug)]
    struct StubConnection {
        id: ConnectionId,
        alive: AtomicBool,
        sent: Mutex<Vec<Message>>,
    }

    impl StubConnection {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::new(),
                alive: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl Connection for StubConnection {
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

    fn identity(name: &str) -> PlayerIdentity {
        PlayerIdentity::parse(name).unwrap()
    }

    // === Lobby Join Tests ===

    #[test]
    fn test_lobby_join_admits_new_identity() {
        let registry = SessionRegistry::new();
        let conn = StubConnection::new();
        let outcome = registry.join("Alice", conn.clone(), Phase::Lobby);
        assert_eq!(outcome, Ok(JoinOutcome::Admitted(identity("Alice"))));
        assert_eq!(registry.identity_of(conn.id()), Some(identity("alice")));
        assert!(registry.is_online(&identity("ALICE")));
    }

    #[test]
    fn test_lobby_join_rejects_taken_identity_case_insensitively() {
        let registry = SessionRegistry::new();
        registry.join("Alice", StubConnection::new(), Phase::Lobby).unwrap();
        let result = registry.join("aLiCe", StubConnection::new(), Phase::Lobby);
        assert_eq!(
            result,
            Err(JoinError::Invalid(IdentityError::Taken("aLiCe".to_string())))
        );
        assert!(!result.unwrap_err().is_terminal());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lobby_join_rejects_invalid_identities() {
        let registry = SessionRegistry::new();
        for raw in ["", "   ", "General", "codexnaturalisserver", "abcdefghijklmnopqrstu"] {
            let result = registry.join(raw, StubConnection::new(), Phase::Lobby);
            assert!(matches!(result, Err(JoinError::Invalid(_))), "{raw:?} accepted");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lobby_leave_deletes_session() {
        let registry = SessionRegistry::new();
        let conn = StubConnection::new();
        registry.join("Alice", conn.clone(), Phase::Lobby).unwrap();
        let departure = registry.leave(conn.id(), Phase::Lobby).unwrap();
        assert!(departure.removed);
        assert!(registry.is_empty());
        assert!(registry.join("alice", StubConnection::new(), Phase::Lobby).is_ok());
    }

    // === Reconnection Tests ===

    #[test]
    fn test_leave_after_lobby_keeps_offline_session() {
        let registry = SessionRegistry::new();
        let conn = StubConnection::new();
        registry.join("Alice", conn.clone(), Phase::Lobby).unwrap();
        let departure = registry.leave(conn.id(), Phase::Play).unwrap();
        assert!(!departure.removed);
        assert!(registry.contains(&identity("Alice")));
        assert!(!registry.is_online(&identity("Alice")));
        assert_eq!(registry.identity_of(conn.id()), None);
    }

    #[test]
    fn test_reconnect_replaces_connection() {
        let registry = SessionRegistry::new();
        let old = StubConnection::new();
        registry.join("Alice", old.clone(), Phase::Lobby).unwrap();
        registry.leave(old.id(), Phase::Draw);

        let new = StubConnection::new();
        let outcome = registry.join("ALICE", new.clone(), Phase::Draw);
        assert_eq!(outcome, Ok(JoinOutcome::Reconnected(identity("Alice"))));

        assert!(registry.send_to(&identity("alice"), Message::generic("hi")));
        assert_eq!(old.sent(), 0);
        assert_eq!(new.sent(), 1);
    }

    #[test]
    fn test_reconnect_rejects_unknown_or_online_identity() {
        let registry = SessionRegistry::new();
        let conn = StubConnection::new();
        registry.join("Alice", conn.clone(), Phase::Lobby).unwrap();

        let unknown = registry.join("Mallory", StubConnection::new(), Phase::Play);
        assert_eq!(unknown, Err(JoinError::MatchInProgress("Mallory".to_string())));
        assert!(unknown.unwrap_err().is_terminal());

        let online = registry.join("alice", StubConnection::new(), Phase::Play);
        assert!(matches!(online, Err(JoinError::MatchInProgress(_))));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.identity_of(conn.id()), Some(identity("Alice")));
    }

    // === Routing Tests ===

    #[test]
    fn test_broadcast_skips_offline_and_excluded() {
        let registry = SessionRegistry::new();
        let a = StubConnection::new();
        let b = StubConnection::new();
        let c = StubConnection::new();
        registry.join("A", a.clone(), Phase::Lobby).unwrap();
        registry.join("B", b.clone(), Phase::Lobby).unwrap();
        registry.join("C", c.clone(), Phase::Lobby).unwrap();
        registry.leave(c.id(), Phase::Play);

        registry.broadcast(&Message::generic("all"));
        registry.broadcast_except(&identity("a"), &Message::generic("not a"));

        assert_eq!(a.sent(), 1);
        assert_eq!(b.sent(), 2);
        assert_eq!(c.sent(), 0);
        assert!(!registry.send_to(&identity("C"), Message::generic("offline")));
    }

    #[test]
    fn test_drain_returns_attached_connections() {
        let registry = SessionRegistry::new();
        let a = StubConnection::new();
        let b = StubConnection::new();
        registry.join("A", a.clone(), Phase::Lobby).unwrap();
        registry.join("B", b.clone(), Phase::Lobby).unwrap();
        registry.leave(b.id(), Phase::Play);

        let drained = registry.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id(), a.id());
        assert!(registry.is_empty());
        assert_eq!(registry.identity_of(a.id()), None);
    }

    // === Property Tests ===

    #[derive(Clone, Debug)]
    enum Step {
        Join(u8),
        Leave(u8),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![(0u8..4).prop_map(Step::Join), (0u8..8).prop_map(Step::Leave)]
    }

    proptest! {
        #[test]
        fn prop_lobby_never_holds_duplicate_online_identities(steps in prop::collection::vec(step(), 0..64)) {
            let registry = SessionRegistry::new();
            let names = ["alice", "Alice", "bob", "BOB"];
            let mut connections: Vec<ConnectionId> = Vec::new();

            for step in steps {
                match step {
                    Step::Join(name) => {
                        let conn = StubConnection::new();
                        if registry.join(names[usize::from(name)], conn.clone(), Phase::Lobby).is_ok() {
                            connections.push(conn.id());
                        }
                    }
                    Step::Leave(index) => {
                        if !connections.is_empty() {
                            let conn = connections.remove(usize::from(index) % connections.len());
                            registry.leave(conn, Phase::Lobby);
                        }
                    }
                }

                let online = registry.online_identities();
                let unique: HashSet<_> = online.iter().cloned().collect();
                prop_assert_eq!(online.len(), unique.len());
                prop_assert_eq!(online.len(), connections.len());
            }
        }
    }
}
