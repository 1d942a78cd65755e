//! Shared fixtures for driving the coordinator without sockets.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use codex::{
    Connection, ConnectionId, Coordinator, MatchConfig, MatchSnapshot, Message, MessageKind,
    Payload, RuleError, RulesEngine, SessionRegistry,
    coordinator::CoordinatorEvent,
    entities::{
        CardId, Cell, Color, DeckDisplay, DrawChoice, HandView, LeaderboardEntry, PlacedCard,
        PlayerIdentity, STARTING_CELL, StartingOptions,
    },
};

/// A connection that remembers everything sent to it.
#[derive(Debug)]
pub struct RecordingConnection {
    pub name: String,
    id: ConnectionId,
    alive: AtomicBool,
    disconnects: AtomicUsize,
    sent: Mutex<Vec<Message>>,
}

impl RecordingConnection {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            id: ConnectionId::new(),
            alive: AtomicBool::new(true),
            disconnects: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.messages().iter().map(Message::kind).collect()
    }

    pub fn received(&self, kind: MessageKind) -> bool {
        self.kinds().contains(&kind)
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn last(&self, kind: MessageKind) -> Option<Payload> {
        self.messages()
            .into_iter()
            .rev()
            .find(|msg| msg.kind() == kind)
            .map(|msg| msg.payload)
    }

    /// Text of every generic and error message, in order.
    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|msg| match msg.payload {
                Payload::GenericMessage { text } | Payload::ErrorMessage { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn saw_text(&self, needle: &str) -> bool {
        self.texts().iter().any(|text| text.contains(needle))
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl Connection for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: Message) {
        if self.is_alive() {
            self.sent.lock().unwrap().push(message);
        }
    }

    fn disconnect(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct Script {
    pub players: Vec<PlayerIdentity>,
    pub colors: HashMap<PlayerIdentity, Color>,
    pub chosen: HashSet<PlayerIdentity>,
    pub scores: HashMap<PlayerIdentity, u32>,
    pub deck_empty: bool,
    pub reject_next_place: Option<RuleError>,
    pub next_card: u16,
    pub started: bool,
}

/// Rules engine whose outcomes are set by the test. Clones share one
/// script, so the test keeps a clone to steer the engine the
/// coordinator owns.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRules {
    script: Arc<Mutex<Script>>,
}

pub const STARTING_CARD: CardId = CardId(81);
pub const TARGETS: [CardId; 2] = [CardId(87), CardId(88)];

impl ScriptedRules {
    pub fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        f(&mut self.script.lock().unwrap())
    }

    pub fn set_score(&self, identity: &str, points: u32) {
        let identity = PlayerIdentity::parse(identity).unwrap();
        self.with(|script| script.scores.insert(identity, points));
    }

    pub fn set_deck_empty(&self, empty: bool) {
        self.with(|script| script.deck_empty = empty);
    }

    pub fn reject_next_place(&self, error: RuleError) {
        self.with(|script| script.reject_next_place = Some(error));
    }

    /// Forget everything, as a fresh match would.
    pub fn wipe(&self) {
        self.with(|script| *script = Script::default());
    }
}

impl RulesEngine for ScriptedRules {
    fn add_player(&mut self, identity: &PlayerIdentity) -> Result<(), RuleError> {
        self.with(|script| {
            if script.players.len() >= 4 {
                return Err(RuleError::TableFull);
            }
            script.players.push(identity.clone());
            Ok(())
        })
    }

    fn remove_player(&mut self, identity: &PlayerIdentity) {
        self.with(|script| {
            script.players.retain(|player| player != identity);
            script.colors.remove(identity);
            script.chosen.remove(identity);
        });
    }

    fn available_colors(&self) -> Vec<Color> {
        self.with(|script| {
            Color::ALL
                .into_iter()
                .filter(|color| !script.colors.values().any(|taken| taken == color))
                .collect()
        })
    }

    fn claim_color(&mut self, identity: &PlayerIdentity, color: Color) -> Result<(), RuleError> {
        self.with(|script| {
            if script
                .colors
                .iter()
                .any(|(player, taken)| player != identity && *taken == color)
            {
                return Err(RuleError::ColorTaken(color));
            }
            script.colors.insert(identity.clone(), color);
            Ok(())
        })
    }

    fn starting_options(&self, identity: &PlayerIdentity) -> Option<StartingOptions> {
        self.with(|script| {
            script.players.contains(identity).then_some(StartingOptions {
                starting_card: STARTING_CARD,
                targets: TARGETS,
            })
        })
    }

    fn choose_starting(
        &mut self,
        identity: &PlayerIdentity,
        secret_target: CardId,
        starting_front: bool,
    ) -> Result<PlacedCard, RuleError> {
        self.with(|script| {
            if !TARGETS.contains(&secret_target) {
                return Err(RuleError::InvalidTarget(secret_target));
            }
            if !script.chosen.insert(identity.clone()) {
                return Err(RuleError::StartingAlreadyChosen);
            }
            Ok(PlacedCard {
                card: STARTING_CARD,
                cell: STARTING_CELL,
                front: starting_front,
            })
        })
    }

    fn is_ready(&self, identity: &PlayerIdentity) -> bool {
        self.with(|script| script.colors.contains_key(identity) && script.chosen.contains(identity))
    }

    fn start_match(&mut self) {
        self.with(|script| script.started = true);
    }

    fn place_card(
        &mut self,
        _identity: &PlayerIdentity,
        _slot: usize,
        cell: Cell,
        front: bool,
    ) -> Result<PlacedCard, RuleError> {
        self.with(|script| {
            if let Some(error) = script.reject_next_place.take() {
                return Err(error);
            }
            script.next_card += 1;
            Ok(PlacedCard {
                card: CardId(script.next_card),
                cell,
                front,
            })
        })
    }

    fn draw_card(&mut self, _identity: &PlayerIdentity, _choice: DrawChoice) -> Result<CardId, RuleError> {
        Ok(CardId(1))
    }

    fn refill(&mut self, _identity: &PlayerIdentity) -> Result<Option<CardId>, RuleError> {
        Ok(None)
    }

    fn score(&self, identity: &PlayerIdentity) -> u32 {
        self.with(|script| script.scores.get(identity).copied().unwrap_or(0))
    }

    fn any_deck_empty(&self) -> bool {
        self.with(|script| script.deck_empty)
    }

    fn board(&self, _identity: &PlayerIdentity) -> Vec<PlacedCard> {
        Vec::new()
    }

    fn hand(&self, _identity: &PlayerIdentity) -> HandView {
        HandView::default()
    }

    fn common_targets(&self) -> Vec<CardId> {
        TARGETS.to_vec()
    }

    fn decks(&self) -> DeckDisplay {
        DeckDisplay::default()
    }

    fn final_scores(&mut self) -> Vec<LeaderboardEntry> {
        self.with(|script| {
            script
                .players
                .iter()
                .map(|player| LeaderboardEntry {
                    identity: player.clone(),
                    points: script.scores.get(player).copied().unwrap_or(0),
                    objectives: 0,
                })
                .collect()
        })
    }
}

/// A coordinator wired to recording connections and scripted rules.
pub struct Harness {
    pub coordinator: Coordinator<ScriptedRules>,
    pub rules: ScriptedRules,
    pub registry: Arc<SessionRegistry>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(MatchConfig::default())
    }

    pub fn with_config(config: MatchConfig) -> Self {
        let rules = ScriptedRules::default();
        let registry = Arc::new(SessionRegistry::new());
        let factory_rules = rules.clone();
        let coordinator = Coordinator::new(config, registry.clone(), move || factory_rules.clone());
        Self {
            coordinator,
            rules,
            registry,
        }
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        self.coordinator.snapshot()
    }

    /// Open a connection and log in as `name`.
    pub fn join(&mut self, name: &str) -> Arc<RecordingConnection> {
        let connection = RecordingConnection::new(name);
        self.coordinator.handle(CoordinatorEvent::Join {
            identity: name.to_string(),
            connection: connection.clone(),
        });
        connection
    }

    pub fn send(&mut self, connection: &RecordingConnection, payload: Payload) {
        self.coordinator.handle(CoordinatorEvent::Inbound {
            connection: connection.id(),
            message: Message::new(connection.name.clone(), payload),
        });
    }

    /// Kill a connection the way a transport does.
    pub fn drop_connection(&mut self, connection: &RecordingConnection) {
        connection.disconnect();
        self.coordinator.handle(CoordinatorEvent::Disconnected {
            connection: connection.id(),
        });
    }

    pub fn choose_color(&mut self, connection: &RecordingConnection, color: &str) {
        self.send(
            connection,
            Payload::ColorRequest {
                color: color.to_string(),
            },
        );
    }

    pub fn choose_secret(&mut self, connection: &RecordingConnection) {
        self.send(
            connection,
            Payload::SecretStartingResponse {
                secret_target: TARGETS[0],
                starting_front: true,
            },
        );
    }

    /// Fill the lobby with `names` and start the match.
    pub fn start(&mut self, names: &[&str]) -> Vec<Arc<RecordingConnection>> {
        let colors = ["red", "blue", "green", "yellow"];
        let mut connections = Vec::new();
        for (index, name) in names.iter().enumerate() {
            let connection = self.join(name);
            self.choose_color(&connection, colors[index]);
            if index == 0 {
                self.send(
                    &connection,
                    Payload::PlayersNumberReply {
                        count: names.len() as u8,
                    },
                );
            }
            self.choose_secret(&connection);
            connections.push(connection);
        }
        connections
    }

    pub fn connection_of<'a>(
        &self,
        connections: &'a [Arc<RecordingConnection>],
        identity: &PlayerIdentity,
    ) -> &'a Arc<RecordingConnection> {
        connections
            .iter()
            .find(|connection| identity.matches(&connection.name))
            .unwrap()
    }

    pub fn active(&self) -> PlayerIdentity {
        self.snapshot().active.unwrap()
    }

    /// Have the active player place a card and, if asked to, draw.
    pub fn play_turn(&mut self, connections: &[Arc<RecordingConnection>], cell: Cell) {
        let active = self.active();
        let connection = self.connection_of(connections, &active).clone();
        self.send(
            &connection,
            Payload::PlaceCardResponse {
                slot: 0,
                row: cell.row,
                col: cell.col,
                front: true,
            },
        );
        if self.snapshot().phase == codex::game::Phase::Draw {
            self.send(&connection, Payload::DrawCardResponse { choice: 1 });
        }
    }
}
