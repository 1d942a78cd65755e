//! Match state machine.
//!
//! [`MatchState`] owns the phase, the turn rotation and the lap-ending
//! markers of a single match. It performs no I/O: the coordinator drives
//! it and announces whatever the transitions decide.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    entities::{CardPlacementRecord, PlayerIdentity},
    functional,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Phase {
    /// Waiting for players, colors and starting choices.
    Lobby,
    /// Dealing and rotating the roster; never observed between events.
    Setup,
    /// The active player must place a card.
    Play,
    /// The active player must draw a card.
    Draw,
    /// Final scoring; the match is replaced right after.
    Ending,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Lobby => "lobby",
            Self::Setup => "setup",
            Self::Play => "play",
            Self::Draw => "draw",
            Self::Ending => "ending",
        };
        write!(f, "{repr}")
    }
}

/// What the coordinator must do after a legal placement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlacementOutcome {
    /// Move to the draw phase for the same player.
    Draw { last_lap_started: bool },
    /// A deck ran out: no draw, the turn passes immediately.
    SkipDraw { last_lap_started: bool },
    /// The lap-ending player just played again.
    EndMatch,
}

/// Result of asking who plays next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TurnAdvance {
    Next(usize),
    /// The turn reached the player who started the last lap.
    EndMatch,
    NobodyOnline,
}

#[derive(Debug)]
pub struct MatchState {
    phase: Phase,
    players: Vec<PlayerIdentity>,
    active: usize,
    suspended: bool,
    first_to_threshold: Option<PlayerIdentity>,
    first_to_finish_deck: Option<PlayerIdentity>,
    target_players: Option<usize>,
    history: Vec<CardPlacementRecord>,
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Lobby,
            players: Vec::new(),
            active: 0,
            suspended: false,
            first_to_threshold: None,
            first_to_finish_deck: None,
            target_players: None,
            history: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("Match phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    pub fn players(&self) -> &[PlayerIdentity] {
        &self.players
    }

    pub fn contains(&self, identity: &PlayerIdentity) -> bool {
        self.players.contains(identity)
    }

    /// The lobby host is whoever has been waiting longest.
    pub fn host(&self) -> Option<&PlayerIdentity> {
        self.players.first()
    }

    pub fn is_host(&self, identity: &PlayerIdentity) -> bool {
        self.host() == Some(identity)
    }

    pub fn target_players(&self) -> Option<usize> {
        self.target_players
    }

    pub fn set_target_players(&mut self, count: usize) {
        self.target_players = Some(count);
    }

    pub fn admit(&mut self, identity: PlayerIdentity) {
        if !self.contains(&identity) {
            self.players.push(identity);
        }
    }

    /// Drop a player who left before the match started.
    pub fn remove(&mut self, identity: &PlayerIdentity) -> bool {
        let before = self.players.len();
        self.players.retain(|player| player != identity);
        before != self.players.len()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_player(&self) -> Option<&PlayerIdentity> {
        match self.phase {
            Phase::Lobby => None,
            _ => self.players.get(self.active),
        }
    }

    pub fn is_active(&self, identity: &PlayerIdentity) -> bool {
        self.active_player() == Some(identity)
    }

    pub fn set_active(&mut self, seat: usize) {
        if seat < self.players.len() {
            self.active = seat;
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    pub fn first_to_threshold(&self) -> Option<&PlayerIdentity> {
        self.first_to_threshold.as_ref()
    }

    pub fn first_to_finish_deck(&self) -> Option<&PlayerIdentity> {
        self.first_to_finish_deck.as_ref()
    }

    pub fn history(&self) -> &[CardPlacementRecord] {
        &self.history
    }

    pub fn record(&mut self, record: CardPlacementRecord) {
        self.history.push(record);
    }

    pub fn history_for(&self, identity: &PlayerIdentity) -> Vec<CardPlacementRecord> {
        functional::replay_for(&self.history, identity)
    }

    /// Close the lobby. The roster is rotated so `first` opens the match
    /// while keeping the join order cyclically intact; it is never
    /// reordered again.
    pub fn start(&mut self, first: usize) {
        let len = self.players.len();
        if len > 0 {
            self.players.rotate_left(first % len);
        }
        self.active = 0;
        self.set_phase(Phase::Setup);
    }

    /// Apply the sudden-death rules after the active player placed a card
    /// and now holds `points`.
    pub fn resolve_placement(
        &mut self,
        points: u32,
        any_deck_empty: bool,
        threshold: u32,
    ) -> PlacementOutcome {
        let Some(active) = self.active_player().cloned() else {
            return PlacementOutcome::SkipDraw {
                last_lap_started: false,
            };
        };

        if points >= threshold && !any_deck_empty {
            return match &self.first_to_threshold {
                None => {
                    self.first_to_threshold = Some(active);
                    PlacementOutcome::Draw {
                        last_lap_started: true,
                    }
                }
                Some(first) if *first == active => PlacementOutcome::EndMatch,
                Some(_) => PlacementOutcome::Draw {
                    last_lap_started: false,
                },
            };
        }

        if any_deck_empty {
            return match (&self.first_to_finish_deck, &self.first_to_threshold) {
                (None, None) => {
                    self.first_to_finish_deck = Some(active);
                    PlacementOutcome::SkipDraw {
                        last_lap_started: true,
                    }
                }
                // Threshold already reached: that player still closes the lap.
                (None, Some(threshold_player)) => {
                    self.first_to_finish_deck = Some(threshold_player.clone());
                    PlacementOutcome::SkipDraw {
                        last_lap_started: false,
                    }
                }
                (Some(first), _) if *first == active => PlacementOutcome::EndMatch,
                (Some(_), _) => PlacementOutcome::SkipDraw {
                    last_lap_started: false,
                },
            };
        }

        PlacementOutcome::Draw {
            last_lap_started: false,
        }
    }

    /// Decide who plays after the active player. The match ends once the
    /// rotation reaches a lap-ending player, even when that player is
    /// offline and would otherwise be skipped.
    pub fn next_turn(&self, is_online: impl Fn(&PlayerIdentity) -> bool) -> TurnAdvance {
        let Some(next) = functional::next_player(&self.players, self.active, is_online) else {
            return TurnAdvance::NobodyOnline;
        };
        let ends_lap = |seat: usize| {
            let player = Some(&self.players[seat]);
            player == self.first_to_threshold.as_ref() || player == self.first_to_finish_deck.as_ref()
        };
        if functional::seats_between(self.players.len(), self.active, next).any(ends_lap) {
            TurnAdvance::EndMatch
        } else {
            TurnAdvance::Next(next)
        }
    }
}
