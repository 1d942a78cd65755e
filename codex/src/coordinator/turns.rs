//! Turn rotation, placements, draws and the end of the match.

use super::Coordinator;
use crate::{
    game::{
        entities::{CardPlacementRecord, Cell, DrawChoice, PlayerIdentity, ScoreEntry},
        functional,
        rules::{RuleError, RulesEngine},
        state_machine::{Phase, PlacementOutcome, TurnAdvance},
    },
    net::messages::{Message, Payload},
};

impl<R: RulesEngine> Coordinator<R> {
    /// Boards, shared cards, private hands, decks and scores, in that order.
    pub(super) fn broadcast_public_state(&self) {
        let players = self.state.players();
        for player in players {
            self.registry
                .broadcast(&Message::from_server(Payload::PlayerInformation {
                    identity: player.clone(),
                    board: self.rules.board(player),
                }));
        }
        self.registry
            .broadcast(&Message::from_server(Payload::CommonTargetCard {
                targets: self.rules.common_targets(),
            }));
        for player in players {
            self.registry.send_to(
                player,
                Message::from_server(Payload::HandsResponseCard {
                    hand: self.rules.hand(player),
                }),
            );
        }
        self.registry
            .broadcast(&Message::from_server(Payload::DisplayDecks {
                decks: self.rules.decks(),
            }));

        let scores = players
            .iter()
            .map(|player| ScoreEntry {
                identity: player.clone(),
                points: self.rules.score(player),
            })
            .collect();
        self.registry
            .broadcast(&Message::from_server(Payload::ScoreBoard {
                scores: functional::rank_scores(scores),
            }));
    }

    pub(super) fn begin_turn(&mut self, seat: usize) {
        self.state.set_active(seat);
        self.broadcast_public_state();
        let Some(active) = self.state.players().get(seat).cloned() else {
            return;
        };
        self.registry
            .broadcast(&Message::generic(format!("It's {active}'s turn.")));
        self.state.set_phase(Phase::Play);
        log::info!("{active} to play");
        self.registry
            .send_to(&active, Message::from_server(Payload::PlaceCardRequest));
    }

    /// The active player placed but their draw is being skipped, so they
    /// are dealt a card to start their next turn with a full hand.
    pub(super) fn settle_skipped_draw(&mut self) {
        if self.state.phase() != Phase::Draw {
            return;
        }
        let Some(player) = self.state.active_player().cloned() else {
            return;
        };
        match self.rules.refill(&player) {
            Ok(Some(card)) => log::debug!("{player} skipped their draw and was dealt {card}"),
            Ok(None) => {}
            Err(error) => log::warn!("Could not refill the hand of {player}: {error}"),
        }
    }

    fn enter_draw(&mut self, identity: &PlayerIdentity) {
        self.broadcast_public_state();
        self.state.set_phase(Phase::Draw);
        self.registry
            .send_to(identity, Message::from_server(Payload::DrawCardRequest));
    }

    pub(super) fn place(&mut self, identity: &PlayerIdentity, slot: u8, row: u8, col: u8, front: bool) {
        let placed = match self
            .rules
            .place_card(identity, usize::from(slot), Cell::new(row, col), front)
        {
            Ok(placed) => placed,
            Err(error) => {
                self.reject(identity, &error, Payload::PlaceCardRequest);
                return;
            }
        };
        self.state
            .record(CardPlacementRecord::new(identity.clone(), placed));

        let points = self.rules.score(identity);
        let outcome = self.state.resolve_placement(
            points,
            self.rules.any_deck_empty(),
            self.config.winning_threshold,
        );
        log::debug!(
            "{identity} placed {} at {} ({points} points): {outcome:?}",
            placed.card,
            placed.cell
        );

        match outcome {
            PlacementOutcome::Draw { last_lap_started } => {
                if last_lap_started {
                    self.announce_last_lap(format!(
                        "{identity} reached {} points! Last lap started.",
                        self.config.winning_threshold
                    ));
                }
                self.enter_draw(identity);
            }
            PlacementOutcome::SkipDraw { last_lap_started } => {
                if last_lap_started {
                    self.announce_last_lap("A deck is empty! Last lap started.".to_string());
                }
                self.next_turn();
            }
            PlacementOutcome::EndMatch => self.end_match(),
        }
    }

    fn announce_last_lap(&self, text: String) {
        log::info!("{text}");
        self.registry.broadcast(&Message::generic(text));
    }

    pub(super) fn draw(&mut self, identity: &PlayerIdentity, choice: u8) {
        let drawn = DrawChoice::from_index(choice)
            .ok_or(RuleError::InvalidDrawChoice(choice))
            .and_then(|choice| self.rules.draw_card(identity, choice));
        match drawn {
            Ok(card) => {
                log::debug!("{identity} drew {card}");
                self.next_turn();
            }
            Err(error) => self.reject(identity, &error, Payload::DrawCardRequest),
        }
    }

    /// Pass the turn on, or finish the match when the lap is complete.
    pub(super) fn next_turn(&mut self) {
        if self.state.is_suspended() {
            return;
        }
        match self.state.next_turn(|player| self.registry.is_online(player)) {
            TurnAdvance::Next(seat) => self.begin_turn(seat),
            TurnAdvance::EndMatch => self.end_match(),
            TurnAdvance::NobodyOnline => {
                log::warn!("Nobody left to play, abandoning the match");
                self.reset();
            }
        }
    }

    pub(super) fn end_match(&mut self) {
        self.state.set_phase(Phase::Ending);
        let leaderboard = functional::rank_leaderboard(self.rules.final_scores());
        if let Some(winner) = leaderboard.first() {
            log::info!("Match over, {} wins with {} points", winner.identity, winner.points);
        }

        self.registry.broadcast(&Message::generic("Last lap completed!"));
        self.registry
            .broadcast(&Message::from_server(Payload::FinalScoreBoard { leaderboard }));
        self.registry
            .broadcast(&Message::generic("Game over! Thanks for playing."));
        self.matches_completed += 1;
        self.reset();
    }
}
