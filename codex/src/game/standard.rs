//! A compact reference rules engine.
//!
//! Card content is generated rather than loaded: ids 1-40 are resource
//! cards, 41-80 gold cards, 81-86 starting cards and 87-102 objectives.
//! Every card belongs to one of four kingdoms (`id % 4`).
//!
//! - A card may only be placed on an empty cell diagonally adjacent to a
//!   card already on the board.
//! - Gold cards played face up need three cards of their kingdom on the
//!   board already.
//! - Face-up resource cards score `id % 2`; face-up gold cards score two
//!   plus one for every neighbouring card. Backs score nothing.
//! - Each objective pays two points per three board cards of its kingdom.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use std::collections::HashMap;

use super::{
    entities::{
        CardId, Cell, Color, DeckDisplay, DrawChoice, HandView, LeaderboardEntry,
        PlacedCard, PlayerIdentity, STARTING_CELL, StartingOptions,
    },
    functional,
    rules::{RuleError, RulesEngine},
};

const RESOURCE_CARDS: std::ops::RangeInclusive<u16> = 1..=40;
const GOLD_CARDS: std::ops::RangeInclusive<u16> = 41..=80;
const STARTING_CARDS: std::ops::RangeInclusive<u16> = 81..=86;
const OBJECTIVE_CARDS: std::ops::RangeInclusive<u16> = 87..=102;

const MAX_SEATS: usize = 4;
const GOLD_REQUIREMENT: usize = 3;
const OBJECTIVE_SET: usize = 3;
const OBJECTIVE_POINTS: u32 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Kingdom {
    Fungi,
    Plant,
    Animal,
    Insect,
}

fn kingdom(card: CardId) -> Kingdom {
    match card.0 % 4 {
        0 => Kingdom::Fungi,
        1 => Kingdom::Plant,
        2 => Kingdom::Animal,
        _ => Kingdom::Insect,
    }
}

fn is_gold(card: CardId) -> bool {
    GOLD_CARDS.contains(&card.0)
}

fn shuffled(rng: &mut StdRng, ids: std::ops::RangeInclusive<u16>) -> Vec<CardId> {
    let mut deck: Vec<CardId> = ids.map(CardId).collect();
    deck.shuffle(rng);
    deck
}

#[derive(Debug)]
struct Seat {
    color: Option<Color>,
    starting_card: CardId,
    targets: [CardId; 2],
    secret: Option<CardId>,
    hand: Vec<Option<CardId>>,
    board: HashMap<Cell, PlacedCard>,
    placements: Vec<PlacedCard>,
    points: u32,
}

impl Seat {
    fn kingdom_count(&self, wanted: Kingdom) -> usize {
        self.placements
            .iter()
            .filter(|placed| placed.card != self.starting_card && kingdom(placed.card) == wanted)
            .count()
    }

    fn lay(&mut self, placed: PlacedCard) {
        self.board.insert(placed.cell, placed);
        self.placements.push(placed);
    }
}

#[derive(Debug)]
pub struct StandardRules {
    resource_deck: Vec<CardId>,
    gold_deck: Vec<CardId>,
    starting_deck: Vec<CardId>,
    objective_deck: Vec<CardId>,
    resource_face_up: [Option<CardId>; 2],
    gold_face_up: [Option<CardId>; 2],
    common_targets: Vec<CardId>,
    order: Vec<PlayerIdentity>,
    seats: HashMap<PlayerIdentity, Seat>,
}

impl Default for StandardRules {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardRules {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic decks, for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(mut rng: StdRng) -> Self {
        let resource_deck = shuffled(&mut rng, RESOURCE_CARDS);
        let gold_deck = shuffled(&mut rng, GOLD_CARDS);
        let starting_deck = shuffled(&mut rng, STARTING_CARDS);
        let objective_deck = shuffled(&mut rng, OBJECTIVE_CARDS);
        Self {
            resource_deck,
            gold_deck,
            starting_deck,
            objective_deck,
            resource_face_up: [None; 2],
            gold_face_up: [None; 2],
            common_targets: Vec::new(),
            order: Vec::new(),
            seats: HashMap::new(),
        }
    }

    fn seat(&self, identity: &PlayerIdentity) -> Result<&Seat, RuleError> {
        self.seats
            .get(identity)
            .ok_or_else(|| RuleError::UnknownPlayer(identity.clone()))
    }

    fn seat_mut(&mut self, identity: &PlayerIdentity) -> Result<&mut Seat, RuleError> {
        self.seats
            .get_mut(identity)
            .ok_or_else(|| RuleError::UnknownPlayer(identity.clone()))
    }

    fn draw_from(deck: &mut Vec<CardId>, name: &'static str) -> Result<CardId, RuleError> {
        deck.pop().ok_or(RuleError::DeckExhausted(name))
    }

    /// Cards returned by a player leaving the lobby go to the bottom.
    fn bury(deck: &mut Vec<CardId>, cards: impl IntoIterator<Item = CardId>) {
        for card in cards {
            deck.insert(0, card);
        }
    }

    fn points_for(seat: &Seat, placed: &PlacedCard) -> u32 {
        if !placed.front {
            return 0;
        }
        if is_gold(placed.card) {
            let neighbours = placed
                .cell
                .diagonals()
                .filter(|cell| seat.board.contains_key(cell))
                .count();
            2 + neighbours as u32
        } else {
            u32::from(placed.card.0 % 2)
        }
    }

    fn objective_sets(seat: &Seat, objective: CardId) -> u32 {
        (seat.kingdom_count(kingdom(objective)) / OBJECTIVE_SET) as u32
    }
}

impl RulesEngine for StandardRules {
    fn add_player(&mut self, identity: &PlayerIdentity) -> Result<(), RuleError> {
        if self.seats.len() >= MAX_SEATS {
            return Err(RuleError::TableFull);
        }
        if self.resource_deck.len() < 2
            || self.gold_deck.is_empty()
            || self.starting_deck.is_empty()
            || self.objective_deck.len() < 2
        {
            return Err(RuleError::DeckExhausted("setup"));
        }
        let starting_card = Self::draw_from(&mut self.starting_deck, "starting")?;
        let hand = vec![
            Some(Self::draw_from(&mut self.resource_deck, "resource")?),
            Some(Self::draw_from(&mut self.resource_deck, "resource")?),
            Some(Self::draw_from(&mut self.gold_deck, "gold")?),
        ];
        let targets = [
            Self::draw_from(&mut self.objective_deck, "objective")?,
            Self::draw_from(&mut self.objective_deck, "objective")?,
        ];
        self.seats.insert(
            identity.clone(),
            Seat {
                color: None,
                starting_card,
                targets,
                secret: None,
                hand,
                board: HashMap::new(),
                placements: Vec::new(),
                points: 0,
            },
        );
        self.order.push(identity.clone());
        Ok(())
    }

    fn remove_player(&mut self, identity: &PlayerIdentity) {
        let Some(seat) = self.seats.remove(identity) else {
            return;
        };
        self.order.retain(|player| player != identity);
        let (gold, resource): (Vec<CardId>, Vec<CardId>) =
            seat.hand.into_iter().flatten().partition(|card| is_gold(*card));
        Self::bury(&mut self.resource_deck, resource);
        Self::bury(&mut self.gold_deck, gold);
        Self::bury(&mut self.starting_deck, [seat.starting_card]);
        Self::bury(&mut self.objective_deck, seat.targets);
    }

    fn available_colors(&self) -> Vec<Color> {
        Color::ALL
            .into_iter()
            .filter(|color| self.seats.values().all(|seat| seat.color != Some(*color)))
            .collect()
    }

    fn claim_color(&mut self, identity: &PlayerIdentity, color: Color) -> Result<(), RuleError> {
        let taken = self
            .seats
            .iter()
            .any(|(player, seat)| player != identity && seat.color == Some(color));
        if taken {
            return Err(RuleError::ColorTaken(color));
        }
        self.seat_mut(identity)?.color = Some(color);
        Ok(())
    }

    fn starting_options(&self, identity: &PlayerIdentity) -> Option<StartingOptions> {
        self.seats.get(identity).map(|seat| StartingOptions {
            starting_card: seat.starting_card,
            targets: seat.targets,
        })
    }

    fn choose_starting(
        &mut self,
        identity: &PlayerIdentity,
        secret_target: CardId,
        starting_front: bool,
    ) -> Result<PlacedCard, RuleError> {
        let seat = self.seat_mut(identity)?;
        if seat.secret.is_some() {
            return Err(RuleError::StartingAlreadyChosen);
        }
        if !seat.targets.contains(&secret_target) {
            return Err(RuleError::InvalidTarget(secret_target));
        }
        seat.secret = Some(secret_target);
        let placed = PlacedCard {
            card: seat.starting_card,
            cell: STARTING_CELL,
            front: starting_front,
        };
        seat.lay(placed);
        Ok(placed)
    }

    fn is_ready(&self, identity: &PlayerIdentity) -> bool {
        self.seats
            .get(identity)
            .is_some_and(|seat| seat.color.is_some() && seat.secret.is_some())
    }

    fn start_match(&mut self) {
        self.resource_face_up = [self.resource_deck.pop(), self.resource_deck.pop()];
        self.gold_face_up = [self.gold_deck.pop(), self.gold_deck.pop()];
        self.common_targets = (0..2).filter_map(|_| self.objective_deck.pop()).collect();
    }

    fn place_card(
        &mut self,
        identity: &PlayerIdentity,
        slot: usize,
        cell: Cell,
        front: bool,
    ) -> Result<PlacedCard, RuleError> {
        let deck_empty = self.any_deck_empty();
        let seat = self.seat(identity)?;
        // Draws stop once a deck runs out, so hands may shrink from then on.
        if !deck_empty && seat.hand.iter().any(Option::is_none) {
            return Err(RuleError::DrawFirst);
        }
        let card = seat
            .hand
            .get(slot)
            .copied()
            .flatten()
            .ok_or(RuleError::NotInHand(slot))?;
        if !cell.in_bounds() {
            return Err(RuleError::OutOfBounds(cell));
        }
        if seat.board.contains_key(&cell) {
            return Err(RuleError::CellOccupied(cell));
        }
        if !cell.diagonals().any(|near| seat.board.contains_key(&near)) {
            return Err(RuleError::CellUnavailable(cell));
        }
        if front && is_gold(card) && seat.kingdom_count(kingdom(card)) < GOLD_REQUIREMENT {
            return Err(RuleError::InsufficientResources(card));
        }

        let placed = PlacedCard { card, cell, front };
        let seat = self.seat_mut(identity)?;
        let points = Self::points_for(seat, &placed);
        seat.hand[slot] = None;
        seat.lay(placed);
        seat.points += points;
        Ok(placed)
    }

    fn draw_card(&mut self, identity: &PlayerIdentity, choice: DrawChoice) -> Result<CardId, RuleError> {
        let empty_slot = self
            .seat(identity)?
            .hand
            .iter()
            .position(Option::is_none)
            .ok_or(RuleError::PlaceFirst)?;

        let card = match choice {
            DrawChoice::ResourceDeck => self.resource_deck.pop(),
            DrawChoice::GoldDeck => self.gold_deck.pop(),
            DrawChoice::ResourceFaceUp(slot) => {
                let card = self.resource_face_up.get(slot).copied().flatten();
                if card.is_some() {
                    self.resource_face_up[slot] = self.resource_deck.pop();
                }
                card
            }
            DrawChoice::GoldFaceUp(slot) => {
                let card = self.gold_face_up.get(slot).copied().flatten();
                if card.is_some() {
                    self.gold_face_up[slot] = self.gold_deck.pop();
                }
                card
            }
        }
        .ok_or(RuleError::EmptySource(choice))?;

        self.seat_mut(identity)?.hand[empty_slot] = Some(card);
        Ok(card)
    }

    fn refill(&mut self, identity: &PlayerIdentity) -> Result<Option<CardId>, RuleError> {
        let Some(empty_slot) = self.seat(identity)?.hand.iter().position(Option::is_none) else {
            return Ok(None);
        };
        let Some(card) = self.resource_deck.pop().or_else(|| self.gold_deck.pop()) else {
            return Ok(None);
        };
        self.seat_mut(identity)?.hand[empty_slot] = Some(card);
        Ok(Some(card))
    }

    fn score(&self, identity: &PlayerIdentity) -> u32 {
        self.seats.get(identity).map_or(0, |seat| seat.points)
    }

    fn any_deck_empty(&self) -> bool {
        self.resource_deck.is_empty() || self.gold_deck.is_empty()
    }

    fn board(&self, identity: &PlayerIdentity) -> Vec<PlacedCard> {
        self.seats
            .get(identity)
            .map(|seat| seat.placements.clone())
            .unwrap_or_default()
    }

    fn hand(&self, identity: &PlayerIdentity) -> HandView {
        self.seats
            .get(identity)
            .map(|seat| HandView {
                slots: seat.hand.clone(),
                secret_target: seat.secret,
            })
            .unwrap_or_default()
    }

    fn common_targets(&self) -> Vec<CardId> {
        self.common_targets.clone()
    }

    fn decks(&self) -> DeckDisplay {
        DeckDisplay {
            slots: [
                self.resource_deck.last().copied(),
                self.gold_deck.last().copied(),
                self.resource_face_up[0],
                self.resource_face_up[1],
                self.gold_face_up[0],
                self.gold_face_up[1],
            ],
        }
    }

    fn final_scores(&mut self) -> Vec<LeaderboardEntry> {
        let entries = self
            .order
            .iter()
            .filter_map(|identity| {
                let seat = self.seats.get(identity)?;
                let objectives: u32 = self
                    .common_targets
                    .iter()
                    .chain(seat.secret.iter())
                    .map(|objective| Self::objective_sets(seat, *objective))
                    .sum();
                Some(LeaderboardEntry {
                    identity: identity.clone(),
                    points: seat.points + objectives * OBJECTIVE_POINTS,
                    objectives,
                })
            })
            .collect();
        functional::rank_leaderboard(entries)
    }
}
