//! The rules engine seam.
//!
//! The coordinator decides *when* things happen; a [`RulesEngine`]
//! decides whether a move is legal and what it is worth. Engines are
//! plain synchronous objects owned by the coordinator, so they never see
//! concurrent calls.

use thiserror::Error;

use super::entities::{
    CardId, Cell, Color, DeckDisplay, DrawChoice, HandView, LeaderboardEntry, PlacedCard,
    PlayerIdentity, StartingOptions,
};

/// A move the rules refuse. The display text is shown to the offending
/// player as-is.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum RuleError {
    #[error("{0} is not part of this match")]
    UnknownPlayer(PlayerIdentity),
    #[error("the table is full")]
    TableFull,
    #[error("color {0} is already taken")]
    ColorTaken(Color),
    #[error("{0} is not one of your secret objective options")]
    InvalidTarget(CardId),
    #[error("your starting card is already on the board")]
    StartingAlreadyChosen,
    #[error("there is no card in hand slot {0}")]
    NotInHand(usize),
    #[error("cell {0} is outside the board")]
    OutOfBounds(Cell),
    #[error("cell {0} is already occupied")]
    CellOccupied(Cell),
    #[error("cell {0} does not touch a corner of any card on your board")]
    CellUnavailable(Cell),
    #[error("not enough resources on your board to play {0} face up")]
    InsufficientResources(CardId),
    #[error("draw choice must be between 1 and 6, got {0}")]
    InvalidDrawChoice(u8),
    #[error("there is nothing left to draw from {0}")]
    EmptySource(DrawChoice),
    #[error("you must place a card before drawing")]
    PlaceFirst,
    #[error("you must draw a card before placing another")]
    DrawFirst,
    #[error("the {0} deck is exhausted")]
    DeckExhausted(&'static str),
}

/// Card legality, scoring and deck management for one match.
///
/// A fresh engine is built for every match, so implementations may keep
/// all of their state for the lifetime of the value.
pub trait RulesEngine: Send + 'static {
    /// Seat a new player and deal their starting card, hand and
    /// candidate objectives.
    fn add_player(&mut self, identity: &PlayerIdentity) -> Result<(), RuleError>;

    /// Forget a player who left the lobby.
    fn remove_player(&mut self, identity: &PlayerIdentity);

    fn available_colors(&self) -> Vec<Color>;

    fn claim_color(&mut self, identity: &PlayerIdentity, color: Color) -> Result<(), RuleError>;

    fn starting_options(&self, identity: &PlayerIdentity) -> Option<StartingOptions>;

    /// Keep one of the two candidate objectives and lay the starting card
    /// on the requested side. Returns the starting card as placed.
    fn choose_starting(
        &mut self,
        identity: &PlayerIdentity,
        secret_target: CardId,
        starting_front: bool,
    ) -> Result<PlacedCard, RuleError>;

    /// Whether the player has a color and a confirmed starting choice.
    fn is_ready(&self, identity: &PlayerIdentity) -> bool;

    /// Lay out the shared cards once the lobby closes.
    fn start_match(&mut self);

    fn place_card(
        &mut self,
        identity: &PlayerIdentity,
        slot: usize,
        cell: Cell,
        front: bool,
    ) -> Result<PlacedCard, RuleError>;

    fn draw_card(&mut self, identity: &PlayerIdentity, choice: DrawChoice) -> Result<CardId, RuleError>;

    /// Top up a hand whose draw was skipped because the turn moved on
    /// after placement. Returns the card dealt, or `None` when the hand
    /// was already full or nothing is left to draw.
    fn refill(&mut self, identity: &PlayerIdentity) -> Result<Option<CardId>, RuleError>;

    fn score(&self, identity: &PlayerIdentity) -> u32;

    fn any_deck_empty(&self) -> bool;

    fn board(&self, identity: &PlayerIdentity) -> Vec<PlacedCard>;

    fn hand(&self, identity: &PlayerIdentity) -> HandView;

    fn common_targets(&self) -> Vec<CardId>;

    fn decks(&self) -> DeckDisplay;

    /// Score objectives and return every player's final standing.
    fn final_scores(&mut self) -> Vec<LeaderboardEntry>;
}
