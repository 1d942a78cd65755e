use serde::{Deserialize, Serialize};
use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};
use thiserror::Error;

/// Identity the server uses when it is the sender of a message.
pub const SERVER_NAME: &str = "CodexNaturalisServer";

/// Chat recipient that addresses every online player except the sender.
pub const GENERAL_CHANNEL: &str = "General";

pub const MAX_IDENTITY_LEN: usize = 20;

/// Boards are square grids of this many rows and columns.
pub const BOARD_SIZE: u8 = 81;

/// Every starting card is placed in the middle of the board.
pub const STARTING_CELL: Cell = Cell { row: 40, col: 40 };

/// Number of cards a player holds between turns.
pub const HAND_SIZE: usize = 3;

#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum IdentityError {
    #[error("nickname can't be empty")]
    Empty,
    #[error("nickname must be at most {max} characters, got {len}")]
    TooLong { len: usize, max: usize },
    #[error("nickname {0} is reserved")]
    Reserved(String),
    #[error("nickname {0} is already taken")]
    Taken(String),
}

/// A player nickname. Equality and hashing ignore ASCII case so that
/// "Alice" and "ALICE" can never be two different players.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PlayerIdentity(String);

impl PlayerIdentity {
    /// Validate a raw nickname.
    ///
    /// # Errors
    ///
    /// Returns an error if the nickname is blank, longer than
    /// [`MAX_IDENTITY_LEN`] characters, or reserved by the server.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if raw.trim().is_empty() {
            return Err(IdentityError::Empty);
        }
        let len = raw.chars().count();
        if len > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong {
                len,
                max: MAX_IDENTITY_LEN,
            });
        }
        if raw.eq_ignore_ascii_case(SERVER_NAME) || raw.eq_ignore_ascii_case(GENERAL_CHANNEL) {
            return Err(IdentityError::Reserved(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a raw sender string names this identity.
    pub fn matches(&self, raw: &str) -> bool {
        self.0.eq_ignore_ascii_case(raw)
    }
}

impl PartialEq for PlayerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for PlayerIdentity {}

impl Hash for PlayerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for PlayerIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Blue, Color::Green, Color::Yellow];
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::ALL
            .into_iter()
            .find(|color| s.trim().eq_ignore_ascii_case(&color.to_string()))
            .ok_or_else(|| format!("{s} is not a color"))
    }
}

/// Numeric card identifier as printed on the physical card.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct CardId(pub u16);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

impl Cell {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn in_bounds(&self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }

    /// The four corner-sharing neighbours that exist on the board.
    pub fn diagonals(self) -> impl Iterator<Item = Cell> {
        [(-1i16, -1i16), (-1, 1), (1, -1), (1, 1)]
            .into_iter()
            .filter_map(move |(dr, dc)| {
                let row = u8::try_from(i16::from(self.row) + dr).ok()?;
                let col = u8::try_from(i16::from(self.col) + dc).ok()?;
                Some(Cell { row, col })
            })
            .filter(Cell::in_bounds)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A card lying on a player's board.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlacedCard {
    pub card: CardId,
    pub cell: Cell,
    pub front: bool,
}

/// One entry of the append-only placement history kept for the
/// lifetime of a match. Replayed to a player on reconnection.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CardPlacementRecord {
    pub identity: PlayerIdentity,
    pub card: CardId,
    pub cell: Cell,
    pub front: bool,
}

impl CardPlacementRecord {
    pub fn new(identity: PlayerIdentity, placed: PlacedCard) -> Self {
        Self {
            identity,
            card: placed.card,
            cell: placed.cell,
            front: placed.front,
        }
    }
}

/// Where a player draws their replacement card from. On the wire the
/// choice travels as its 1-based index.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum DrawChoice {
    ResourceDeck,
    GoldDeck,
    ResourceFaceUp(usize),
    GoldFaceUp(usize),
}

impl DrawChoice {
    pub const ALL: [DrawChoice; 6] = [
        DrawChoice::ResourceDeck,
        DrawChoice::GoldDeck,
        DrawChoice::ResourceFaceUp(0),
        DrawChoice::ResourceFaceUp(1),
        DrawChoice::GoldFaceUp(0),
        DrawChoice::GoldFaceUp(1),
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        let position = usize::from(index).checked_sub(1)?;
        Self::ALL.get(position).copied()
    }

    pub fn index(&self) -> u8 {
        match self {
            Self::ResourceDeck => 1,
            Self::GoldDeck => 2,
            Self::ResourceFaceUp(slot) => 3 + (*slot as u8),
            Self::GoldFaceUp(slot) => 5 + (*slot as u8),
        }
    }
}

impl fmt::Display for DrawChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceDeck => write!(f, "the resource deck"),
            Self::GoldDeck => write!(f, "the gold deck"),
            Self::ResourceFaceUp(slot) => write!(f, "face-up resource card {}", slot + 1),
            Self::GoldFaceUp(slot) => write!(f, "face-up gold card {}", slot + 1),
        }
    }
}

/// The six draw sources in [`DrawChoice`] order. `None` marks an empty source.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeckDisplay {
    pub slots: [Option<CardId>; 6],
}

impl DeckDisplay {
    pub fn get(&self, choice: DrawChoice) -> Option<CardId> {
        self.slots[usize::from(choice.index() - 1)]
    }
}

/// What a player may pick from before the match starts.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StartingOptions {
    pub starting_card: CardId,
    pub targets: [CardId; 2],
}

/// A player's private view: hand slots plus their secret objective.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandView {
    pub slots: Vec<Option<CardId>>,
    pub secret_target: Option<CardId>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub identity: PlayerIdentity,
    pub points: u32,
}

/// Final standing of one player, objectives included.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub identity: PlayerIdentity,
    pub points: u32,
    pub objectives: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    // === Identity Tests ===

    #[test]
    fn test_identity_accepts_valid_nickname() {
        let identity = PlayerIdentity::parse("Alice").unwrap();
        assert_eq!(identity.as_str(), "Alice");
        assert_eq!(identity.to_string(), "Alice");
    }

    #[test]
    fn test_identity_rejects_empty() {
        assert_eq!(PlayerIdentity::parse(""), Err(IdentityError::Empty));
        assert_eq!(PlayerIdentity::parse("   "), Err(IdentityError::Empty));
    }

    #[test]
    fn test_identity_length_boundary() {
        assert!(PlayerIdentity::parse(&"a".repeat(MAX_IDENTITY_LEN)).is_ok());
        assert_eq!(
            PlayerIdentity::parse(&"a".repeat(MAX_IDENTITY_LEN + 1)),
            Err(IdentityError::TooLong { len: 21, max: 20 })
        );
    }

    #[test]
    fn test_identity_rejects_reserved_names_ignoring_case() {
        assert!(matches!(
            PlayerIdentity::parse("codexnaturalisserver"),
            Err(IdentityError::Reserved(_))
        ));
        assert!(matches!(
            PlayerIdentity::parse("GENERAL"),
            Err(IdentityError::Reserved(_))
        ));
    }

    #[test]
    fn test_identity_equality_ignores_case() {
        let lower = PlayerIdentity::parse("bob").unwrap();
        let upper = PlayerIdentity::parse("BoB").unwrap();
        assert_eq!(lower, upper);
        assert!(lower.matches("BOB"));

        let mut set = HashSet::new();
        set.insert(lower);
        assert!(!set.insert(upper));
    }

    // === Color Tests ===

    #[test]
    fn test_color_parse_is_case_insensitive() {
        assert_eq!("Red".parse::<Color>(), Ok(Color::Red));
        assert_eq!(" yellow ".parse::<Color>(), Ok(Color::Yellow));
        assert!("purple".parse::<Color>().is_err());
    }

    // === Cell Tests ===

    #[test]
    fn test_cell_diagonals_in_middle() {
        let neighbours: Vec<Cell> = STARTING_CELL.diagonals().collect();
        assert_eq!(neighbours.len(), 4);
        assert!(neighbours.contains(&Cell::new(39, 39)));
        assert!(neighbours.contains(&Cell::new(41, 41)));
    }

    #[test]
    fn test_cell_diagonals_clipped_at_corner() {
        let neighbours: Vec<Cell> = Cell::new(0, 0).diagonals().collect();
        assert_eq!(neighbours, vec![Cell::new(1, 1)]);

        let edge: Vec<Cell> = Cell::new(80, 80).diagonals().collect();
        assert_eq!(edge, vec![Cell::new(79, 79)]);
    }

    // === Draw Choice Tests ===

    #[test]
    fn test_draw_choice_indices() {
        for (position, choice) in DrawChoice::ALL.iter().enumerate() {
            assert_eq!(usize::from(choice.index()), position + 1);
            assert_eq!(DrawChoice::from_index(choice.index()), Some(*choice));
        }
        assert_eq!(DrawChoice::from_index(0), None);
        assert_eq!(DrawChoice::from_index(7), None);
    }

    #[test]
    fn test_deck_display_lookup() {
        let mut display = DeckDisplay::default();
        display.slots[4] = Some(CardId(55));
        assert_eq!(display.get(DrawChoice::GoldFaceUp(0)), Some(CardId(55)));
        assert_eq!(display.get(DrawChoice::ResourceDeck), None);
    }
}
