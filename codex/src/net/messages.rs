use serde::{Deserialize, Serialize};
use std::fmt;

use super::super::game::entities::{
    CardId, CardPlacementRecord, Color, DeckDisplay, HandView, LeaderboardEntry, PlacedCard,
    PlayerIdentity, SERVER_NAME, ScoreEntry,
};

/// Everything that can travel between a client and the server. The same
/// vocabulary is used in both directions; which side sent a payload is
/// known from the channel it arrived on.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Payload {
    /// The sender of the enclosing message is the requested identity.
    LoginRequest,
    LoginReply {
        nickname_accepted: bool,
        connection_established: bool,
    },
    /// Liveness probe. Never reaches the coordinator.
    Ping,
    PlayersNumberRequest,
    PlayersNumberReply {
        count: u8,
    },
    ColorRequest {
        color: String,
    },
    ColorResponse {
        accepted: bool,
        available: Vec<Color>,
    },
    SecretStartingRequest {
        starting_card: CardId,
        targets: [CardId; 2],
    },
    SecretStartingResponse {
        secret_target: CardId,
        starting_front: bool,
    },
    PlaceCardRequest,
    /// Play the card in hand `slot` (0-based) at `(row, col)`.
    PlaceCardResponse {
        slot: u8,
        row: u8,
        col: u8,
        front: bool,
    },
    DrawCardRequest,
    /// 1-based draw option, see [`DeckDisplay`].
    DrawCardResponse {
        choice: u8,
    },
    PlayerInformation {
        identity: PlayerIdentity,
        board: Vec<PlacedCard>,
    },
    CommonTargetCard {
        targets: Vec<CardId>,
    },
    HandsResponseCard {
        hand: HandView,
    },
    DisplayDecks {
        decks: DeckDisplay,
    },
    ScoreBoard {
        scores: Vec<ScoreEntry>,
    },
    PlayersList {
        players: Vec<PlayerIdentity>,
    },
    FinalScoreBoard {
        leaderboard: Vec<LeaderboardEntry>,
    },
    ChatMessage {
        from: String,
        to: String,
        text: String,
    },
    ErrorMessage {
        text: String,
    },
    GenericMessage {
        text: String,
    },
    WaitingRoomRequest,
    GameRoomRequest,
    ReconnectedManuscript {
        identity: PlayerIdentity,
        records: Vec<CardPlacementRecord>,
    },
}

/// Fieldless mirror of [`Payload`] for logging, metrics and matching in
/// tests.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum MessageKind {
    LoginRequest,
    LoginReply,
    Ping,
    PlayersNumberRequest,
    PlayersNumberReply,
    ColorRequest,
    ColorResponse,
    SecretStartingRequest,
    SecretStartingResponse,
    PlaceCardRequest,
    PlaceCardResponse,
    DrawCardRequest,
    DrawCardResponse,
    PlayerInformation,
    CommonTargetCard,
    HandsResponseCard,
    DisplayDecks,
    ScoreBoard,
    PlayersList,
    FinalScoreBoard,
    ChatMessage,
    ErrorMessage,
    GenericMessage,
    WaitingRoomRequest,
    GameRoomRequest,
    ReconnectedManuscript,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::LoginRequest => "LOGIN_REQUEST",
            Self::LoginReply => "LOGIN_REPLY",
            Self::Ping => "PING",
            Self::PlayersNumberRequest => "PLAYERS_NUMBER_REQUEST",
            Self::PlayersNumberReply => "PLAYERS_NUMBER_REPLY",
            Self::ColorRequest => "COLOR_REQUEST",
            Self::ColorResponse => "COLOR_RESPONSE",
            Self::SecretStartingRequest => "SECRET_STARTING_REQUEST",
            Self::SecretStartingResponse => "SECRET_STARTING_RESPONSE",
            Self::PlaceCardRequest => "PLACE_CARD_REQUEST",
            Self::PlaceCardResponse => "PLACE_CARD_RESPONSE",
            Self::DrawCardRequest => "DRAW_CARD_REQUEST",
            Self::DrawCardResponse => "DRAW_CARD_RESPONSE",
            Self::PlayerInformation => "PLAYER_INFORMATION",
            Self::CommonTargetCard => "COMMON_TARGET_CARD",
            Self::HandsResponseCard => "HANDS_RESPONSE_CARD",
            Self::DisplayDecks => "DISPLAY_DECKS",
            Self::ScoreBoard => "SCORE_BOARD",
            Self::PlayersList => "PLAYERS_LIST",
            Self::FinalScoreBoard => "FINAL_SCORE_BOARD",
            Self::ChatMessage => "CHAT_MESSAGE",
            Self::ErrorMessage => "ERROR_MESSAGE",
            Self::GenericMessage => "GENERIC_MESSAGE",
            Self::WaitingRoomRequest => "WAITING_ROOM_REQUEST",
            Self::GameRoomRequest => "GAME_ROOM_REQUEST",
            Self::ReconnectedManuscript => "RECONNECTED_MANUSCRIPT_MESSAGE",
        };
        write!(f, "{repr}")
    }
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::LoginRequest => MessageKind::LoginRequest,
            Self::LoginReply { .. } => MessageKind::LoginReply,
            Self::Ping => MessageKind::Ping,
            Self::PlayersNumberRequest => MessageKind::PlayersNumberRequest,
            Self::PlayersNumberReply { .. } => MessageKind::PlayersNumberReply,
            Self::ColorRequest { .. } => MessageKind::ColorRequest,
            Self::ColorResponse { .. } => MessageKind::ColorResponse,
            Self::SecretStartingRequest { .. } => MessageKind::SecretStartingRequest,
            Self::SecretStartingResponse { .. } => MessageKind::SecretStartingResponse,
            Self::PlaceCardRequest => MessageKind::PlaceCardRequest,
            Self::PlaceCardResponse { .. } => MessageKind::PlaceCardResponse,
            Self::DrawCardRequest => MessageKind::DrawCardRequest,
            Self::DrawCardResponse { .. } => MessageKind::DrawCardResponse,
            Self::PlayerInformation { .. } => MessageKind::PlayerInformation,
            Self::CommonTargetCard { .. } => MessageKind::CommonTargetCard,
            Self::HandsResponseCard { .. } => MessageKind::HandsResponseCard,
            Self::DisplayDecks { .. } => MessageKind::DisplayDecks,
            Self::ScoreBoard { .. } => MessageKind::ScoreBoard,
            Self::PlayersList { .. } => MessageKind::PlayersList,
            Self::FinalScoreBoard { .. } => MessageKind::FinalScoreBoard,
            Self::ChatMessage { .. } => MessageKind::ChatMessage,
            Self::ErrorMessage { .. } => MessageKind::ErrorMessage,
            Self::GenericMessage { .. } => MessageKind::GenericMessage,
            Self::WaitingRoomRequest => MessageKind::WaitingRoomRequest,
            Self::GameRoomRequest => MessageKind::GameRoomRequest,
            Self::ReconnectedManuscript { .. } => MessageKind::ReconnectedManuscript,
        }
    }
}

/// The envelope every transport carries.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Message {
    /// Claimed identity of the sender. After login, messages are
    /// attributed by connection, and any message whose sender differs
    /// from that connection's identity is dropped.
    pub sender: String,
    pub payload: Payload,
}

impl Message {
    pub fn new(sender: impl Into<String>, payload: Payload) -> Self {
        Self {
            sender: sender.into(),
            payload,
        }
    }

    pub fn from_server(payload: Payload) -> Self {
        Self::new(SERVER_NAME, payload)
    }

    pub fn ping(sender: impl Into<String>) -> Self {
        Self::new(sender, Payload::Ping)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::from_server(Payload::ErrorMessage { text: text.into() })
    }

    pub fn generic(text: impl Into<String>) -> Self {
        Self::from_server(Payload::GenericMessage { text: text.into() })
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn is_ping(&self) -> bool {
        matches!(self.payload, Payload::Ping)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.kind(), self.sender)
    }
}

/// A call on the named remote object. Each call is one JSON document,
/// tagged by method name.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RemoteCall {
    /// Login entry point. The peer handle is the socket the call arrived on.
    JoinClient { identity: String },
    SendToServer { message: Message },
    SendToClient { message: Message },
}

impl RemoteCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::JoinClient { .. } => "join_client",
            Self::SendToServer { .. } => "send_to_server",
            Self::SendToClient { .. } => "send_to_client",
        }
    }

    /// # Errors
    ///
    /// Returns an error if the call can't be serialized.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// # Errors
    ///
    /// Returns an error if `text` isn't a well-formed call.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
