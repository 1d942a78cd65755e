//! Match model - state machine, entities and the rules seam.
//!
//! This module provides the game-facing half of the server:
//! - Player identities, cards, cells and placement records
//! - The match state machine (lobby, play, draw, last lap, ending)
//! - Pure turn-order and ranking helpers
//! - The [`rules::RulesEngine`] trait and a reference implementation

pub mod entities;
pub mod functional;
pub mod rules;
pub mod standard;
pub mod state_machine;

pub use rules::{RuleError, RulesEngine};
pub use standard::StandardRules;
pub use state_machine::{MatchState, Phase, PlacementOutcome, TurnAdvance};
