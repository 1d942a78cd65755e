//! Match configuration.

use serde::{Deserialize, Serialize};

use crate::game::entities::Color;

/// Score that starts the last lap.
pub const DEFAULT_WINNING_THRESHOLD: u32 = 20;

pub const DEFAULT_MIN_PLAYERS: usize = 2;

/// One player per color.
pub const DEFAULT_MAX_PLAYERS: usize = Color::ALL.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Sudden-death score
    pub winning_threshold: u32,

    /// Smallest target player count the host may pick
    pub min_players: usize,

    /// Largest target player count the host may pick
    pub max_players: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            winning_threshold: DEFAULT_WINNING_THRESHOLD,
            min_players: DEFAULT_MIN_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }
}

impl MatchConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.winning_threshold == 0 {
            return Err("Winning threshold must be greater than 0".to_string());
        }

        if self.min_players < DEFAULT_MIN_PLAYERS {
            return Err(format!("A match needs at least {DEFAULT_MIN_PLAYERS} players"));
        }

        if self.max_players < self.min_players {
            return Err("Max players must be at least min players".to_string());
        }

        if self.max_players > DEFAULT_MAX_PLAYERS {
            return Err(format!(
                "There are only {DEFAULT_MAX_PLAYERS} colors, so at most {DEFAULT_MAX_PLAYERS} players"
            ));
        }

        Ok(())
    }

    /// Whether the host may pick `count` with `admitted` players already in.
    pub fn accepts_target(&self, count: usize, admitted: usize) -> bool {
        count >= self.min_players.max(admitted) && count <= self.max_players
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let base = MatchConfig::default();
        assert!(MatchConfig { winning_threshold: 0, ..base }.validate().is_err());
        assert!(MatchConfig { min_players: 1, ..base }.validate().is_err());
        assert!(MatchConfig { min_players: 3, max_players: 2, ..base }.validate().is_err());
        assert!(MatchConfig { max_players: 5, ..base }.validate().is_err());
    }

    #[test]
    fn test_target_bounds_respect_admitted_players() {
        let config = MatchConfig::default();
        assert!(config.accepts_target(2, 1));
        assert!(!config.accepts_target(2, 3));
        assert!(config.accepts_target(3, 3));
        assert!(!config.accepts_target(1, 0));
        assert!(!config.accepts_target(5, 0));
    }
}
