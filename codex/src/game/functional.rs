//! Pure helpers for turn order, suspension and standings.
//!
//! Nothing in here touches sessions or connections; callers pass in the
//! online predicate so the same functions back both the coordinator and
//! its tests.

use super::{
    entities::{CardPlacementRecord, LeaderboardEntry, PlayerIdentity, ScoreEntry},
    state_machine::Phase,
};

/// Find the seat that plays after `active`, scanning the roster circularly
/// and skipping offline players. The active seat itself is the last seat
/// considered, so a lone online player keeps the turn.
///
/// Returns `None` when the roster is empty or nobody is online.
pub fn next_player<T>(players: &[T], active: usize, is_online: impl Fn(&T) -> bool) -> Option<usize> {
    let len = players.len();
    if len == 0 {
        return None;
    }
    (1..=len)
        .map(|step| (active + step) % len)
        .find(|&seat| is_online(&players[seat]))
}

/// Seats passed over when the turn moves from `active` to `next`,
/// `next` included.
pub fn seats_between(len: usize, active: usize, next: usize) -> impl Iterator<Item = usize> {
    let steps = if len == 0 {
        0
    } else {
        match (next + len - active % len) % len {
            0 => len,
            steps => steps,
        }
    };
    (1..=steps).map(move |step| (active + step) % len)
}

/// A match is suspended exactly when one player is left online after
/// the lobby has closed.
pub fn should_suspend(phase: Phase, online_count: usize) -> bool {
    online_count == 1 && phase != Phase::Lobby
}

/// Records placed by `identity`, in the order they were placed.
pub fn replay_for(history: &[CardPlacementRecord], identity: &PlayerIdentity) -> Vec<CardPlacementRecord> {
    history
        .iter()
        .filter(|record| record.identity == *identity)
        .cloned()
        .collect()
}

/// Sort live scores, highest first. Ties keep roster order.
pub fn rank_scores(mut scores: Vec<ScoreEntry>) -> Vec<ScoreEntry> {
    scores.sort_by(|a, b| b.points.cmp(&a.points));
    scores
}

/// Sort final standings by points and then by completed objectives.
pub fn rank_leaderboard(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.objectives.cmp(&a.objectives))
    });
    entries
}
