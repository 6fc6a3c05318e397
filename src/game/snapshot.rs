//! Snapshot building for join payloads and match results

use crate::ws::protocol::{FinalScore, GameStateSnapshot};

use super::pickups::PickupBoard;
use super::player::Player;
use super::registry::PlayerRegistry;

/// Builds the wire views of match state
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Full state sent to a client when it joins
    pub fn game_state(
        registry: &PlayerRegistry,
        pickups: &PickupBoard,
        game_active: bool,
        game_time: u32,
    ) -> GameStateSnapshot {
        GameStateSnapshot {
            players: Self::players(registry),
            health_packs: pickups.health_packs().to_vec(),
            special_weapon: pickups.special_weapon().clone(),
            game_active,
            game_time,
        }
    }

    /// All players in join order
    pub fn players(registry: &PlayerRegistry) -> Vec<Player> {
        registry.ordered().into_iter().cloned().collect()
    }

    pub fn final_scores(registry: &PlayerRegistry) -> Vec<FinalScore> {
        registry
            .ordered()
            .into_iter()
            .map(|p| FinalScore {
                id: p.id,
                name: p.name.clone(),
                score: p.score,
            })
            .collect()
    }

    /// Highest score wins; on a tie the earliest joiner keeps the lead
    pub fn winner(registry: &PlayerRegistry) -> Option<Player> {
        registry
            .ordered()
            .into_iter()
            .fold(None::<&Player>, |best, p| match best {
                Some(b) if b.score >= p.score => Some(b),
                _ => Some(p),
            })
            .cloned()
    }
}
