//! Victory evaluation.

use crate::config::SimConfig;
use crate::fixed::Fixed;
use crate::state::{GalaxyState, PlayerId};

/// Check whether any player has won.
///
/// Two routes: every rival is eliminated, or one player holds the
/// configured share of all colonized planets. Evaluated in player id order
/// so simultaneous qualification resolves to the lowest id.
pub fn evaluate_victory(state: &GalaxyState, config: &SimConfig) -> Option<PlayerId> {
    let alive: Vec<PlayerId> = state
        .sorted_player_ids()
        .into_iter()
        .filter(|id| state.players.get(id).map(|p| !p.eliminated).unwrap_or(false))
        .collect();

    if alive.len() == 1 {
        return Some(alive[0]);
    }

    let colonized = state
        .planets
        .values()
        .filter(|p| p.owner.is_some())
        .count() as i64;
    if colonized == 0 {
        return None;
    }

    for &id in &alive {
        let owned = state.players[&id].planets_owned.len() as i64;
        let share = Fixed::from_int(owned).div(Fixed::from_int(colonized));
        if share >= config.victory_planet_share {
            return Some(id);
        }
    }
    None
}
