//! Random event generation for headless campaigns.
//!
//! The core consumes typed event triggers but never creates them; this is
//! the collaborator that does. Draws come from a dedicated seeded RNG so
//! the event schedule replays with the campaign.

use rand::rngs::StdRng;
use rand::Rng;
use warpsim_core::state::GalaxyState;
use warpsim_core::{EventTrigger, Fixed};

/// Chance per tick of any event firing at all.
const EVENT_CHANCE: f64 = 0.08;

/// Roll for this tick's external events.
pub fn roll_events(rng: &mut StdRng, state: &GalaxyState) -> Vec<EventTrigger> {
    if !rng.gen_bool(EVENT_CHANCE) {
        return Vec::new();
    }

    let planet_ids = state.sorted_planet_ids();
    let player_ids = state.sorted_player_ids();
    if planet_ids.is_empty() || player_ids.is_empty() {
        return Vec::new();
    }

    let event = match rng.gen_range(0..4u32) {
        0 => EventTrigger::NaturalDisaster {
            planet: planet_ids[rng.gen_range(0..planet_ids.len())],
            severity: Fixed::from_f32(rng.gen_range(0.05..0.3)),
        },
        1 => EventTrigger::PirateRaid {
            planet: planet_ids[rng.gen_range(0..planet_ids.len())],
            strength: Fixed::from_int(rng.gen_range(20..120)),
        },
        2 => EventTrigger::TechnologyBreakthrough {
            player: player_ids[rng.gen_range(0..player_ids.len())],
            tech: rng.gen_range(0..5),
            progress: Fixed::from_int(rng.gen_range(20..80)),
        },
        _ => {
            if player_ids.len() < 2 {
                return Vec::new();
            }
            let a = player_ids[rng.gen_range(0..player_ids.len())];
            let b = player_ids[rng.gen_range(0..player_ids.len())];
            if a == b {
                return Vec::new();
            }
            EventTrigger::DiplomaticIncident {
                a,
                b,
                delta: rng.gen_range(-20..20),
            }
        }
    };
    vec![event]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_event_schedule_is_seed_deterministic() {
        let state = crate::loader::generate_galaxy(3, 2, 10).unwrap();
        let roll_all = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50)
                .map(|_| roll_events(&mut rng, &state).len())
                .collect::<Vec<_>>()
        };
        assert_eq!(roll_all(5), roll_all(5));
    }
}
