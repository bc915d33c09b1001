//! Initial galaxy generation.
//!
//! Produces the starting state for a campaign: scattered planets, one
//! homeworld per empire, a shared technology tree and a scout plus colony
//! ship in every home orbit. Generation draws from its own seeded RNG so a
//! given seed always produces the same galaxy.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use warpsim_core::state::{GalaxyState, PlanetState, PlayerState, ShipClass, TechCategory, Technology};
use warpsim_core::Fixed;

/// The technology tree every empire starts with.
const TECH_TREE: &[(&str, TechCategory, i64, [i64; 2])] = &[
    ("Particle Weapons", TechCategory::Military, 80, [2, 0]),
    ("Deflector Shields", TechCategory::Military, 80, [0, 2]),
    ("Deep Core Mining", TechCategory::Economy, 60, [2, 0]),
    ("Fusion Plants", TechCategory::Economy, 60, [0, 2]),
    ("Computing", TechCategory::Science, 100, [1, 0]),
];

const GALAXY_SPAN: i64 = 400;

/// Generate a fresh galaxy.
pub fn generate_galaxy(seed: u64, players: u32, planets: u32) -> Result<GalaxyState> {
    if players < 2 {
        bail!("a campaign needs at least 2 players, got {players}");
    }
    if planets < players {
        bail!("need at least one planet per player, got {planets} for {players}");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = GalaxyState::with_seed(seed);

    for id in 0..players {
        let mut player = PlayerState::new(id, empire_name(id));
        player.temperature_preference = Fixed::from_int(rng.gen_range(-10..40));
        player.gravity_preference = Fixed::from_f32(rng.gen_range(0.6..1.6));
        player.funds = Fixed::from_int(1_000);
        player.metal = Fixed::from_int(500);
        player.energy = Fixed::from_int(200);
        for (tech_id, (name, category, cost, effects)) in TECH_TREE.iter().enumerate() {
            player.technologies.insert(
                tech_id as u32,
                Technology {
                    id: tech_id as u32,
                    name: (*name).to_string(),
                    category: *category,
                    level: 0,
                    cost_to_upgrade: Fixed::from_int(*cost),
                    progress: Fixed::ZERO,
                    effects: effects.iter().map(|&e| Fixed::from_int(e)).collect(),
                },
            );
            player
                .research_priorities
                .insert(tech_id as u32, Fixed::ONE);
        }
        state.players.insert(id, player);
    }

    for _ in 0..planets {
        let mut planet = PlanetState::new(
            0, // Assigned by the store
            Fixed::from_int(rng.gen_range(-GALAXY_SPAN..GALAXY_SPAN)),
            Fixed::from_int(rng.gen_range(-GALAXY_SPAN..GALAXY_SPAN)),
            Fixed::from_int(rng.gen_range(-50..80)),
            Fixed::from_f32(rng.gen_range(0.3..2.5)),
        );
        planet.metal = Fixed::from_int(rng.gen_range(100..800));
        state.add_planet(planet);
    }

    // Each empire gets the unowned planet best suited to it as a homeworld
    for player_id in state.sorted_player_ids() {
        let (temp_pref, grav_pref) = {
            let p = &state.players[&player_id];
            (p.temperature_preference, p.gravity_preference)
        };
        let home = state
            .sorted_planet_ids()
            .into_iter()
            .filter(|id| state.planets[id].owner.is_none())
            .max_by_key(|id| {
                let p = &state.planets[id];
                (p.suitability(temp_pref, grav_pref).raw(), !p.id)
            })
            .expect("planets >= players leaves a free homeworld");

        state.set_planet_owner(home, Some(player_id));
        {
            let planet = state.planets.get_mut(&home).expect("homeworld exists");
            planet.population = Fixed::from_int(1_000);
            planet.metal = Fixed::from_int(500);
            planet.shipbuilding_level = 1;
            // A balanced starting allocation
            planet.allocation = [
                Fixed::from_f32(0.1),
                Fixed::from_f32(0.1),
                Fixed::from_f32(0.1),
                Fixed::from_f32(0.3),
                Fixed::from_f32(0.2),
            ];
        }
        state.spawn_ship(player_id, ShipClass::Scout, home);
        state.spawn_ship(player_id, ShipClass::Freighter, home);
    }

    Ok(state)
}

fn empire_name(id: u32) -> String {
    const NAMES: &[&str] = &[
        "Altair Combine",
        "Vega Ascendancy",
        "Procyon League",
        "Deneb Compact",
        "Rigel Dominion",
        "Sirius Concord",
        "Antares Pact",
        "Polaris Union",
    ];
    NAMES
        .get(id as usize)
        .map(|n| (*n).to_string())
        .unwrap_or_else(|| format!("Empire {id}"))
}
