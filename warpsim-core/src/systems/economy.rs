//! Planetary economy: production, population growth, ship construction,
//! development investment, upkeep and abandonment.

use crate::config::SimConfig;
use crate::fixed::Fixed;
use crate::state::{DevCategory, GalaxyState, PlanetId, PlayerId, DEV_CATEGORIES};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::instrument;

/// Per-planet production computed in the parallel phase.
struct PlanetProduction {
    planet: PlanetId,
    owner: PlayerId,
    income: [Fixed; DEV_CATEGORIES],
    funds_income: Fixed,
    upkeep: Fixed,
}

/// Calculate one planet's per-category production (pure function).
///
/// income[c] = population × allocation[c] × 0.1 × efficiency(c)
/// Mining and energy efficiency scale with planet development and the
/// owner's economy technology bonuses.
#[instrument(skip_all, name = "planet_production")]
fn calculate_production(
    planet: &crate::state::PlanetState,
    owner: PlayerId,
    mining_bonus: Fixed,
    energy_bonus: Fixed,
    config: &SimConfig,
) -> PlanetProduction {
    let mut income = [Fixed::ZERO; DEV_CATEGORIES];
    for category in DevCategory::ALL {
        let i = category.index();
        let devoted = planet.population.mul(planet.allocation[i]);
        let efficiency = match category {
            DevCategory::Mining => {
                Fixed::ONE
                    + config
                        .mining_efficiency_step
                        .mul(Fixed::from_int(planet.mining_level as i64))
                    + mining_bonus
            }
            DevCategory::Energy => Fixed::ONE + energy_bonus,
            _ => Fixed::ONE,
        };
        income[i] = devoted.mul(Fixed::INCOME_FACTOR).mul(efficiency);
    }

    // Funds come from the population not devoted to any category plus the
    // infrastructure yield.
    let allocated: Fixed = planet.allocation.iter().fold(Fixed::ZERO, |a, &b| a + b);
    let idle = (Fixed::ONE - allocated).max(Fixed::ZERO);
    let funds_income = planet.population.mul(idle).mul(Fixed::INCOME_FACTOR)
        + income[DevCategory::Infrastructure.index()];

    let dev_levels = planet.terraforming_level
        + planet.mining_level
        + planet.shipbuilding_level
        + planet.defense_level;
    let upkeep = config.dev_upkeep.mul(Fixed::from_int(dev_levels as i64));

    PlanetProduction {
        planet: planet.id,
        owner,
        income,
        funds_income,
        upkeep,
    }
}

/// Runs the economy for one tick.
#[instrument(skip_all, name = "economy")]
pub fn run_economy_tick(state: &mut GalaxyState, config: &SimConfig) {
    // PHASE 1: Extract owned-planet data for parallel processing
    let planet_inputs: Vec<_> = state
        .planets
        .values()
        .filter_map(|planet| {
            planet.owner.map(|owner| {
                let (mining_bonus, energy_bonus) = state
                    .players
                    .get(&owner)
                    .map(|p| (p.mining_efficiency, p.energy_efficiency))
                    .unwrap_or((Fixed::ZERO, Fixed::ZERO));
                (planet.clone(), owner, mining_bonus, energy_bonus)
            })
        })
        .collect();

    // PHASE 2: Calculate production in parallel
    let productions: Vec<PlanetProduction> = {
        let _span =
            tracing::info_span!("planets_parallel", count = planet_inputs.len()).entered();
        planet_inputs
            .into_par_iter()
            .map(|(planet, owner, mining_bonus, energy_bonus)| {
                calculate_production(&planet, owner, mining_bonus, energy_bonus, config)
            })
            .collect()
    };

    // PHASE 3: Apply results sequentially, in planet id order
    let mut productions = productions;
    productions.sort_unstable_by_key(|p| p.planet);

    let mut player_funds_delta: FxHashMap<PlayerId, Fixed> = FxHashMap::default();
    let mut player_energy_delta: FxHashMap<PlayerId, Fixed> = FxHashMap::default();
    let mut player_metal_delta: FxHashMap<PlayerId, Fixed> = FxHashMap::default();

    for prod in &productions {
        if let Some(planet) = state.planets.get_mut(&prod.planet) {
            planet.income = prod.income;
            planet.metal += prod.income[DevCategory::Mining.index()];

            // Abandonment bookkeeping: a planet whose net income stays
            // negative is only kept alive by an explicit investment.
            let net = prod.funds_income - prod.upkeep;
            if net < Fixed::ZERO && !planet.rescued_this_tick {
                planet.deficit_ticks += 1;
            } else {
                planet.deficit_ticks = 0;
            }
            planet.rescued_this_tick = false;
        }
        *player_funds_delta.entry(prod.owner).or_insert(Fixed::ZERO) +=
            prod.funds_income - prod.upkeep;
        *player_energy_delta.entry(prod.owner).or_insert(Fixed::ZERO) +=
            prod.income[DevCategory::Energy.index()];
        *player_metal_delta.entry(prod.owner).or_insert(Fixed::ZERO) +=
            prod.income[DevCategory::Mining.index()];
    }

    // Ship upkeep accrues to owners regardless of where the ship is.
    for ship in state.ships.values() {
        if let Some(owner) = ship.owner {
            *player_funds_delta.entry(owner).or_insert(Fixed::ZERO) -=
                ship.class.template().upkeep;
        }
    }

    for player_id in state.sorted_player_ids() {
        let funds = player_funds_delta
            .get(&player_id)
            .copied()
            .unwrap_or(Fixed::ZERO);
        let energy = player_energy_delta
            .get(&player_id)
            .copied()
            .unwrap_or(Fixed::ZERO);
        let metal = player_metal_delta
            .get(&player_id)
            .copied()
            .unwrap_or(Fixed::ZERO);
        if let Some(player) = state.players.get_mut(&player_id) {
            player.funds += funds;
            player.energy = (player.energy + energy).max(Fixed::ZERO);
            player.metal = (player.metal + metal).max(Fixed::ZERO);
            player.gross_income = funds.max(Fixed::ZERO);
        }
    }

    grow_population(state, config);
    process_build_queues(state, config);
    process_abandonment(state, config);
    recompute_aggregates(state);
}

/// Logistic growth: pop += pop × r × (1 − pop/capacity), clamped at zero.
///
/// Capacity scales with terraforming and how well the planet suits its
/// owner's environmental preferences.
fn grow_population(state: &mut GalaxyState, config: &SimConfig) {
    for planet_id in state.sorted_planet_ids() {
        let Some(planet) = state.planets.get(&planet_id) else {
            continue;
        };
        let Some(owner) = planet.owner else { continue };
        let Some(player) = state.players.get(&owner) else {
            continue;
        };

        let suitability =
            planet.suitability(player.temperature_preference, player.gravity_preference);
        let capacity = config
            .base_capacity
            .mul(Fixed::ONE
                + config
                    .capacity_per_terraform
                    .mul(Fixed::from_int(planet.terraforming_level as i64)))
            .mul(suitability.max(Fixed::from_f32(0.05)));

        // Population allocation speeds growth a little
        let pop_bonus = Fixed::ONE
            + planet.allocation[DevCategory::Population.index()].mul(Fixed::HALF);
        let rate = config.growth_rate.mul(pop_bonus);

        let planet = state.planets.get_mut(&planet_id).expect("planet exists");
        let headroom = Fixed::ONE - planet.population.div(capacity.max(Fixed::ONE));
        let delta = planet.population.mul(rate).mul(headroom);
        planet.population = (planet.population + delta).max(Fixed::ZERO);
    }
}

/// Advance yard work on the front build order of each queue.
///
/// Metal was consumed at enqueue time, so completion only spawns the hull.
fn process_build_queues(state: &mut GalaxyState, config: &SimConfig) {
    for planet_id in state.sorted_planet_ids() {
        let (owner, completed) = {
            let Some(planet) = state.planets.get_mut(&planet_id) else {
                continue;
            };
            let Some(owner) = planet.owner else { continue };
            if planet.shipbuilding_level == 0 {
                continue;
            }
            let mut work = config
                .shipyard_rate
                .mul(Fixed::from_int(planet.shipbuilding_level as i64));
            let mut completed = Vec::new();
            while work > Fixed::ZERO {
                let Some(front) = planet.build_queue.front_mut() else {
                    break;
                };
                if front.remaining > work {
                    front.remaining -= work;
                    work = Fixed::ZERO;
                } else {
                    work -= front.remaining;
                    let order = planet.build_queue.pop_front().expect("front exists");
                    completed.push(order.class);
                }
            }
            (owner, completed)
        };
        for class in completed {
            let ship = state.spawn_ship(owner, class, planet_id);
            log::debug!("planet {planet_id} completed {class:?} as ship {ship}");
        }
    }
}

/// Release planets that have run a sustained deficit.
///
/// Orbital ships become unowned and hostile-neutral. Ships already in
/// flight toward the planet keep their orders; retargeting mid-transit is
/// the owner's problem, not the simulation's.
fn process_abandonment(state: &mut GalaxyState, config: &SimConfig) {
    for planet_id in state.sorted_planet_ids() {
        let abandon = state
            .planets
            .get(&planet_id)
            .map(|p| p.owner.is_some() && p.deficit_ticks >= config.abandonment_grace)
            .unwrap_or(false);
        if !abandon {
            continue;
        }

        let old_owner = state.planets[&planet_id].owner;
        log::info!(
            "planet {planet_id} abandoned by player {:?} after sustained deficit",
            old_owner
        );
        state.set_planet_owner(planet_id, None);
        if let Some(planet) = state.planets.get_mut(&planet_id) {
            planet.deficit_ticks = 0;
            planet.build_queue.clear();
        }

        // Strand the orbital garrison
        let orbital: Vec<_> = state
            .ships
            .values()
            .filter(|s| s.orbiting == Some(planet_id))
            .map(|s| s.id)
            .collect();
        for ship_id in orbital {
            if let Some(ship) = state.ships.get_mut(&ship_id) {
                let prev_owner = ship.owner.take();
                ship.order = crate::state::ShipOrder::Hold;
                if let Some(owner) = prev_owner {
                    if let Some(player) = state.players.get_mut(&owner) {
                        player.ships_owned.remove(&ship_id);
                    }
                }
            }
        }
    }
}

/// Rebuild per-player aggregates from owned planets. These are derived
/// values; nothing else may treat them as ground truth.
fn recompute_aggregates(state: &mut GalaxyState) {
    for player_id in state.sorted_player_ids() {
        let Some(player) = state.players.get(&player_id) else {
            continue;
        };
        let mut total_pop = Fixed::ZERO;
        for planet_id in &player.planets_owned {
            if let Some(planet) = state.planets.get(planet_id) {
                total_pop += planet.population;
            }
        }
        let eliminated = player.planets_owned.is_empty() && player.ships_owned.is_empty();
        let player = state.players.get_mut(&player_id).expect("player exists");
        player.total_population = total_pop;
        if eliminated && !player.eliminated {
            log::info!("player {player_id} eliminated");
            player.eliminated = true;
        }
    }
}
