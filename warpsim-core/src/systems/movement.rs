//! Ship movement and arrival handling.
//!
//! Position updates are pure per-ship work and run in parallel; arrivals
//! mutate shared state and are applied sequentially in ship id order.

use crate::fixed::Fixed;
use crate::state::{GalaxyState, PlanetId, ShipId, ShipOrder};
use rayon::prelude::*;
use tracing::instrument;

/// Result of advancing one ship for a tick.
struct MoveResult {
    ship: ShipId,
    x: Fixed,
    y: Fixed,
    arrived_at: Option<PlanetId>,
    /// Target no longer exists; order falls back to Hold for this tick.
    target_lost: bool,
}

/// Advance one ship toward its destination (pure function).
fn advance_ship(
    ship: &crate::state::ShipState,
    destination: Option<(PlanetId, Fixed, Fixed)>,
) -> MoveResult {
    let Some((planet_id, tx, ty)) = destination else {
        return MoveResult {
            ship: ship.id,
            x: ship.x,
            y: ship.y,
            arrived_at: None,
            target_lost: true,
        };
    };

    let dx = tx - ship.x;
    let dy = ty - ship.y;
    // Chebyshev distance keeps the arithmetic integer-only; ranges are
    // coarse enough that the difference from Euclidean never matters.
    let distance = dx.abs().max(dy.abs());

    if distance <= ship.speed {
        return MoveResult {
            ship: ship.id,
            x: tx,
            y: ty,
            arrived_at: Some(planet_id),
            target_lost: false,
        };
    }

    let step_x = dx.mul(ship.speed).div(distance);
    let step_y = dy.mul(ship.speed).div(distance);
    MoveResult {
        ship: ship.id,
        x: ship.x + step_x,
        y: ship.y + step_y,
        arrived_at: None,
        target_lost: false,
    }
}

/// Runs movement for all ships with travel orders.
///
/// A destination that vanished from the store is not an error: the ship
/// holds position for the tick and the order is cleared. A destination
/// whose owner changed mid-transit is no concern of the drive system; the
/// ship keeps flying.
#[instrument(skip_all, name = "movement")]
pub fn run_movement_tick(state: &mut GalaxyState) {
    // PHASE 1: Extract moving ships and their destinations
    let moving: Vec<_> = state
        .ships
        .values()
        .filter_map(|ship| {
            let dest_planet = match ship.order {
                ShipOrder::Attack(target) => state
                    .ships
                    .get(&target)
                    .and_then(|t| t.orbiting.or_else(|| nearest_planet(state, t.x, t.y))),
                other => other.destination(),
            }?;
            if ship.orbiting == Some(dest_planet) {
                return None; // Already there
            }
            let dest = state
                .planets
                .get(&dest_planet)
                .map(|p| (dest_planet, p.x, p.y));
            Some((ship.clone(), dest))
        })
        .collect();

    // PHASE 2: Advance positions in parallel
    let results: Vec<MoveResult> = {
        let _span = tracing::info_span!("ships_parallel", count = moving.len()).entered();
        moving
            .into_par_iter()
            .map(|(ship, dest)| advance_ship(&ship, dest))
            .collect()
    };

    // PHASE 3: Apply sequentially in ship id order
    let mut results = results;
    results.sort_unstable_by_key(|r| r.ship);

    for result in results {
        let Some(ship) = state.ships.get_mut(&result.ship) else {
            continue;
        };
        if result.target_lost {
            log::warn!(
                "ship {} lost its destination; holding position this tick",
                result.ship
            );
            ship.order = ShipOrder::Hold;
            continue;
        }
        ship.x = result.x;
        ship.y = result.y;
        ship.orbiting = None;
        if let Some(planet_id) = result.arrived_at {
            handle_arrival(state, result.ship, planet_id);
        }
    }
}

/// Order-specific arrival handling.
fn handle_arrival(state: &mut GalaxyState, ship_id: ShipId, planet_id: PlanetId) {
    let Some(ship) = state.ships.get_mut(&ship_id) else {
        return;
    };
    ship.orbiting = Some(planet_id);

    let order = ship.order;
    let owner = ship.owner;
    if let Some(owner) = owner {
        if let Some(player) = state.players.get_mut(&owner) {
            player.planets_seen.insert(planet_id);
        }
    }

    match order {
        ShipOrder::Colonize(target) if target == planet_id => {
            try_colonize(state, ship_id, planet_id);
        }
        ShipOrder::Invade(target) if target == planet_id => {
            try_invade(state, ship_id, planet_id);
        }
        ShipOrder::MoveTo(target) if target == planet_id => {
            if let Some(ship) = state.ships.get_mut(&ship_id) {
                ship.order = ShipOrder::Hold;
            }
        }
        // Defend and Attack orders persist after arrival
        _ => {}
    }
}

/// Settle an unowned planet. The colony ship is consumed.
fn try_colonize(state: &mut GalaxyState, ship_id: ShipId, planet_id: PlanetId) {
    let (owner, can) = state
        .ships
        .get(&ship_id)
        .map(|s| (s.owner, s.class.can_colonize()))
        .unwrap_or((None, false));
    let Some(owner) = owner else { return };
    if !can {
        log::warn!("ship {ship_id} cannot colonize; holding");
        if let Some(ship) = state.ships.get_mut(&ship_id) {
            ship.order = ShipOrder::Hold;
        }
        return;
    }
    let unowned = state
        .planets
        .get(&planet_id)
        .map(|p| p.owner.is_none())
        .unwrap_or(false);
    if !unowned {
        // Someone beat us here; the colonists stay aboard
        log::debug!("planet {planet_id} no longer unowned; colonization aborted");
        if let Some(ship) = state.ships.get_mut(&ship_id) {
            ship.order = ShipOrder::Hold;
        }
        return;
    }

    state.set_planet_owner(planet_id, Some(owner));
    if let Some(planet) = state.planets.get_mut(&planet_id) {
        planet.population = Fixed::from_int(100);
        planet.shipbuilding_level = 0;
        planet.deficit_ticks = 0;
    }
    state.remove_ship(ship_id);
    log::info!("player {owner} colonized planet {planet_id}");
}

/// Ground assault: succeeds when invasion strength beats the planet's
/// defense rating. The invasion ship is consumed either way.
fn try_invade(state: &mut GalaxyState, ship_id: ShipId, planet_id: PlanetId) {
    let Some(ship) = state.ships.get(&ship_id) else {
        return;
    };
    let Some(attacker) = ship.owner else { return };
    if !ship.class.can_invade() {
        log::warn!("ship {ship_id} cannot invade; holding");
        if let Some(ship) = state.ships.get_mut(&ship_id) {
            ship.order = ShipOrder::Hold;
        }
        return;
    }
    let strength = ship.invasion_strength();

    let Some(planet) = state.planets.get(&planet_id) else {
        return;
    };
    match planet.owner {
        Some(defender) if defender != attacker => {
            if strength > planet.defense_rating() {
                state.set_planet_owner(planet_id, Some(attacker));
                if let Some(planet) = state.planets.get_mut(&planet_id) {
                    planet.population = planet.population.mul(Fixed::HALF);
                    planet.deficit_ticks = 0;
                }
                log::info!(
                    "player {attacker} invaded planet {planet_id} held by player {defender}"
                );
            } else {
                log::info!("invasion of planet {planet_id} repelled");
            }
            state.remove_ship(ship_id);
        }
        _ => {
            // Own or unowned planet: nothing to invade
            if let Some(ship) = state.ships.get_mut(&ship_id) {
                ship.order = ShipOrder::Hold;
            }
        }
    }
}

/// Closest planet to a point, by Chebyshev distance, lowest id on ties.
fn nearest_planet(state: &GalaxyState, x: Fixed, y: Fixed) -> Option<PlanetId> {
    state
        .sorted_planet_ids()
        .into_iter()
        .min_by_key(|id| {
            let p = &state.planets[id];
            (p.x - x).abs().max((p.y - y).abs()).raw()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ShipClass;
    use crate::testing::GalaxyStateBuilder;

    fn two_planet_world() -> GalaxyState {
        GalaxyStateBuilder::new()
            .with_player(0)
            .with_player(1)
            .with_planet(0, Some(0))
            .with_planet(5, None)
            .build()
    }

    #[test]
    fn test_ship_advances_toward_destination() {
        let mut state = two_planet_world();
        let ship = state.spawn_ship(0, ShipClass::Scout, 0);
        state.ships.get_mut(&ship).unwrap().order = ShipOrder::MoveTo(5);

        run_movement_tick(&mut state);

        let s = &state.ships[&ship];
        // Planet 5 sits at x=50; a scout covers 8 per tick
        assert_eq!(s.x, Fixed::from_int(8));
        assert_eq!(s.orbiting, None);
    }

    #[test]
    fn test_ship_arrives_and_holds() {
        let mut state = two_planet_world();
        let ship = state.spawn_ship(0, ShipClass::Scout, 0);
        state.ships.get_mut(&ship).unwrap().order = ShipOrder::MoveTo(5);

        for _ in 0..10 {
            run_movement_tick(&mut state);
        }

        let s = &state.ships[&ship];
        assert_eq!(s.orbiting, Some(5));
        assert_eq!(s.order, ShipOrder::Hold);
        assert!(state.players[&0].planets_seen.contains(&5));
    }

    #[test]
    fn test_transit_survives_owner_change() {
        let mut state = two_planet_world();
        let ship = state.spawn_ship(0, ShipClass::Scout, 0);
        state.ships.get_mut(&ship).unwrap().order = ShipOrder::MoveTo(5);

        run_movement_tick(&mut state);
        // Destination changes hands mid-flight
        state.set_planet_owner(5, Some(1));
        run_movement_tick(&mut state);

        let s = &state.ships[&ship];
        assert_eq!(s.order, ShipOrder::MoveTo(5));
        assert!(s.x > Fixed::from_int(8));
    }

    #[test]
    fn test_lost_destination_falls_back_to_hold() {
        let mut state = two_planet_world();
        let ship = state.spawn_ship(0, ShipClass::Scout, 0);
        state.ships.get_mut(&ship).unwrap().order = ShipOrder::MoveTo(99);

        run_movement_tick(&mut state);

        let s = &state.ships[&ship];
        assert_eq!(s.order, ShipOrder::Hold);
        // Never moved
        assert_eq!(s.x, Fixed::ZERO);
    }

    #[test]
    fn test_colonization_consumes_freighter() {
        let mut state = two_planet_world();
        let ship = state.spawn_ship(0, ShipClass::Freighter, 0);
        state.ships.get_mut(&ship).unwrap().order = ShipOrder::Colonize(5);

        for _ in 0..20 {
            run_movement_tick(&mut state);
        }

        assert_eq!(state.planets[&5].owner, Some(0));
        assert_eq!(state.planets[&5].population, Fixed::from_int(100));
        assert!(!state.ships.contains_key(&ship));
    }

    #[test]
    fn test_colonization_aborts_if_planet_taken() {
        let mut state = two_planet_world();
        let ship = state.spawn_ship(0, ShipClass::Freighter, 0);
        state.ships.get_mut(&ship).unwrap().order = ShipOrder::Colonize(5);
        state.set_planet_owner(5, Some(1));

        for _ in 0..20 {
            run_movement_tick(&mut state);
        }

        // Planet keeps its owner; the freighter survives in orbit
        assert_eq!(state.planets[&5].owner, Some(1));
        let s = &state.ships[&ship];
        assert_eq!(s.orbiting, Some(5));
        assert_eq!(s.order, ShipOrder::Hold);
    }

    #[test]
    fn test_invasion_beats_weak_defense() {
        let mut state = two_planet_world();
        state.set_planet_owner(5, Some(1));
        state.planets.get_mut(&5).unwrap().population = Fixed::from_int(400);
        let ship = state.spawn_ship(0, ShipClass::Invasion, 0);
        state.ships.get_mut(&ship).unwrap().order = ShipOrder::Invade(5);

        for _ in 0..30 {
            run_movement_tick(&mut state);
        }

        assert_eq!(state.planets[&5].owner, Some(0));
        assert_eq!(state.planets[&5].population, Fixed::from_int(200));
        assert!(!state.ships.contains_key(&ship));
    }

    #[test]
    fn test_invasion_repelled_by_strong_defense() {
        let mut state = two_planet_world();
        state.set_planet_owner(5, Some(1));
        state.planets.get_mut(&5).unwrap().defense_level = 100;
        let ship = state.spawn_ship(0, ShipClass::Invasion, 0);
        state.ships.get_mut(&ship).unwrap().order = ShipOrder::Invade(5);

        for _ in 0..30 {
            run_movement_tick(&mut state);
        }

        assert_eq!(state.planets[&5].owner, Some(1));
        assert!(!state.ships.contains_key(&ship));
    }
}
