//! Espionage and sabotage missions.
//!
//! A mission is a timed record resolved exactly once at expiry. Success
//! probability is skill against the target's defense; the draw comes from
//! the state's deterministic RNG stream, so a replay with the same seed
//! resolves every mission the same way.

use crate::fixed::Fixed;
use crate::state::{GalaxyState, Mission, MissionId, MissionKind, PlanetId, PlayerId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::instrument;

/// Relationship damage when a mission is discovered.
const DISCOVERY_RELATION_PENALTY: i32 = -25;

/// Fraction of target stock a successful resource theft takes.
const THEFT_FRACTION: Fixed = Fixed::from_raw(1000); // 0.1

/// Funds fine when a failed mission costs the initiator directly.
const FAILURE_FINE: Fixed = Fixed::from_raw(500_000); // 50

/// Default mission flight time in ticks.
pub const MISSION_DURATION: u32 = 3;

/// Launch a new mission. Skill scales with the initiator's best military
/// technology; defense with the target's planetary defenses.
pub fn launch_mission(
    state: &mut GalaxyState,
    initiator: PlayerId,
    target: PlayerId,
    kind: MissionKind,
) -> MissionId {
    let skill = state
        .players
        .get(&initiator)
        .map(|p| {
            let best_level = p
                .technologies
                .values()
                .map(|t| t.level)
                .max()
                .unwrap_or(0);
            Fixed::from_int(10 + best_level as i64)
        })
        .unwrap_or(Fixed::from_int(10));

    let id = state.next_mission_id;
    state.next_mission_id += 1;
    state.missions.insert(
        id,
        Mission {
            id,
            kind,
            initiator,
            target,
            elapsed: 0,
            duration: MISSION_DURATION,
            skill,
        },
    );
    log::debug!("player {initiator} launched {kind:?} mission {id} against player {target}");
    id
}

/// Advance all missions one tick and resolve the expired ones in id order.
#[instrument(skip_all, name = "espionage")]
pub fn run_espionage_tick(state: &mut GalaxyState) {
    let mut expired = Vec::new();
    for id in state.sorted_mission_ids() {
        let mission = state.missions.get_mut(&id).expect("mission exists");
        mission.elapsed += 1;
        if mission.elapsed >= mission.duration {
            expired.push(id);
        }
    }

    for id in expired {
        let Some(mission) = state.missions.remove(&id) else {
            continue;
        };
        resolve_mission(state, &mission);
    }
}

/// Resolve one mission: p(success) = skill / (skill + target defense).
fn resolve_mission(state: &mut GalaxyState, mission: &Mission) {
    let defense = target_defense(state, mission.target);
    let p = mission.skill.div(mission.skill + defense);

    let mut rng = StdRng::seed_from_u64(state.draw_rng());
    let roll = Fixed::from_raw(rng.gen_range(0..Fixed::SCALE));

    if roll < p {
        apply_mission_success(state, mission);
    } else {
        apply_mission_failure(state, mission, &mut rng);
    }
}

/// Target's counter-espionage: the summed defense ratings of its planets.
fn target_defense(state: &GalaxyState, target: PlayerId) -> Fixed {
    let Some(player) = state.players.get(&target) else {
        return Fixed::ZERO;
    };
    player
        .planets_owned
        .iter()
        .filter_map(|id| state.planets.get(id))
        .fold(Fixed::ZERO, |acc, p| acc + p.defense_rating())
}

fn apply_mission_success(state: &mut GalaxyState, mission: &Mission) {
    log::info!(
        "mission {} ({:?}) by player {} against player {} succeeded",
        mission.id,
        mission.kind,
        mission.initiator,
        mission.target
    );
    match mission.kind {
        MissionKind::StealResources => {
            let (metal, funds) = state
                .players
                .get(&mission.target)
                .map(|t| (t.metal.mul(THEFT_FRACTION), t.funds.mul(THEFT_FRACTION)))
                .unwrap_or((Fixed::ZERO, Fixed::ZERO));
            if let Some(target) = state.players.get_mut(&mission.target) {
                target.metal -= metal;
                target.funds -= funds;
            }
            if let Some(initiator) = state.players.get_mut(&mission.initiator) {
                initiator.metal += metal;
                initiator.funds += funds;
            }
        }
        MissionKind::StealTechnology => {
            // Siphon progress from the target's most advanced track into
            // the initiator's matching one.
            let stolen = state.players.get(&mission.target).and_then(|t| {
                t.technologies
                    .values()
                    .max_by_key(|tech| (tech.level, tech.id))
                    .map(|tech| (tech.id, tech.progress.mul(Fixed::HALF)))
            });
            if let Some((tech_id, amount)) = stolen {
                if let Some(target) = state.players.get_mut(&mission.target) {
                    if let Some(tech) = target.technologies.get_mut(&tech_id) {
                        tech.progress -= amount;
                    }
                }
                if let Some(initiator) = state.players.get_mut(&mission.initiator) {
                    if let Some(tech) = initiator.technologies.get_mut(&tech_id) {
                        tech.progress += amount;
                    }
                }
            }
        }
        MissionKind::GatherIntel => {
            let revealed: Vec<PlanetId> = state
                .players
                .get(&mission.target)
                .map(|t| t.planets_owned.iter().copied().collect())
                .unwrap_or_default();
            if let Some(initiator) = state.players.get_mut(&mission.initiator) {
                initiator.planets_seen.extend(revealed);
            }
        }
        MissionKind::Sabotage => {
            // Hit the target's most developed planet
            let victim = state
                .players
                .get(&mission.target)
                .map(|t| {
                    t.planets_owned
                        .iter()
                        .filter_map(|id| state.planets.get(id))
                        .max_by_key(|p| {
                            (
                                p.mining_level + p.shipbuilding_level + p.defense_level,
                                p.id,
                            )
                        })
                        .map(|p| p.id)
                })
                .unwrap_or(None);
            if let Some(planet_id) = victim {
                if let Some(planet) = state.planets.get_mut(&planet_id) {
                    planet.mining_level = planet.mining_level.saturating_sub(1);
                    planet.defense_level = planet.defense_level.saturating_sub(1);
                    planet.shipbuilding_level = planet.shipbuilding_level.saturating_sub(1);
                }
            }
        }
    }
}

/// Failure hurts the initiator: a fine, or a diplomatic incident when the
/// operation is traced back.
fn apply_mission_failure(state: &mut GalaxyState, mission: &Mission, rng: &mut StdRng) {
    let discovered = rng.gen_bool(0.5);
    log::info!(
        "mission {} ({:?}) by player {} failed{}",
        mission.id,
        mission.kind,
        mission.initiator,
        if discovered { " and was discovered" } else { "" }
    );
    if discovered {
        state.diplomacy.adjust_relation_oneway(
            mission.target,
            mission.initiator,
            DISCOVERY_RELATION_PENALTY,
        );
        if let Some(initiator) = state.players.get_mut(&mission.initiator) {
            initiator.reputation.add(-5);
        }
    } else if let Some(initiator) = state.players.get_mut(&mission.initiator) {
        initiator.funds -= FAILURE_FINE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GalaxyStateBuilder;

    fn spy_world() -> GalaxyState {
        GalaxyStateBuilder::new()
            .with_player(0)
            .with_player(1)
            .with_planet(0, Some(1))
            .build()
    }

    #[test]
    fn test_mission_resolves_exactly_once_at_expiry() {
        let mut state = spy_world();
        let id = launch_mission(&mut state, 0, 1, MissionKind::GatherIntel);

        for _ in 0..MISSION_DURATION - 1 {
            run_espionage_tick(&mut state);
            assert!(state.missions.contains_key(&id));
        }
        run_espionage_tick(&mut state);
        assert!(!state.missions.contains_key(&id));

        // Nothing left to double-resolve
        run_espionage_tick(&mut state);
        assert!(state.missions.is_empty());
    }

    #[test]
    fn test_resolution_is_seed_deterministic() {
        let run = || {
            let mut state = spy_world();
            launch_mission(&mut state, 0, 1, MissionKind::StealResources);
            for _ in 0..MISSION_DURATION {
                run_espionage_tick(&mut state);
            }
            state.checksum()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_undefended_target_always_loses_intel() {
        // Defense 0 gives p = skill / skill = 1
        let mut state = spy_world();
        launch_mission(&mut state, 0, 1, MissionKind::GatherIntel);
        for _ in 0..MISSION_DURATION {
            run_espionage_tick(&mut state);
        }
        assert!(state.players[&0].planets_seen.contains(&0));
    }

    #[test]
    fn test_resource_theft_conserves_totals() {
        let mut state = spy_world();
        let before: Fixed = state.players[&0].metal + state.players[&1].metal;

        launch_mission(&mut state, 0, 1, MissionKind::StealResources);
        for _ in 0..MISSION_DURATION {
            run_espionage_tick(&mut state);
        }

        let after: Fixed = state.players[&0].metal + state.players[&1].metal;
        assert_eq!(before, after);
    }

    #[test]
    fn test_sabotage_degrades_best_planet() {
        let mut state = spy_world();
        state.planets.get_mut(&0).unwrap().mining_level = 3;

        launch_mission(&mut state, 0, 1, MissionKind::Sabotage);
        for _ in 0..MISSION_DURATION {
            run_espionage_tick(&mut state);
        }

        // Undefended target: sabotage always lands
        assert_eq!(state.planets[&0].mining_level, 2);
    }
}
