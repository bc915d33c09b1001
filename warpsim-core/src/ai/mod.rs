//! AI decision-making subsystem.
//!
//! AI players read an observation, score the legal commands and return the
//! ones they want issued. They write into the same order queue a human
//! does; the planner has privileged judgment, never a privileged mutation
//! path. Observation building is read-only, so the scheduler fans it out
//! across AI players in parallel.
//!
//! # Determinism
//!
//! Implementations must be deterministic given the same RNG seed, or
//! replays and lockstep runs diverge.

pub mod planner;

use crate::config::SimConfig;
use crate::fixed::Fixed;
use crate::input::Command;
use crate::state::{
    DevCategory, GalaxyState, MissionKind, PlanetId, PlayerId, ShipClass, ShipId, ShipOrder,
    TechId,
};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};

pub use planner::PlannerAi;

/// Visibility mode for AI and UI filtering.
///
/// Omniscient is the campaign default: every empire reads the full galaxy
/// state, which keeps the planners simple and cheap. Realistic restricts
/// the observation to planets the player has actually seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    /// Fog of war: only seen planets and ships at them.
    Realistic,
    /// See everything (campaign default, observers, testing).
    Omniscient,
}

/// A planet as an observer is allowed to see it.
#[derive(Debug, Clone)]
pub struct PlanetView {
    pub id: PlanetId,
    pub owner: Option<PlayerId>,
    pub population: Fixed,
    pub defense_rating: Fixed,
    pub suitability: Fixed,
    pub mining_level: u32,
    pub shipbuilding_level: u32,
}

/// What one player can see of the galaxy this tick.
#[derive(Debug, Clone)]
pub struct VisibleGalaxyState {
    pub tick: u64,
    pub observer: PlayerId,
    pub funds: Fixed,
    pub metal: Fixed,
    pub war_weariness: i32,
    pub planets: Vec<PlanetView>,
    /// Ids of the observer's idle warships (in orbit, holding).
    pub idle_warships: Vec<ShipId>,
    /// Ids of the observer's idle colony ships.
    pub idle_colonizers: Vec<ShipId>,
    /// Estimated military strength per known player.
    pub known_strength: BTreeMap<PlayerId, Fixed>,
    pub relations: BTreeMap<PlayerId, i32>,
    pub at_war_with: Vec<PlayerId>,
    pub own_strength: Fixed,
}

/// Available commands for a player this tick.
pub type AvailableCommands = Vec<Command>;

/// AI decision-making trait.
///
/// - `visible_state`: what the AI can see (respects the visibility mode)
/// - `available_commands`: legal commands this tick
///
/// Returns the commands to issue. May return empty to pass.
pub trait AiPlayer: Send + Sync {
    fn name(&self) -> &'static str;

    fn decide(
        &mut self,
        visible_state: &VisibleGalaxyState,
        available_commands: &AvailableCommands,
    ) -> Vec<Command>;
}

/// Build one player's observation of the galaxy.
pub fn visible_state(
    state: &GalaxyState,
    observer: PlayerId,
    mode: VisibilityMode,
) -> VisibleGalaxyState {
    let player = state.players.get(&observer);
    let (funds, metal, weariness, temp_pref, grav_pref) = player
        .map(|p| {
            (
                p.funds,
                p.metal,
                p.war_weariness.get(),
                p.temperature_preference,
                p.gravity_preference,
            )
        })
        .unwrap_or((Fixed::ZERO, Fixed::ZERO, 0, Fixed::ZERO, Fixed::ONE));

    let seen: HashSet<PlanetId> = player
        .map(|p| p.planets_seen.iter().copied().collect())
        .unwrap_or_default();

    let mut planets: Vec<PlanetView> = state
        .planets
        .values()
        .filter(|p| match mode {
            VisibilityMode::Omniscient => true,
            VisibilityMode::Realistic => seen.contains(&p.id),
        })
        .map(|p| PlanetView {
            id: p.id,
            owner: p.owner,
            population: p.population,
            defense_rating: p.defense_rating(),
            suitability: p.suitability(temp_pref, grav_pref),
            mining_level: p.mining_level,
            shipbuilding_level: p.shipbuilding_level,
        })
        .collect();
    planets.sort_unstable_by_key(|p| p.id);

    let mut idle_warships = Vec::new();
    let mut idle_colonizers = Vec::new();
    if let Some(p) = player {
        for &ship_id in &p.ships_owned {
            let Some(ship) = state.ships.get(&ship_id) else {
                continue;
            };
            if ship.order != ShipOrder::Hold || ship.orbiting.is_none() {
                continue;
            }
            if ship.class.can_colonize() {
                idle_colonizers.push(ship_id);
            } else if ship.attack > Fixed::ZERO || ship.class.can_invade() {
                idle_warships.push(ship_id);
            }
        }
    }

    let mut known_strength = BTreeMap::new();
    let mut relations = BTreeMap::new();
    for other_id in state.sorted_player_ids() {
        if other_id == observer {
            continue;
        }
        if let Some(other) = state.players.get(&other_id) {
            known_strength.insert(other_id, other.military_strength(&state.ships));
        }
        relations.insert(other_id, state.diplomacy.relation(observer, other_id));
    }

    VisibleGalaxyState {
        tick: state.tick,
        observer,
        funds,
        metal,
        war_weariness: weariness,
        planets,
        idle_warships,
        idle_colonizers,
        known_strength,
        relations,
        at_war_with: state.diplomacy.wars_of(observer),
        own_strength: player
            .map(|p| p.military_strength(&state.ships))
            .unwrap_or(Fixed::ZERO),
    }
}

/// Enumerate the legal commands for a player this tick.
///
/// Keeps the action space bounded: one candidate per planet and concern
/// rather than every conceivable parameterization.
pub fn available_commands(
    state: &GalaxyState,
    player_id: PlayerId,
    config: &SimConfig,
) -> AvailableCommands {
    let mut commands = Vec::new();
    let Some(player) = state.players.get(&player_id) else {
        return commands;
    };

    for &planet_id in &player.planets_owned {
        let Some(planet) = state.planets.get(&planet_id) else {
            continue;
        };
        // One investment candidate per affordable category
        for category in DevCategory::ALL {
            let level = match category {
                DevCategory::Population => 0,
                DevCategory::Infrastructure => planet.shipbuilding_level,
                DevCategory::Defense => planet.defense_level,
                DevCategory::Mining => planet.mining_level,
                DevCategory::Energy => planet.terraforming_level,
            };
            let cost = config
                .invest_base_cost
                .mul(Fixed::ONE + Fixed::HALF.mul(Fixed::from_int(level as i64)));
            if planet.metal >= cost {
                commands.push(Command::Invest {
                    planet: planet_id,
                    category,
                    amount: cost,
                });
            }
        }
        if planet.shipbuilding_level > 0 && planet.build_queue.len() < 2 {
            for class in ShipClass::ALL {
                if planet.metal >= class.template().metal_cost {
                    commands.push(Command::BuildShip {
                        planet: planet_id,
                        class,
                    });
                }
            }
        }
    }

    // Colonization: idle colonizers toward unowned planets
    let unowned: Vec<PlanetId> = state
        .sorted_planet_ids()
        .into_iter()
        .filter(|id| state.planets[id].owner.is_none())
        .collect();
    for &ship_id in &player.ships_owned {
        let Some(ship) = state.ships.get(&ship_id) else {
            continue;
        };
        if ship.class.can_colonize() && ship.order == ShipOrder::Hold {
            for &planet_id in &unowned {
                commands.push(Command::Colonize {
                    planet: planet_id,
                    ship: ship_id,
                });
            }
        }
        if ship.class.can_invade() && ship.order == ShipOrder::Hold {
            for planet_id in state.sorted_planet_ids() {
                let planet = &state.planets[&planet_id];
                if planet
                    .owner
                    .map(|o| state.diplomacy.are_at_war(player_id, o))
                    .unwrap_or(false)
                {
                    commands.push(Command::Invade {
                        ship: ship_id,
                        planet: planet_id,
                    });
                }
            }
        }
    }

    // Fleet moves: idle warships toward enemy or own frontier planets
    let idle_warships: Vec<ShipId> = player
        .ships_owned
        .iter()
        .copied()
        .filter(|id| {
            state
                .ships
                .get(id)
                .map(|s| {
                    s.order == ShipOrder::Hold
                        && s.attack > Fixed::ZERO
                        && s.orbiting.is_some()
                })
                .unwrap_or(false)
        })
        .collect();
    if !idle_warships.is_empty() {
        for planet_id in state.sorted_planet_ids() {
            let planet = &state.planets[&planet_id];
            let hostile = planet
                .owner
                .map(|o| o != player_id && state.diplomacy.are_at_war(player_id, o))
                .unwrap_or(false);
            let own = planet.owner == Some(player_id);
            if hostile || own {
                commands.push(Command::MoveFleet {
                    ships: idle_warships.clone(),
                    target: planet_id,
                });
            }
        }
    }

    // Diplomacy and espionage, one candidate per counterpart
    for other_id in state.sorted_player_ids() {
        if other_id == player_id {
            continue;
        }
        let at_war = state.diplomacy.are_at_war(player_id, other_id);
        if at_war {
            commands.push(Command::ProposePeace { to: other_id });
            commands.push(Command::LaunchMission {
                target: other_id,
                kind: MissionKind::Sabotage,
            });
        } else {
            commands.push(Command::DeclareWar { target: other_id });
            if !state.diplomacy.are_allied(player_id, other_id) {
                commands.push(Command::ProposeAlliance { to: other_id });
            }
            if player.metal >= Fixed::from_int(120) {
                commands.push(Command::ProposeTrade {
                    to: other_id,
                    offer: crate::input::TradeOffer {
                        metal_offer: Fixed::from_int(100),
                        energy_offer: Fixed::ZERO,
                        metal_request: Fixed::ZERO,
                        energy_request: Fixed::from_int(80),
                    },
                });
            }
            commands.push(Command::LaunchMission {
                target: other_id,
                kind: MissionKind::GatherIntel,
            });
        }
    }

    // Research: a priority bump per technology
    let tech_ids: Vec<TechId> = player.technologies.keys().copied().collect();
    for tech in tech_ids {
        commands.push(Command::SetResearchPriority {
            tech,
            priority: Fixed::from_int(2),
        });
    }

    // Pending story choices
    for decision in &state.pending_decisions {
        if decision.player == player_id {
            for choice in 0..decision.options.len() as u32 {
                commands.push(Command::ResolveDecision {
                    decision: decision.id,
                    choice,
                });
            }
        }
    }

    commands.push(Command::Pass);
    commands
}

/// Random AI that picks valid commands at random. Useful for smoke tests
/// and exploring the command space.
pub struct RandomAi {
    rng: rand::rngs::StdRng,
}

impl RandomAi {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }
}

impl AiPlayer for RandomAi {
    fn name(&self) -> &'static str {
        "RandomAi"
    }

    fn decide(
        &mut self,
        _visible_state: &VisibleGalaxyState,
        available_commands: &AvailableCommands,
    ) -> Vec<Command> {
        if available_commands.is_empty() {
            return vec![];
        }
        // Half the ticks, do nothing at all
        if self.rng.gen::<bool>() {
            if let Some(cmd) = available_commands.choose(&mut self.rng) {
                return vec![cmd.clone()];
            }
        }
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GalaxyStateBuilder;

    fn observed_world() -> GalaxyState {
        let mut state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_player(1)
            .with_planet(0, Some(0))
            .with_planet(1, Some(1))
            .with_planet(2, None)
            .build();
        state.spawn_ship(0, ShipClass::Frigate, 0);
        state
    }

    #[test]
    fn test_omniscient_sees_everything() {
        let state = observed_world();
        let view = visible_state(&state, 0, VisibilityMode::Omniscient);
        assert_eq!(view.planets.len(), 3);
    }

    #[test]
    fn test_realistic_sees_only_known_planets() {
        let state = observed_world();
        let view = visible_state(&state, 0, VisibilityMode::Realistic);
        // The builder marks owned planets as seen; planet 1 and 2 are not
        assert_eq!(view.planets.len(), 1);
        assert_eq!(view.planets[0].id, 0);
    }

    #[test]
    fn test_idle_warships_listed() {
        let state = observed_world();
        let view = visible_state(&state, 0, VisibilityMode::Omniscient);
        assert_eq!(view.idle_warships.len(), 1);
        assert!(view.idle_colonizers.is_empty());
    }

    #[test]
    fn test_available_commands_are_all_legal() {
        let state = observed_world();
        let config = SimConfig::default();
        let commands = available_commands(&state, 0, &config);
        assert!(!commands.is_empty());

        for cmd in &commands {
            let mut probe = state.clone();
            let result = crate::step::execute_command(&mut probe, 0, cmd, &config);
            // Proposals may be rejected by the counterpart; everything
            // else enumerated here must validate.
            if !matches!(
                result,
                Err(crate::step::ActionError::ProposalRejected) | Ok(())
            ) {
                panic!("illegal candidate command {cmd:?}: {result:?}");
            }
        }
    }

    #[test]
    fn random_ai_is_seed_deterministic() {
        let state = observed_world();
        let view = visible_state(&state, 0, VisibilityMode::Omniscient);
        let commands = available_commands(&state, 0, &SimConfig::default());

        let decide = |seed: u64| {
            let mut ai = RandomAi::new(seed);
            (0..10)
                .map(|_| ai.decide(&view, &commands))
                .collect::<Vec<_>>()
        };
        assert_eq!(decide(7), decide(7));
    }
}
