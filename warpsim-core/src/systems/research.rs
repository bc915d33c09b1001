//! Research: output distribution, level thresholds and effect application.

use crate::fixed::Fixed;
use crate::state::{GalaxyState, PlayerId, TechCategory};
use tracing::instrument;

/// Research output contributed per unit of population each tick.
const RESEARCH_FACTOR: Fixed = Fixed::from_raw(100); // 0.01

/// Cost growth per technology level.
const COST_GROWTH: Fixed = Fixed::from_raw(15000); // 1.5

/// Runs research for every player.
///
/// Output = total population × 0.01 × (1 + science speed bonus), split
/// across technologies proportional to their priority weights. Each time
/// accumulated progress crosses the level cost, the level increments, the
/// cost grows 1.5×, and the level's effects are applied exactly once.
#[instrument(skip_all, name = "research")]
pub fn run_research_tick(state: &mut GalaxyState) {
    for player_id in state.sorted_player_ids() {
        let Some(player) = state.players.get(&player_id) else {
            continue;
        };
        if player.eliminated {
            continue;
        }

        let output = player
            .total_population
            .mul(RESEARCH_FACTOR)
            .mul(Fixed::ONE + player.research_speed);

        let total_weight: Fixed = player
            .technologies
            .keys()
            .map(|id| {
                player
                    .research_priorities
                    .get(id)
                    .copied()
                    .unwrap_or(Fixed::ZERO)
                    .max(Fixed::ZERO)
            })
            .fold(Fixed::ZERO, |a, b| a + b);

        if output <= Fixed::ZERO || total_weight <= Fixed::ZERO {
            let player = state.players.get_mut(&player_id).expect("player exists");
            player.research_output = output.max(Fixed::ZERO);
            continue;
        }

        // Shares are computed against the pre-tick weights, then applied
        let tech_ids: Vec<u32> = player.technologies.keys().copied().collect();
        let mut level_ups: Vec<(u32, TechCategory, Vec<Fixed>, u32)> = Vec::new();
        {
            let player = state.players.get_mut(&player_id).expect("player exists");
            player.research_output = output;
            for tech_id in tech_ids {
                let weight = player
                    .research_priorities
                    .get(&tech_id)
                    .copied()
                    .unwrap_or(Fixed::ZERO)
                    .max(Fixed::ZERO);
                if weight <= Fixed::ZERO {
                    continue;
                }
                let share = output.mul(weight.div(total_weight));
                let tech = player.technologies.get_mut(&tech_id).expect("tech exists");
                tech.progress += share;

                // Multiple thresholds may be crossed by one large share;
                // levels land in ascending order with the remainder kept.
                while tech.progress >= tech.cost_to_upgrade {
                    tech.progress -= tech.cost_to_upgrade;
                    tech.level += 1;
                    tech.cost_to_upgrade = tech.cost_to_upgrade.mul(COST_GROWTH);
                    level_ups.push((tech_id, tech.category, tech.effects.clone(), tech.level));
                }
                if tech.progress < Fixed::ZERO {
                    tech.progress = Fixed::ZERO;
                }
            }
        }

        for (tech_id, category, effects, level) in level_ups {
            apply_effects(state, player_id, category, &effects);
            log::info!("player {player_id} advanced tech {tech_id} to level {level}");
        }
    }
}

/// Apply one level's worth of a technology's effects to the owning player.
///
/// Called exactly once per level crossed, in ascending level order.
fn apply_effects(
    state: &mut GalaxyState,
    player_id: PlayerId,
    category: TechCategory,
    effects: &[Fixed],
) {
    let effect = |i: usize| effects.get(i).copied().unwrap_or(Fixed::ZERO);
    match category {
        TechCategory::Military => {
            // Attack and shield upgrades reach every ship in the fleet
            let ship_ids: Vec<_> = state
                .players
                .get(&player_id)
                .map(|p| p.ships_owned.iter().copied().collect())
                .unwrap_or_default();
            for ship_id in ship_ids {
                if let Some(ship) = state.ships.get_mut(&ship_id) {
                    ship.attack += effect(0);
                    ship.shield_max += effect(1);
                    ship.shields = (ship.shields + effect(1)).min(ship.shield_max);
                }
            }
        }
        TechCategory::Economy => {
            if let Some(player) = state.players.get_mut(&player_id) {
                player.mining_efficiency += effect(0).div(Fixed::from_int(10));
                player.energy_efficiency += effect(1).div(Fixed::from_int(10));
            }
        }
        TechCategory::Science => {
            if let Some(player) = state.players.get_mut(&player_id) {
                player.research_speed += effect(0).div(Fixed::from_int(10));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ShipClass;
    use crate::testing::GalaxyStateBuilder;

    fn research_world(cost: Fixed) -> GalaxyState {
        let mut state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_planet(0, Some(0))
            .with_technology(0, 0, TechCategory::Military, cost)
            .build();
        state.players.get_mut(&0).unwrap().total_population = Fixed::from_int(1_000);
        state
    }

    #[test]
    fn test_progress_accumulates() {
        let mut state = research_world(Fixed::from_int(100));

        run_research_tick(&mut state);

        // 1000 pop × 0.01 = 10 output, all on the single tech
        let tech = &state.players[&0].technologies[&0];
        assert_eq!(tech.progress, Fixed::from_int(10));
        assert_eq!(tech.level, 0);
    }

    #[test]
    fn test_level_up_keeps_remainder_and_scales_cost() {
        let mut state = research_world(Fixed::from_int(8));

        run_research_tick(&mut state);

        let tech = &state.players[&0].technologies[&0];
        assert_eq!(tech.level, 1);
        assert_eq!(tech.progress, Fixed::from_int(2)); // 10 - 8
        assert_eq!(tech.cost_to_upgrade, Fixed::from_int(12)); // 8 × 1.5
    }

    #[test]
    fn test_multi_level_jump_applies_effects_per_level() {
        // Costs 2, 3, 4.5: an output of 10 crosses exactly three levels
        let mut state = research_world(Fixed::from_int(2));
        let ship = state.spawn_ship(0, ShipClass::Frigate, 0);
        let attack_before = state.ships[&ship].attack;

        run_research_tick(&mut state);

        let tech = &state.players[&0].technologies[&0];
        assert_eq!(tech.level, 3);
        assert!(tech.progress >= Fixed::ZERO);

        // Military effect[0] = 2 attack per level, applied three times
        let attack_after = state.ships[&ship].attack;
        assert_eq!(attack_after - attack_before, Fixed::from_int(6));
    }

    #[test]
    fn test_priority_weights_split_output() {
        let mut state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_planet(0, Some(0))
            .with_technology(0, 0, TechCategory::Military, Fixed::from_int(1_000))
            .with_technology(0, 1, TechCategory::Economy, Fixed::from_int(1_000))
            .build();
        {
            let player = state.players.get_mut(&0).unwrap();
            player.total_population = Fixed::from_int(1_000);
            player.research_priorities.insert(0, Fixed::from_int(3));
            player.research_priorities.insert(1, Fixed::ONE);
        }

        run_research_tick(&mut state);

        let player = &state.players[&0];
        // Output 10 split 3:1
        assert_eq!(player.technologies[&0].progress, Fixed::from_f32(7.5));
        assert_eq!(player.technologies[&1].progress, Fixed::from_f32(2.5));
    }

    #[test]
    fn test_science_tech_speeds_research() {
        let mut state = research_world(Fixed::from_int(1_000_000));
        {
            let player = state.players.get_mut(&0).unwrap();
            player.research_speed = Fixed::ONE; // +100%
        }

        run_research_tick(&mut state);

        assert_eq!(state.players[&0].research_output, Fixed::from_int(20));
    }

    #[test]
    fn test_zero_priority_gets_nothing() {
        let mut state = research_world(Fixed::from_int(100));
        state
            .players
            .get_mut(&0)
            .unwrap()
            .research_priorities
            .insert(0, Fixed::ZERO);

        run_research_tick(&mut state);

        let tech = &state.players[&0].technologies[&0];
        assert_eq!(tech.progress, Fixed::ZERO);
    }
}
