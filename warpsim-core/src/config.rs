use crate::fixed::Fixed;
use serde::{Deserialize, Serialize};

/// Simulation configuration.
///
/// Every tunable the systems read lives here so tests can pin a behavior
/// without touching code. Defaults reproduce the standard campaign balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Base logistic population growth rate per tick.
    pub growth_rate: Fixed,
    /// Carrying capacity of a fully suitable, undeveloped planet.
    pub base_capacity: Fixed,
    /// Extra carrying capacity per terraforming level, as a fraction.
    pub capacity_per_terraform: Fixed,
    /// Production efficiency gained per mining level, as a fraction.
    pub mining_efficiency_step: Fixed,
    /// Yard work applied to the front build order per shipbuilding level.
    pub shipyard_rate: Fixed,
    /// Base cost of the first development level in each category.
    pub invest_base_cost: Fixed,
    /// Upkeep charged per development level per tick.
    pub dev_upkeep: Fixed,
    /// Consecutive deficit ticks before a planet is abandoned.
    pub abandonment_grace: u32,
    /// Hard cap on battle rounds; reaching it is a draw.
    pub battle_round_cap: u32,
    /// Fraction of planet population lost per battle round fought.
    pub battle_population_damage: Fixed,
    /// Fraction of a conquered planet's metal looted by the victor.
    pub loot_fraction: Fixed,
    /// Relationship decay toward neutral per tick (integer points).
    pub relation_decay: i32,
    /// Opinion at or below this counts the other player as an enemy.
    pub enemy_threshold: i32,
    /// Minimum opinion for an alliance proposal to be accepted.
    pub alliance_threshold: i32,
    /// War weariness at or above this makes losing peace offers acceptable.
    pub peace_weariness_threshold: i32,
    /// War weariness gained per tick while at war.
    pub weariness_per_war_tick: i32,
    /// Fraction of colonized planets one player must own to win.
    pub victory_planet_share: Fixed,
    /// Compute checksum every N ticks (0 = disabled).
    pub checksum_frequency: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            growth_rate: Fixed::from_f32(0.05),
            base_capacity: Fixed::from_int(10_000),
            capacity_per_terraform: Fixed::from_f32(0.1),
            mining_efficiency_step: Fixed::from_f32(0.1),
            shipyard_rate: Fixed::from_int(25),
            invest_base_cost: Fixed::from_int(100),
            dev_upkeep: Fixed::from_f32(0.5),
            abandonment_grace: 5,
            battle_round_cap: 50,
            battle_population_damage: Fixed::from_f32(0.01),
            loot_fraction: Fixed::from_f32(0.25),
            relation_decay: 1,
            enemy_threshold: -50,
            alliance_threshold: 50,
            peace_weariness_threshold: 75,
            weariness_per_war_tick: 2,
            victory_planet_share: Fixed::from_f32(0.75),
            checksum_frequency: 10,
        }
    }
}
