//! The standard campaign AI: a deterministic, priority-scored planner.
//!
//! Every legal command gets a score from fixed heuristics; the planner
//! issues the best-scoring command in each concern (economic, military,
//! diplomatic, research) whose score is positive. No randomness, so the
//! same observation always produces the same orders.

use crate::ai::{AiPlayer, AvailableCommands, VisibleGalaxyState};
use crate::fixed::Fixed;
use crate::input::{Command, CommandCategory};
use crate::state::{DevCategory, MissionKind};
use std::collections::BTreeMap;

/// Population below which a colony is considered underdeveloped.
const LOW_POPULATION: Fixed = Fixed::from_raw(500 * 10_000); // 500

/// Defense rating below which a colony is considered soft.
const LOW_DEFENSE: Fixed = Fixed::from_raw(3 * 10_000); // 3

#[derive(Default)]
pub struct PlannerAi;

impl PlannerAi {
    pub fn new() -> Self {
        Self
    }

    /// Scores a command based on immediate heuristic value.
    ///
    /// Higher wins. Zero or negative scores are never issued.
    fn score_command(&self, cmd: &Command, state: &VisibleGalaxyState) -> i32 {
        match cmd {
            // Tier 0: Survival. A worn-down empire takes the exit.
            Command::ProposePeace { .. } => {
                if state.war_weariness >= 75 {
                    10000
                } else if state.war_weariness >= 50 && self.outgunned(state) {
                    5000
                } else {
                    -100
                }
            }

            // Tier 1: Expansion. Free planets are the best investment.
            Command::Colonize { planet, .. } => {
                let Some(view) = state.planets.iter().find(|p| p.id == *planet) else {
                    return -100;
                };
                // Prefer hospitable worlds
                3000 + (view.suitability.mul(Fixed::from_int(1000))).to_int() as i32
            }

            // Tier 2: Development of weak colonies.
            Command::Invest {
                planet, category, ..
            } => {
                let Some(view) = state.planets.iter().find(|p| p.id == *planet) else {
                    return -100;
                };
                match category {
                    DevCategory::Defense if view.defense_rating < LOW_DEFENSE => {
                        if state.at_war_with.is_empty() {
                            1800
                        } else {
                            2600
                        }
                    }
                    DevCategory::Population if view.population < LOW_POPULATION => 2000,
                    DevCategory::Mining if view.mining_level < 3 => 1900,
                    DevCategory::Infrastructure if view.shipbuilding_level == 0 => 1700,
                    DevCategory::Energy => 300,
                    _ => 200,
                }
            }

            // Tier 2: Invasion of soft, rich targets.
            Command::Invade { planet, .. } => {
                let Some(view) = state.planets.iter().find(|p| p.id == *planet) else {
                    return -100;
                };
                if view.population > LOW_POPULATION && view.defense_rating < LOW_DEFENSE {
                    2400
                } else {
                    -500
                }
            }

            // Tier 3: Fleet building and movement.
            Command::BuildShip { class, .. } => {
                let at_war = !state.at_war_with.is_empty();
                match (at_war, class) {
                    (true, crate::state::ShipClass::Destroyer) => 1500,
                    (true, crate::state::ShipClass::Frigate) => 1300,
                    (true, crate::state::ShipClass::Invasion) => 1200,
                    (false, crate::state::ShipClass::Freighter) => 1400,
                    (false, crate::state::ShipClass::Scout) => 600,
                    (false, crate::state::ShipClass::Frigate) => 500,
                    _ => 100,
                }
            }
            Command::MoveFleet { target, .. } => {
                let Some(view) = state.planets.iter().find(|p| p.id == *target) else {
                    return -100;
                };
                let hostile = view
                    .owner
                    .map(|o| state.at_war_with.contains(&o))
                    .unwrap_or(false);
                if hostile {
                    // Engage only from strength
                    if self.outgunned(state) {
                        -800
                    } else {
                        1100
                    }
                } else if view.owner == Some(state.observer) && !state.at_war_with.is_empty() {
                    400 // Garrison at home during wartime
                } else {
                    50
                }
            }
            Command::AttackTarget { .. } => {
                if self.outgunned(state) {
                    -800
                } else {
                    900
                }
            }

            // Tier 4: Diplomacy by stance. Befriend the strong, squeeze
            // the weak.
            Command::DeclareWar { target } => {
                let own = state.own_strength;
                let theirs = state
                    .known_strength
                    .get(target)
                    .copied()
                    .unwrap_or(Fixed::ZERO);
                let relation = state.relations.get(target).copied().unwrap_or(0);
                // own >= theirs * 1.5, integer form
                let overwhelming = own.raw() * 2 >= theirs.raw() * 3;
                if overwhelming && relation < 0 && state.at_war_with.is_empty() {
                    800
                } else {
                    -1000
                }
            }
            Command::ProposeAlliance { to } => {
                let relation = state.relations.get(to).copied().unwrap_or(0);
                let theirs = state
                    .known_strength
                    .get(to)
                    .copied()
                    .unwrap_or(Fixed::ZERO);
                if relation >= 50 && theirs > state.own_strength {
                    1000
                } else if relation >= 50 {
                    450
                } else {
                    -200
                }
            }
            Command::ProposeTrade { to, .. } => {
                let relation = state.relations.get(to).copied().unwrap_or(0);
                if relation >= 0 && state.metal > Fixed::from_int(300) {
                    500
                } else {
                    -100
                }
            }
            Command::LaunchMission { target, kind } => {
                let at_war = state.at_war_with.contains(target);
                match kind {
                    MissionKind::Sabotage if at_war => 700,
                    MissionKind::GatherIntel if !at_war => 150,
                    MissionKind::StealTechnology => 120,
                    _ => -50,
                }
            }

            // Research keeps flowing whatever else happens
            Command::SetResearchPriority { .. } => 250,

            Command::ResolveDecision { choice, .. } => {
                // Take the bold option only with a cushion of funds
                if *choice == 0 && state.funds > Fixed::from_int(500) {
                    350
                } else if *choice != 0 {
                    300
                } else {
                    100
                }
            }

            Command::SetAllocation { .. } => 80,
            Command::Pass => 0,
        }
    }

    fn outgunned(&self, state: &VisibleGalaxyState) -> bool {
        state
            .at_war_with
            .iter()
            .filter_map(|id| state.known_strength.get(id))
            .any(|&enemy| enemy > state.own_strength)
    }
}

impl AiPlayer for PlannerAi {
    fn name(&self) -> &'static str {
        "PlannerAi"
    }

    fn decide(
        &mut self,
        visible_state: &VisibleGalaxyState,
        available_commands: &AvailableCommands,
    ) -> Vec<Command> {
        // Best positive-scoring command per concern; first wins ties so
        // the enumeration order (stable by construction) breaks them.
        let mut best: BTreeMap<CommandCategory, (i32, &Command)> = BTreeMap::new();
        for cmd in available_commands {
            let score = self.score_command(cmd, visible_state);
            if score <= 0 {
                continue;
            }
            let entry = best.entry(cmd.category()).or_insert((score, cmd));
            if score > entry.0 {
                *entry = (score, cmd);
            }
        }

        let mut picks: Vec<(i32, &Command)> = best.into_values().collect();
        picks.sort_by_key(|(score, _)| -score);
        picks
            .into_iter()
            .filter(|(_, cmd)| !matches!(cmd, Command::Pass))
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }
}
