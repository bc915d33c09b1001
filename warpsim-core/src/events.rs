//! External event triggers.
//!
//! Events are produced by collaborators (scenario scripts, a random event
//! generator in the runner) and handed to the core as typed triggers. The
//! core consumes them in one dispatch during the step; it never generates
//! events on its own.

use crate::fixed::Fixed;
use crate::state::{GalaxyState, PendingDecision, PlanetId, PlayerId, TechId};
use serde::{Deserialize, Serialize};

/// A typed event trigger, one variant per kind of external happening.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventTrigger {
    /// A quake, storm or plague strikes a planet.
    NaturalDisaster {
        planet: PlanetId,
        /// Fraction of population and stock lost, in [0, 1].
        severity: Fixed,
    },
    /// A research windfall for one player's technology.
    TechnologyBreakthrough { player: PlayerId, tech: TechId, progress: Fixed },
    /// Raiders loot a planet's metal stock.
    PirateRaid { planet: PlanetId, strength: Fixed },
    /// A third-party incident shifts two players' standing.
    DiplomaticIncident {
        a: PlayerId,
        b: PlayerId,
        delta: i32,
    },
    /// A story beat that needs a player choice. The choice arrives later as
    /// a ResolveDecision command; nothing blocks waiting for it.
    StoryChoice {
        player: PlayerId,
        prompt: String,
        options: Vec<String>,
    },
}

/// Apply a batch of triggers in order.
pub fn apply_events(state: &mut GalaxyState, triggers: &[EventTrigger]) {
    for trigger in triggers {
        apply_event(state, trigger);
    }
}

fn apply_event(state: &mut GalaxyState, trigger: &EventTrigger) {
    match trigger {
        EventTrigger::NaturalDisaster { planet, severity } => {
            let severity = (*severity).clamp(Fixed::ZERO, Fixed::ONE);
            if let Some(p) = state.planets.get_mut(planet) {
                p.population = (p.population.mul(Fixed::ONE - severity)).max(Fixed::ZERO);
                p.metal = (p.metal.mul(Fixed::ONE - severity)).max(Fixed::ZERO);
                log::info!(
                    "disaster at planet {}: severity {}, population now {}",
                    planet,
                    severity,
                    p.population
                );
            } else {
                log::warn!("disaster trigger for unknown planet {planet}");
            }
        }
        EventTrigger::TechnologyBreakthrough {
            player,
            tech,
            progress,
        } => {
            if let Some(p) = state.players.get_mut(player) {
                if let Some(t) = p.technologies.get_mut(tech) {
                    t.progress += (*progress).max(Fixed::ZERO);
                    log::info!("breakthrough for player {player}: tech {tech} +{progress}");
                } else {
                    log::warn!("breakthrough trigger for unknown tech {tech}");
                }
            }
        }
        EventTrigger::PirateRaid { planet, strength } => {
            if let Some(p) = state.planets.get_mut(planet) {
                // Planet defense blunts the raid; a well-defended colony
                // loses nothing.
                let defense = p.defense_rating();
                let loss = (*strength - defense).max(Fixed::ZERO);
                p.metal = (p.metal - loss).max(Fixed::ZERO);
                log::info!("pirate raid at planet {planet}: {loss} metal lost");
            }
        }
        EventTrigger::DiplomaticIncident { a, b, delta } => {
            state.diplomacy.adjust_relation(*a, *b, *delta);
        }
        EventTrigger::StoryChoice {
            player,
            prompt,
            options,
        } => {
            let id = state.next_decision_id;
            state.next_decision_id += 1;
            state.pending_decisions.push(PendingDecision {
                id,
                player: *player,
                prompt: prompt.clone(),
                options: options.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GalaxyStateBuilder;

    #[test]
    fn test_disaster_reduces_population_and_clamps() {
        let mut state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_planet(0, Some(0))
            .build();

        apply_events(
            &mut state,
            &[EventTrigger::NaturalDisaster {
                planet: 0,
                severity: Fixed::from_f32(0.5),
            }],
        );
        assert_eq!(state.planets[&0].population, Fixed::from_int(500));

        // Severity above 1.0 clamps instead of going negative
        apply_events(
            &mut state,
            &[EventTrigger::NaturalDisaster {
                planet: 0,
                severity: Fixed::from_int(5),
            }],
        );
        assert_eq!(state.planets[&0].population, Fixed::ZERO);
    }

    #[test]
    fn test_story_choice_queues_pending_decision() {
        let mut state = GalaxyStateBuilder::new().with_player(0).build();

        apply_events(
            &mut state,
            &[EventTrigger::StoryChoice {
                player: 0,
                prompt: "Derelict hulk found".into(),
                options: vec!["Salvage".into(), "Ignore".into()],
            }],
        );

        assert_eq!(state.pending_decisions.len(), 1);
        assert_eq!(state.pending_decisions[0].player, 0);
        assert_eq!(state.pending_decisions[0].options.len(), 2);
    }

    #[test]
    fn test_raid_blunted_by_defense() {
        let mut state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_planet(0, Some(0))
            .build();
        state.planets.get_mut(&0).unwrap().defense_level = 100;
        let before = state.planets[&0].metal;

        apply_events(
            &mut state,
            &[EventTrigger::PirateRaid {
                planet: 0,
                strength: Fixed::from_int(50),
            }],
        );
        assert_eq!(state.planets[&0].metal, before);
    }

    #[test]
    fn test_incident_shifts_relations_both_ways() {
        let mut state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_player(1)
            .build();

        apply_events(
            &mut state,
            &[EventTrigger::DiplomaticIncident {
                a: 0,
                b: 1,
                delta: -30,
            }],
        );
        assert_eq!(state.diplomacy.relation(0, 1), -30);
        assert_eq!(state.diplomacy.relation(1, 0), -30);
    }
}
