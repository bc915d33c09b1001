//! Flat ordered-record save snapshot.
//!
//! The save format is counts followed by fixed-field rows: planets, then
//! players (each carrying its technology rows, each of those carrying a
//! variable-length effect list), then ships. The exact on-disk encoding is
//! the save layer's concern; the core's obligation is this field set, its
//! declared counts, and an all-or-nothing restore. A corrupt snapshot
//! produces a `LoadError` and leaves whatever state the caller holds
//! untouched, because restore only ever builds a fresh `GalaxyState`.

use crate::bounded::{new_relation, new_reputation, new_war_weariness};
use crate::fixed::Fixed;
use crate::state::{
    BuildOrder, DiplomacyState, GalaxyState, Mission, MissionKind, PlanetId, PlanetState,
    PlayerId, PlayerState, ShipClass, ShipId, ShipOrder, ShipState, TechCategory, TechId,
    Technology, DEV_CATEGORIES,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{kind} count mismatch: header declares {declared}, found {actual} rows")]
    CountMismatch {
        kind: &'static str,
        declared: u32,
        actual: usize,
    },
    #[error("{kind} row {index} references missing {target_kind} {target}")]
    DanglingReference {
        kind: &'static str,
        index: usize,
        target_kind: &'static str,
        target: u32,
    },
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },
    #[error("invalid field: {0}")]
    InvalidField(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanetRecord {
    pub id: PlanetId,
    pub x: Fixed,
    pub y: Fixed,
    pub owner: Option<PlayerId>,
    pub population: Fixed,
    pub temperature: Fixed,
    pub gravity: Fixed,
    pub metal: Fixed,
    pub allocation: [Fixed; DEV_CATEGORIES],
    pub income: [Fixed; DEV_CATEGORIES],
    pub terraforming_level: u32,
    pub mining_level: u32,
    pub shipbuilding_level: u32,
    pub defense_level: u32,
    pub deficit_ticks: u32,
    pub build_queue: Vec<(ShipClass, Fixed)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyRecord {
    pub id: TechId,
    pub name: String,
    pub category: TechCategory,
    pub level: u32,
    pub cost_to_upgrade: Fixed,
    pub progress: Fixed,
    pub priority: Fixed,
    /// Declared length of `effects`; validated on restore.
    pub effect_count: u32,
    pub effects: Vec<Fixed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub temperature_preference: Fixed,
    pub gravity_preference: Fixed,
    pub metal: Fixed,
    pub energy: Fixed,
    pub funds: Fixed,
    pub planets_seen: Vec<PlanetId>,
    pub mining_efficiency: Fixed,
    pub energy_efficiency: Fixed,
    pub research_speed: Fixed,
    pub reputation: i32,
    pub war_weariness: i32,
    pub is_ai: bool,
    pub eliminated: bool,
    pub tech_count: u32,
    pub technologies: Vec<TechnologyRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipRecord {
    pub id: ShipId,
    pub owner: Option<PlayerId>,
    pub class: ShipClass,
    pub attack: Fixed,
    pub shields: Fixed,
    pub shield_max: Fixed,
    pub hull: Fixed,
    pub hull_max: Fixed,
    pub speed: Fixed,
    pub weapon_range: Fixed,
    pub miniaturization: u32,
    pub experience: u32,
    pub x: Fixed,
    pub y: Fixed,
    pub orbiting: Option<PlanetId>,
    pub order: ShipOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionRecord {
    pub id: u32,
    pub kind: MissionKind,
    pub initiator: PlayerId,
    pub target: PlayerId,
    pub elapsed: u32,
    pub duration: u32,
    pub skill: Fixed,
}

/// A complete, self-validating snapshot of the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveGame {
    pub tick: u64,
    pub rng_seed: u64,
    pub rng_cursor: u64,
    pub planet_count: u32,
    pub planets: Vec<PlanetRecord>,
    pub player_count: u32,
    pub players: Vec<PlayerRecord>,
    pub ship_count: u32,
    pub ships: Vec<ShipRecord>,
    pub mission_count: u32,
    pub missions: Vec<MissionRecord>,
    pub relations: Vec<(PlayerId, PlayerId, i32)>,
    pub wars: Vec<(PlayerId, PlayerId)>,
    pub alliances: Vec<(PlayerId, PlayerId)>,
    pub winner: Option<PlayerId>,
}

impl SaveGame {
    /// Capture the current state as an ordered-record snapshot.
    pub fn capture(state: &GalaxyState) -> Self {
        let planets: Vec<PlanetRecord> = state
            .sorted_planet_ids()
            .into_iter()
            .map(|id| {
                let p = &state.planets[&id];
                PlanetRecord {
                    id,
                    x: p.x,
                    y: p.y,
                    owner: p.owner,
                    population: p.population,
                    temperature: p.temperature,
                    gravity: p.gravity,
                    metal: p.metal,
                    allocation: p.allocation,
                    income: p.income,
                    terraforming_level: p.terraforming_level,
                    mining_level: p.mining_level,
                    shipbuilding_level: p.shipbuilding_level,
                    defense_level: p.defense_level,
                    deficit_ticks: p.deficit_ticks,
                    build_queue: p
                        .build_queue
                        .iter()
                        .map(|o| (o.class, o.remaining))
                        .collect(),
                }
            })
            .collect();

        let players: Vec<PlayerRecord> = state
            .sorted_player_ids()
            .into_iter()
            .map(|id| {
                let p = &state.players[&id];
                let technologies: Vec<TechnologyRecord> = p
                    .technologies
                    .values()
                    .map(|t| TechnologyRecord {
                        id: t.id,
                        name: t.name.clone(),
                        category: t.category,
                        level: t.level,
                        cost_to_upgrade: t.cost_to_upgrade,
                        progress: t.progress,
                        priority: p
                            .research_priorities
                            .get(&t.id)
                            .copied()
                            .unwrap_or(Fixed::ZERO),
                        effect_count: t.effects.len() as u32,
                        effects: t.effects.clone(),
                    })
                    .collect();
                PlayerRecord {
                    id,
                    name: p.name.clone(),
                    temperature_preference: p.temperature_preference,
                    gravity_preference: p.gravity_preference,
                    metal: p.metal,
                    energy: p.energy,
                    funds: p.funds,
                    planets_seen: p.planets_seen.iter().copied().collect(),
                    mining_efficiency: p.mining_efficiency,
                    energy_efficiency: p.energy_efficiency,
                    research_speed: p.research_speed,
                    reputation: p.reputation.get(),
                    war_weariness: p.war_weariness.get(),
                    is_ai: p.is_ai,
                    eliminated: p.eliminated,
                    tech_count: technologies.len() as u32,
                    technologies,
                }
            })
            .collect();

        let ships: Vec<ShipRecord> = state
            .sorted_ship_ids()
            .into_iter()
            .map(|id| {
                let s = &state.ships[&id];
                ShipRecord {
                    id,
                    owner: s.owner,
                    class: s.class,
                    attack: s.attack,
                    shields: s.shields,
                    shield_max: s.shield_max,
                    hull: s.hull,
                    hull_max: s.hull_max,
                    speed: s.speed,
                    weapon_range: s.weapon_range,
                    miniaturization: s.miniaturization,
                    experience: s.experience,
                    x: s.x,
                    y: s.y,
                    orbiting: s.orbiting,
                    order: s.order,
                }
            })
            .collect();

        let missions: Vec<MissionRecord> = state
            .sorted_mission_ids()
            .into_iter()
            .map(|id| {
                let m = &state.missions[&id];
                MissionRecord {
                    id,
                    kind: m.kind,
                    initiator: m.initiator,
                    target: m.target,
                    elapsed: m.elapsed,
                    duration: m.duration,
                    skill: m.skill,
                }
            })
            .collect();

        SaveGame {
            tick: state.tick,
            rng_seed: state.rng_seed,
            rng_cursor: state.rng_cursor,
            planet_count: planets.len() as u32,
            planets,
            player_count: players.len() as u32,
            players,
            ship_count: ships.len() as u32,
            ships,
            mission_count: missions.len() as u32,
            missions,
            relations: state
                .diplomacy
                .relations
                .iter()
                .map(|(&(a, b), score)| (a, b, score.get()))
                .collect(),
            wars: state.diplomacy.wars.iter().copied().collect(),
            alliances: state.diplomacy.alliances.iter().copied().collect(),
            winner: state.winner,
        }
    }

    /// Validate the snapshot and build a fresh state from it.
    ///
    /// Fails on count mismatches, duplicate ids and dangling references.
    /// Never partially constructs: either the whole snapshot is good, or
    /// the caller keeps its current state.
    pub fn restore(&self) -> Result<GalaxyState, LoadError> {
        self.validate()?;

        let mut state = GalaxyState::with_seed(self.rng_seed);
        state.tick = self.tick;
        state.rng_cursor = self.rng_cursor;
        state.winner = self.winner;

        for record in &self.planets {
            let planet = PlanetState {
                id: record.id,
                x: record.x,
                y: record.y,
                owner: record.owner,
                population: record.population,
                temperature: record.temperature,
                gravity: record.gravity,
                metal: record.metal,
                allocation: record.allocation,
                income: record.income,
                terraforming_level: record.terraforming_level,
                mining_level: record.mining_level,
                shipbuilding_level: record.shipbuilding_level,
                defense_level: record.defense_level,
                build_queue: record
                    .build_queue
                    .iter()
                    .map(|&(class, remaining)| BuildOrder { class, remaining })
                    .collect::<VecDeque<_>>(),
                deficit_ticks: record.deficit_ticks,
                rescued_this_tick: false,
            };
            state.planets.insert(record.id, planet);
        }
        state.next_planet_id = self.planets.iter().map(|p| p.id + 1).max().unwrap_or(0);

        for record in &self.players {
            let mut player = PlayerState::new(record.id, record.name.clone());
            player.temperature_preference = record.temperature_preference;
            player.gravity_preference = record.gravity_preference;
            player.metal = record.metal;
            player.energy = record.energy;
            player.funds = record.funds;
            player.planets_seen = record.planets_seen.iter().copied().collect();
            player.mining_efficiency = record.mining_efficiency;
            player.energy_efficiency = record.energy_efficiency;
            player.research_speed = record.research_speed;
            player.reputation = new_reputation();
            player.reputation.set(record.reputation);
            player.war_weariness = new_war_weariness();
            player.war_weariness.set(record.war_weariness);
            player.is_ai = record.is_ai;
            player.eliminated = record.eliminated;
            for tech in &record.technologies {
                player.technologies.insert(
                    tech.id,
                    Technology {
                        id: tech.id,
                        name: tech.name.clone(),
                        category: tech.category,
                        level: tech.level,
                        cost_to_upgrade: tech.cost_to_upgrade,
                        progress: tech.progress,
                        effects: tech.effects.clone(),
                    },
                );
                player.research_priorities.insert(tech.id, tech.priority);
            }
            state.players.insert(record.id, player);
        }

        for record in &self.ships {
            let ship = ShipState {
                id: record.id,
                owner: record.owner,
                class: record.class,
                attack: record.attack,
                shields: record.shields,
                shield_max: record.shield_max,
                hull: record.hull,
                hull_max: record.hull_max,
                speed: record.speed,
                weapon_range: record.weapon_range,
                reload: 0,
                miniaturization: record.miniaturization,
                experience: record.experience,
                x: record.x,
                y: record.y,
                orbiting: record.orbiting,
                order: record.order,
            };
            state.ships.insert(record.id, ship);
        }
        state.next_ship_id = self.ships.iter().map(|s| s.id + 1).max().unwrap_or(0);

        for record in &self.missions {
            state.missions.insert(
                record.id,
                Mission {
                    id: record.id,
                    kind: record.kind,
                    initiator: record.initiator,
                    target: record.target,
                    elapsed: record.elapsed,
                    duration: record.duration,
                    skill: record.skill,
                },
            );
        }
        state.next_mission_id = self.missions.iter().map(|m| m.id + 1).max().unwrap_or(0);

        // Ownership sets are derived from the rows, not stored separately
        let owned: Vec<(PlanetId, PlayerId)> = state
            .planets
            .values()
            .filter_map(|p| p.owner.map(|o| (p.id, o)))
            .collect();
        for (planet_id, owner) in owned {
            if let Some(player) = state.players.get_mut(&owner) {
                player.planets_owned.insert(planet_id);
                player.planets_seen.insert(planet_id);
            }
        }
        let crewed: Vec<(ShipId, PlayerId)> = state
            .ships
            .values()
            .filter_map(|s| s.owner.map(|o| (s.id, o)))
            .collect();
        for (ship_id, owner) in crewed {
            if let Some(player) = state.players.get_mut(&owner) {
                player.ships_owned.insert(ship_id);
            }
        }

        let mut diplomacy = DiplomacyState::default();
        for &(a, b, score) in &self.relations {
            let mut relation = new_relation();
            relation.set(score);
            diplomacy.relations.insert((a, b), relation);
        }
        diplomacy.wars = self.wars.iter().copied().collect();
        diplomacy.alliances = self.alliances.iter().copied().collect();
        state.diplomacy = diplomacy;

        Ok(state)
    }

    fn validate(&self) -> Result<(), LoadError> {
        if self.planet_count as usize != self.planets.len() {
            return Err(LoadError::CountMismatch {
                kind: "planet",
                declared: self.planet_count,
                actual: self.planets.len(),
            });
        }
        if self.player_count as usize != self.players.len() {
            return Err(LoadError::CountMismatch {
                kind: "player",
                declared: self.player_count,
                actual: self.players.len(),
            });
        }
        if self.ship_count as usize != self.ships.len() {
            return Err(LoadError::CountMismatch {
                kind: "ship",
                declared: self.ship_count,
                actual: self.ships.len(),
            });
        }
        if self.mission_count as usize != self.missions.len() {
            return Err(LoadError::CountMismatch {
                kind: "mission",
                declared: self.mission_count,
                actual: self.missions.len(),
            });
        }

        let mut planet_ids = std::collections::HashSet::new();
        for p in &self.planets {
            if !planet_ids.insert(p.id) {
                return Err(LoadError::DuplicateId {
                    kind: "planet",
                    id: p.id,
                });
            }
            if p.population < Fixed::ZERO {
                return Err(LoadError::InvalidField(format!(
                    "planet {} has negative population",
                    p.id
                )));
            }
        }
        let mut player_ids = std::collections::HashSet::new();
        for p in &self.players {
            if !player_ids.insert(p.id) {
                return Err(LoadError::DuplicateId {
                    kind: "player",
                    id: p.id,
                });
            }
            if p.tech_count as usize != p.technologies.len() {
                return Err(LoadError::CountMismatch {
                    kind: "technology",
                    declared: p.tech_count,
                    actual: p.technologies.len(),
                });
            }
            for t in &p.technologies {
                if t.effect_count as usize != t.effects.len() {
                    return Err(LoadError::CountMismatch {
                        kind: "technology effect",
                        declared: t.effect_count,
                        actual: t.effects.len(),
                    });
                }
            }
        }
        let mut ship_ids = std::collections::HashSet::new();
        for s in &self.ships {
            if !ship_ids.insert(s.id) {
                return Err(LoadError::DuplicateId {
                    kind: "ship",
                    id: s.id,
                });
            }
        }

        for (index, p) in self.planets.iter().enumerate() {
            if let Some(owner) = p.owner {
                if !player_ids.contains(&owner) {
                    return Err(LoadError::DanglingReference {
                        kind: "planet",
                        index,
                        target_kind: "player",
                        target: owner,
                    });
                }
            }
        }
        for (index, s) in self.ships.iter().enumerate() {
            if let Some(owner) = s.owner {
                if !player_ids.contains(&owner) {
                    return Err(LoadError::DanglingReference {
                        kind: "ship",
                        index,
                        target_kind: "player",
                        target: owner,
                    });
                }
            }
            if let Some(planet) = s.orbiting {
                if !planet_ids.contains(&planet) {
                    return Err(LoadError::DanglingReference {
                        kind: "ship",
                        index,
                        target_kind: "planet",
                        target: planet,
                    });
                }
            }
        }
        for (index, m) in self.missions.iter().enumerate() {
            for player in [m.initiator, m.target] {
                if !player_ids.contains(&player) {
                    return Err(LoadError::DanglingReference {
                        kind: "mission",
                        index,
                        target_kind: "player",
                        target: player,
                    });
                }
            }
        }
        Ok(())
    }
}
