use crate::fixed::Fixed;
use crate::state::{
    GalaxyState, PlanetId, PlanetState, PlayerId, PlayerState, TechCategory, Technology,
};

/// Builder for test galaxies. Defaults are generous so most tests only
/// declare the entities they care about.
pub struct GalaxyStateBuilder {
    state: GalaxyState,
}

impl GalaxyStateBuilder {
    pub fn new() -> Self {
        Self {
            state: GalaxyState::with_seed(42),
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.state.rng_seed = seed;
        self.state.rng_cursor = seed;
        self
    }

    pub fn with_player(mut self, id: PlayerId) -> Self {
        let mut player = PlayerState::new(id, format!("Player {id}"));
        player.funds = Fixed::from_int(1_000);
        player.metal = Fixed::from_int(500);
        player.energy = Fixed::from_int(500);
        self.state.players.insert(id, player);
        self
    }

    pub fn with_player_state(mut self, player: PlayerState) -> Self {
        self.state.players.insert(player.id, player);
        self
    }

    /// A habitable planet with a working population when owned.
    pub fn with_planet(mut self, id: PlanetId, owner: Option<PlayerId>) -> Self {
        let mut planet = PlanetState::new(
            id,
            Fixed::from_int(id as i64 * 10),
            Fixed::ZERO,
            Fixed::from_int(20),
            Fixed::ONE,
        );
        planet.owner = owner;
        if owner.is_some() {
            planet.population = Fixed::from_int(1_000);
            planet.metal = Fixed::from_int(500);
            planet.shipbuilding_level = 1;
        }
        if self.state.next_planet_id <= id {
            self.state.next_planet_id = id + 1;
        }
        self.state.planets.insert(id, planet);
        if let Some(owner) = owner {
            if let Some(player) = self.state.players.get_mut(&owner) {
                player.planets_owned.insert(id);
                player.planets_seen.insert(id);
            }
        }
        self
    }

    pub fn with_planet_state(mut self, planet: PlanetState) -> Self {
        let id = planet.id;
        let owner = planet.owner;
        if self.state.next_planet_id <= id {
            self.state.next_planet_id = id + 1;
        }
        self.state.planets.insert(id, planet);
        if let Some(owner) = owner {
            if let Some(player) = self.state.players.get_mut(&owner) {
                player.planets_owned.insert(id);
                player.planets_seen.insert(id);
            }
        }
        self
    }

    /// Give a player one technology track with a known cost.
    pub fn with_technology(
        mut self,
        player: PlayerId,
        tech_id: u32,
        category: TechCategory,
        cost: Fixed,
    ) -> Self {
        if let Some(p) = self.state.players.get_mut(&player) {
            p.technologies.insert(
                tech_id,
                Technology {
                    id: tech_id,
                    name: format!("Tech {tech_id}"),
                    category,
                    level: 0,
                    cost_to_upgrade: cost,
                    progress: Fixed::ZERO,
                    effects: vec![Fixed::from_int(2), Fixed::ONE],
                },
            );
            p.research_priorities.insert(tech_id, Fixed::ONE);
        }
        self
    }

    pub fn build(self) -> GalaxyState {
        self.state
    }
}

impl Default for GalaxyStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_planet(0, Some(0))
            .with_planet(1, None)
            .build();

        assert!(state.planets.contains_key(&0));
        assert!(state.planets.contains_key(&1));
        assert_eq!(state.planets[&0].owner, Some(0));
        assert!(state.planets[&1].owner.is_none());
        assert!(state.players[&0].planets_owned.contains(&0));
    }
}
