//! Complete simulation state: planets, ships, players, technologies,
//! missions and diplomacy, keyed by stable integer ids.
//!
//! Entities never hold references to each other. Ownership and fleet
//! membership are id fields, so a destroyed ship or an abandoned planet can
//! never leave a dangling pointer behind, only an id that lookups treat as
//! stale.

use crate::bounded::{
    new_relation, new_reputation, new_war_weariness, RelationScore, Reputation, WarWeariness,
};
use crate::fixed::Fixed;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

pub type PlanetId = u32;
pub type ShipId = u32;
pub type PlayerId = u32;
pub type TechId = u32;
pub type MissionId = u32;
pub type BattleId = u32;

/// First year of the campaign. One tick is one year.
pub const START_YEAR: i32 = 2200;

/// Number of planetary development categories.
pub const DEV_CATEGORIES: usize = 5;

/// Planetary development and allocation categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevCategory {
    Population,
    Infrastructure,
    Defense,
    Mining,
    Energy,
}

impl DevCategory {
    pub const ALL: [DevCategory; DEV_CATEGORIES] = [
        DevCategory::Population,
        DevCategory::Infrastructure,
        DevCategory::Defense,
        DevCategory::Mining,
        DevCategory::Energy,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            DevCategory::Population => 0,
            DevCategory::Infrastructure => 1,
            DevCategory::Defense => 2,
            DevCategory::Mining => 3,
            DevCategory::Energy => 4,
        }
    }
}

/// Hull classes with fixed base stat templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShipClass {
    Scout,
    Frigate,
    Destroyer,
    Freighter,
    Drone,
    Invasion,
}

/// Base stats for a hull class before upgrades and miniaturization.
#[derive(Debug, Clone, Copy)]
pub struct ShipTemplate {
    pub attack: Fixed,
    pub shields: Fixed,
    pub hull: Fixed,
    pub speed: Fixed,
    pub weapon_range: Fixed,
    pub reload: u32,
    pub metal_cost: Fixed,
    pub upkeep: Fixed,
}

impl ShipClass {
    pub const ALL: [ShipClass; 6] = [
        ShipClass::Scout,
        ShipClass::Frigate,
        ShipClass::Destroyer,
        ShipClass::Freighter,
        ShipClass::Drone,
        ShipClass::Invasion,
    ];

    pub const fn template(self) -> ShipTemplate {
        match self {
            ShipClass::Scout => ShipTemplate {
                attack: Fixed::from_int(5),
                shields: Fixed::from_int(5),
                hull: Fixed::from_int(20),
                speed: Fixed::from_int(8),
                weapon_range: Fixed::from_int(1),
                reload: 1,
                metal_cost: Fixed::from_int(40),
                upkeep: Fixed::from_int(1),
            },
            ShipClass::Frigate => ShipTemplate {
                attack: Fixed::from_int(20),
                shields: Fixed::from_int(10),
                hull: Fixed::from_int(50),
                speed: Fixed::from_int(5),
                weapon_range: Fixed::from_int(2),
                reload: 1,
                metal_cost: Fixed::from_int(100),
                upkeep: Fixed::from_int(2),
            },
            ShipClass::Destroyer => ShipTemplate {
                attack: Fixed::from_int(35),
                shields: Fixed::from_int(15),
                hull: Fixed::from_int(80),
                speed: Fixed::from_int(4),
                weapon_range: Fixed::from_int(3),
                reload: 2,
                metal_cost: Fixed::from_int(220),
                upkeep: Fixed::from_int(4),
            },
            ShipClass::Freighter => ShipTemplate {
                attack: Fixed::ZERO,
                shields: Fixed::from_int(5),
                hull: Fixed::from_int(60),
                speed: Fixed::from_int(3),
                weapon_range: Fixed::ZERO,
                reload: 0,
                metal_cost: Fixed::from_int(150),
                upkeep: Fixed::from_int(2),
            },
            ShipClass::Drone => ShipTemplate {
                attack: Fixed::from_int(10),
                shields: Fixed::ZERO,
                hull: Fixed::from_int(10),
                speed: Fixed::from_int(10),
                weapon_range: Fixed::from_int(1),
                reload: 1,
                metal_cost: Fixed::from_int(25),
                upkeep: Fixed::ONE,
            },
            ShipClass::Invasion => ShipTemplate {
                attack: Fixed::from_int(8),
                shields: Fixed::from_int(20),
                hull: Fixed::from_int(100),
                speed: Fixed::from_int(2),
                weapon_range: Fixed::from_int(1),
                reload: 2,
                metal_cost: Fixed::from_int(300),
                upkeep: Fixed::from_int(5),
            },
        }
    }

    /// Whether this class can settle an unowned planet on arrival.
    pub const fn can_colonize(self) -> bool {
        matches!(self, ShipClass::Freighter)
    }

    /// Whether this class can capture a defended planet on arrival.
    pub const fn can_invade(self) -> bool {
        matches!(self, ShipClass::Invasion)
    }
}

/// A ship's standing order. Replaced atomically, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShipOrder {
    #[default]
    Hold,
    MoveTo(PlanetId),
    Attack(ShipId),
    Defend(PlanetId),
    Colonize(PlanetId),
    Invade(PlanetId),
}

impl ShipOrder {
    /// The planet this order is steering toward, if any.
    pub fn destination(&self) -> Option<PlanetId> {
        match self {
            ShipOrder::MoveTo(p)
            | ShipOrder::Defend(p)
            | ShipOrder::Colonize(p)
            | ShipOrder::Invade(p) => Some(*p),
            ShipOrder::Hold | ShipOrder::Attack(_) => None,
        }
    }
}

/// An in-progress ship build on a planet's yard queue.
///
/// Metal is consumed when the order is enqueued; `remaining` is yard work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOrder {
    pub class: ShipClass,
    pub remaining: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanetState {
    pub id: PlanetId,
    pub x: Fixed,
    pub y: Fixed,
    /// None = uninhabited. Abandoned and conquered-to-extinction planets stay
    /// in the store with owner None.
    pub owner: Option<PlayerId>,
    pub population: Fixed,
    /// Shifted only by terraforming after creation.
    pub temperature: Fixed,
    pub gravity: Fixed,
    pub metal: Fixed,
    /// Fraction of working population devoted to each category. Sum <= 1.
    pub allocation: [Fixed; DEV_CATEGORIES],
    /// Derived per-category production from the last economy tick.
    pub income: [Fixed; DEV_CATEGORIES],
    pub terraforming_level: u32,
    pub mining_level: u32,
    pub shipbuilding_level: u32,
    pub defense_level: u32,
    pub build_queue: VecDeque<BuildOrder>,
    /// Consecutive ticks of negative net income; drives abandonment.
    pub deficit_ticks: u32,
    /// Set when the owner invests this tick; clears the deficit counter.
    pub rescued_this_tick: bool,
}

impl PlanetState {
    pub fn new(id: PlanetId, x: Fixed, y: Fixed, temperature: Fixed, gravity: Fixed) -> Self {
        Self {
            id,
            x,
            y,
            owner: None,
            population: Fixed::ZERO,
            temperature,
            gravity,
            metal: Fixed::ZERO,
            allocation: [Fixed::ZERO; DEV_CATEGORIES],
            income: [Fixed::ZERO; DEV_CATEGORIES],
            terraforming_level: 0,
            mining_level: 0,
            shipbuilding_level: 0,
            defense_level: 0,
            build_queue: VecDeque::new(),
            deficit_ticks: 0,
            rescued_this_tick: false,
        }
    }

    /// How hospitable this planet is for `player`, in [0, 1].
    ///
    /// 1.0 at the player's exact temperature and gravity preferences,
    /// falling off linearly with distance from each.
    pub fn suitability(&self, temperature_pref: Fixed, gravity_pref: Fixed) -> Fixed {
        let temp_gap = (self.temperature - temperature_pref).abs();
        let grav_gap = (self.gravity - gravity_pref).abs();
        let temp_score = (Fixed::ONE - temp_gap.div(Fixed::from_int(100))).max(Fixed::ZERO);
        let grav_score = (Fixed::ONE - grav_gap.div(Fixed::from_int(2))).max(Fixed::ZERO);
        temp_score.mul(grav_score)
    }

    /// Static defense rating used by invasion and espionage checks.
    pub fn defense_rating(&self) -> Fixed {
        Fixed::from_int(self.defense_level as i64) + self.income[DevCategory::Defense.index()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipState {
    pub id: ShipId,
    /// None = unowned, hostile to everyone (ships stranded by abandonment).
    pub owner: Option<PlayerId>,
    pub class: ShipClass,
    pub attack: Fixed,
    pub shields: Fixed,
    pub shield_max: Fixed,
    pub hull: Fixed,
    pub hull_max: Fixed,
    pub speed: Fixed,
    pub weapon_range: Fixed,
    pub reload: u32,
    pub miniaturization: u32,
    pub experience: u32,
    pub x: Fixed,
    pub y: Fixed,
    /// Set when parked at a planet; cleared while in transit.
    pub orbiting: Option<PlanetId>,
    pub order: ShipOrder,
}

impl ShipState {
    pub fn build(id: ShipId, owner: PlayerId, class: ShipClass, x: Fixed, y: Fixed) -> Self {
        let t = class.template();
        Self {
            id,
            owner: Some(owner),
            class,
            attack: t.attack,
            shields: t.shields,
            shield_max: t.shields,
            hull: t.hull,
            hull_max: t.hull,
            speed: t.speed,
            weapon_range: t.weapon_range,
            reload: 0,
            miniaturization: 0,
            experience: 0,
            x,
            y,
            orbiting: None,
            order: ShipOrder::Hold,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.hull <= Fixed::ZERO
    }

    /// Combat-ready: parked at a planet and still flying.
    pub fn is_combat_ready(&self) -> bool {
        self.orbiting.is_some() && !self.is_destroyed()
    }

    pub fn invasion_strength(&self) -> Fixed {
        self.attack + Fixed::from_int(self.experience as i64)
    }
}

/// A technology track, instanced per player so progress and levels diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technology {
    pub id: TechId,
    pub name: String,
    pub category: TechCategory,
    pub level: u32,
    /// Cost of the next level. Multiplied by 1.5 on every level-up.
    pub cost_to_upgrade: Fixed,
    pub progress: Fixed,
    /// Per-level effect magnitudes; meaning depends on category.
    pub effects: Vec<Fixed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TechCategory {
    Military,
    Economy,
    Science,
}

impl Technology {
    pub fn effect(&self, index: usize) -> Fixed {
        self.effects.get(index).copied().unwrap_or(Fixed::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub temperature_preference: Fixed,
    pub gravity_preference: Fixed,
    pub metal: Fixed,
    pub energy: Fixed,
    pub funds: Fixed,
    /// Recomputed from owned planets every economy tick. Never ground truth.
    pub total_population: Fixed,
    pub gross_income: Fixed,
    pub research_output: Fixed,
    pub planets_owned: BTreeSet<PlanetId>,
    pub ships_owned: BTreeSet<ShipId>,
    pub planets_seen: BTreeSet<PlanetId>,
    pub technologies: BTreeMap<TechId, Technology>,
    /// Research priority weight per technology; zero weight gets nothing.
    pub research_priorities: BTreeMap<TechId, Fixed>,
    /// Accumulated efficiency bonuses from economy technologies.
    pub mining_efficiency: Fixed,
    pub energy_efficiency: Fixed,
    /// Research speed multiplier bonus from science technologies.
    pub research_speed: Fixed,
    pub reputation: Reputation,
    pub war_weariness: WarWeariness,
    pub is_ai: bool,
    pub eliminated: bool,
}

impl PlayerState {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            temperature_preference: Fixed::from_int(20),
            gravity_preference: Fixed::ONE,
            metal: Fixed::ZERO,
            energy: Fixed::ZERO,
            funds: Fixed::ZERO,
            total_population: Fixed::ZERO,
            gross_income: Fixed::ZERO,
            research_output: Fixed::ZERO,
            planets_owned: BTreeSet::new(),
            ships_owned: BTreeSet::new(),
            planets_seen: BTreeSet::new(),
            technologies: BTreeMap::new(),
            research_priorities: BTreeMap::new(),
            mining_efficiency: Fixed::ZERO,
            energy_efficiency: Fixed::ZERO,
            research_speed: Fixed::ZERO,
            reputation: new_reputation(),
            war_weariness: new_war_weariness(),
            is_ai: true,
            eliminated: false,
        }
    }

    /// Crude military strength: sum of attack plus hull over owned ships.
    pub fn military_strength(&self, ships: &HashMap<ShipId, ShipState>) -> Fixed {
        let mut total = Fixed::ZERO;
        for id in &self.ships_owned {
            if let Some(ship) = ships.get(id) {
                total += ship.attack + ship.hull;
            }
        }
        total
    }
}

/// Espionage or sabotage mission in flight. Resolved exactly once at expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub kind: MissionKind,
    pub initiator: PlayerId,
    pub target: PlayerId,
    pub elapsed: u32,
    pub duration: u32,
    pub skill: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionKind {
    /// Steal a slice of the target's metal and funds.
    StealResources,
    /// Siphon research progress from the target's best technology.
    StealTechnology,
    /// Reveal the target's planets to the initiator.
    GatherIntel,
    /// Knock development levels off the target's richest planet.
    Sabotage,
}

/// Diplomatic ledger: directional scores plus explicit war and alliance sets.
///
/// "At war" is event state, not a score threshold. A pair stays at war until
/// an accepted peace even if their relationship score recovers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiplomacyState {
    /// Directional relationship score, keyed (from, to).
    pub relations: BTreeMap<(PlayerId, PlayerId), RelationScore>,
    /// Unordered pairs stored sorted (low id first).
    pub wars: BTreeSet<(PlayerId, PlayerId)>,
    pub alliances: BTreeSet<(PlayerId, PlayerId)>,
}

fn pair(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl DiplomacyState {
    pub fn relation(&self, from: PlayerId, to: PlayerId) -> i32 {
        self.relations
            .get(&(from, to))
            .map(|r| r.get())
            .unwrap_or(0)
    }

    /// Adjust the score in both directions by the same delta.
    pub fn adjust_relation(&mut self, a: PlayerId, b: PlayerId, delta: i32) {
        self.relations
            .entry((a, b))
            .or_insert_with(new_relation)
            .add(delta);
        self.relations
            .entry((b, a))
            .or_insert_with(new_relation)
            .add(delta);
    }

    /// Adjust only `from`'s opinion of `to`.
    pub fn adjust_relation_oneway(&mut self, from: PlayerId, to: PlayerId, delta: i32) {
        self.relations
            .entry((from, to))
            .or_insert_with(new_relation)
            .add(delta);
    }

    pub fn are_at_war(&self, a: PlayerId, b: PlayerId) -> bool {
        self.wars.contains(&pair(a, b))
    }

    pub fn are_allied(&self, a: PlayerId, b: PlayerId) -> bool {
        self.alliances.contains(&pair(a, b))
    }

    /// Enemy = at war, or opinion below the configured hostility threshold.
    pub fn is_enemy(&self, from: PlayerId, to: PlayerId, enemy_threshold: i32) -> bool {
        self.are_at_war(from, to) || self.relation(from, to) <= enemy_threshold
    }

    /// Declare war: breaks any alliance, persists until an accepted peace.
    pub fn declare_war(&mut self, a: PlayerId, b: PlayerId) {
        self.alliances.remove(&pair(a, b));
        self.wars.insert(pair(a, b));
    }

    pub fn sign_peace(&mut self, a: PlayerId, b: PlayerId) {
        self.wars.remove(&pair(a, b));
    }

    pub fn form_alliance(&mut self, a: PlayerId, b: PlayerId) {
        self.alliances.insert(pair(a, b));
    }

    pub fn wars_of(&self, player: PlayerId) -> Vec<PlayerId> {
        self.wars
            .iter()
            .filter_map(|&(a, b)| {
                if a == player {
                    Some(b)
                } else if b == player {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn allies_of(&self, player: PlayerId) -> Vec<PlayerId> {
        self.alliances
            .iter()
            .filter_map(|&(a, b)| {
                if a == player {
                    Some(b)
                } else if b == player {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Outcome of one resolved battle, kept for observers and replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleReport {
    pub id: BattleId,
    pub planet: PlanetId,
    pub attacker: Option<PlayerId>,
    pub defender: Option<PlayerId>,
    pub rounds: u32,
    pub outcome: BattleOutcome,
    pub attacker_losses: u32,
    pub defender_losses: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    AttackerVictory,
    DefenderVictory,
    Draw,
}

/// A story event awaiting an asynchronous player choice.
///
/// The simulation never blocks on input; the decision sits here until a
/// ResolveDecision command arrives on some later tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDecision {
    pub id: u32,
    pub player: PlayerId,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GalaxyState {
    pub tick: u64,
    pub rng_seed: u64,
    /// Current RNG cursor (must be deterministic for replay).
    pub rng_cursor: u64,
    pub planets: HashMap<PlanetId, PlanetState>,
    pub next_planet_id: u32,
    pub ships: HashMap<ShipId, ShipState>,
    pub next_ship_id: u32,
    pub players: HashMap<PlayerId, PlayerState>,
    pub missions: HashMap<MissionId, Mission>,
    pub next_mission_id: u32,
    pub next_battle_id: u32,
    pub next_decision_id: u32,
    pub diplomacy: DiplomacyState,
    pub pending_decisions: Vec<PendingDecision>,
    /// Battles resolved this tick. Cleared at the start of every step.
    pub battle_reports: Vec<BattleReport>,
    pub winner: Option<PlayerId>,
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl GalaxyState {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng_seed: seed,
            rng_cursor: seed,
            ..Default::default()
        }
    }

    pub fn year(&self) -> i32 {
        START_YEAR + self.tick as i32
    }

    /// Draw the next value from the deterministic RNG stream.
    ///
    /// Every consumer draws from this single cursor, so the sequence of
    /// random decisions is a pure function of seed and call order.
    pub fn draw_rng(&mut self) -> u64 {
        self.rng_cursor = splitmix64(self.rng_cursor);
        self.rng_cursor
    }

    pub fn sorted_planet_ids(&self) -> Vec<PlanetId> {
        let mut ids: Vec<_> = self.planets.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn sorted_ship_ids(&self) -> Vec<ShipId> {
        let mut ids: Vec<_> = self.ships.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn sorted_player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn sorted_mission_ids(&self) -> Vec<MissionId> {
        let mut ids: Vec<_> = self.missions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn add_planet(&mut self, mut planet: PlanetState) -> PlanetId {
        let id = self.next_planet_id;
        self.next_planet_id += 1;
        planet.id = id;
        self.planets.insert(id, planet);
        id
    }

    /// Spawn a freshly built ship in orbit of `planet`, owned by `owner`.
    ///
    /// New hulls come off the yard at the owner's current miniaturization
    /// level (best military technology), which stiffens the frame a bit.
    pub fn spawn_ship(&mut self, owner: PlayerId, class: ShipClass, planet: PlanetId) -> ShipId {
        let id = self.next_ship_id;
        self.next_ship_id += 1;
        let (x, y) = self
            .planets
            .get(&planet)
            .map(|p| (p.x, p.y))
            .unwrap_or((Fixed::ZERO, Fixed::ZERO));
        let mut ship = ShipState::build(id, owner, class, x, y);
        ship.orbiting = Some(planet);
        let miniaturization = self
            .players
            .get(&owner)
            .map(|p| {
                p.technologies
                    .values()
                    .filter(|t| t.category == TechCategory::Military)
                    .map(|t| t.level)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        ship.miniaturization = miniaturization;
        let frame_bonus = Fixed::from_int(2 * miniaturization as i64);
        ship.hull_max += frame_bonus;
        ship.hull += frame_bonus;
        self.ships.insert(id, ship);
        if let Some(player) = self.players.get_mut(&owner) {
            player.ships_owned.insert(id);
        }
        id
    }

    /// Remove a destroyed ship from the store and its owner's roster.
    pub fn remove_ship(&mut self, id: ShipId) {
        if let Some(ship) = self.ships.remove(&id) {
            if let Some(owner) = ship.owner {
                if let Some(player) = self.players.get_mut(&owner) {
                    player.ships_owned.remove(&id);
                }
            }
        }
    }

    /// Transfer planet ownership, keeping both players' sets consistent.
    pub fn set_planet_owner(&mut self, planet_id: PlanetId, new_owner: Option<PlayerId>) {
        let old_owner = match self.planets.get_mut(&planet_id) {
            Some(planet) => {
                let old = planet.owner;
                planet.owner = new_owner;
                old
            }
            None => return,
        };
        if let Some(old) = old_owner {
            if let Some(player) = self.players.get_mut(&old) {
                player.planets_owned.remove(&planet_id);
            }
        }
        if let Some(new) = new_owner {
            if let Some(player) = self.players.get_mut(&new) {
                player.planets_owned.insert(planet_id);
                player.planets_seen.insert(planet_id);
            }
        }
    }

    /// Compute a deterministic checksum of the whole state.
    ///
    /// Used for desync detection and replay validation. Identical states
    /// produce identical checksums; iteration is over sorted ids so HashMap
    /// ordering cannot leak in.
    pub fn checksum(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.rng_cursor.hash(&mut hasher);

        for id in self.sorted_planet_ids() {
            let p = &self.planets[&id];
            id.hash(&mut hasher);
            p.owner.hash(&mut hasher);
            p.population.0.hash(&mut hasher);
            p.temperature.0.hash(&mut hasher);
            p.gravity.0.hash(&mut hasher);
            p.metal.0.hash(&mut hasher);
            for a in &p.allocation {
                a.0.hash(&mut hasher);
            }
            p.terraforming_level.hash(&mut hasher);
            p.mining_level.hash(&mut hasher);
            p.shipbuilding_level.hash(&mut hasher);
            p.defense_level.hash(&mut hasher);
            p.deficit_ticks.hash(&mut hasher);
            for order in &p.build_queue {
                order.class.hash(&mut hasher);
                order.remaining.0.hash(&mut hasher);
            }
        }

        for id in self.sorted_ship_ids() {
            let s = &self.ships[&id];
            id.hash(&mut hasher);
            s.owner.hash(&mut hasher);
            s.class.hash(&mut hasher);
            s.attack.0.hash(&mut hasher);
            s.shields.0.hash(&mut hasher);
            s.hull.0.hash(&mut hasher);
            s.x.0.hash(&mut hasher);
            s.y.0.hash(&mut hasher);
            s.orbiting.hash(&mut hasher);
            s.order.hash(&mut hasher);
            s.experience.hash(&mut hasher);
        }

        for id in self.sorted_player_ids() {
            let p = &self.players[&id];
            id.hash(&mut hasher);
            p.name.hash(&mut hasher);
            p.metal.0.hash(&mut hasher);
            p.energy.0.hash(&mut hasher);
            p.funds.0.hash(&mut hasher);
            p.total_population.0.hash(&mut hasher);
            p.reputation.get().hash(&mut hasher);
            p.war_weariness.get().hash(&mut hasher);
            p.eliminated.hash(&mut hasher);
            for (tech_id, tech) in &p.technologies {
                tech_id.hash(&mut hasher);
                tech.level.hash(&mut hasher);
                tech.progress.0.hash(&mut hasher);
            }
        }

        for id in self.sorted_mission_ids() {
            let m = &self.missions[&id];
            id.hash(&mut hasher);
            m.kind.hash(&mut hasher);
            m.initiator.hash(&mut hasher);
            m.target.hash(&mut hasher);
            m.elapsed.hash(&mut hasher);
        }

        for (key, score) in &self.diplomacy.relations {
            key.hash(&mut hasher);
            score.get().hash(&mut hasher);
        }
        for war in &self.diplomacy.wars {
            war.hash(&mut hasher);
        }
        for alliance in &self.diplomacy.alliances {
            alliance.hash(&mut hasher);
        }

        self.winner.hash(&mut hasher);

        hasher.finish()
    }

    /// All player ids present at a planet with combat-ready ships.
    pub fn fleet_owners_at(&self, planet: PlanetId) -> Vec<Option<PlayerId>> {
        let mut owners: HashSet<Option<PlayerId>> = HashSet::new();
        for ship in self.ships.values() {
            if ship.orbiting == Some(planet) && ship.is_combat_ready() {
                owners.insert(ship.owner);
            }
        }
        let mut list: Vec<_> = owners.into_iter().collect();
        list.sort_unstable();
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GalaxyStateBuilder;

    #[test]
    fn test_year_advances_with_tick() {
        let mut state = GalaxyState::with_seed(1);
        assert_eq!(state.year(), START_YEAR);
        state.tick = 12;
        assert_eq!(state.year(), START_YEAR + 12);
    }

    #[test]
    fn test_rng_stream_is_deterministic() {
        let mut a = GalaxyState::with_seed(99);
        let mut b = GalaxyState::with_seed(99);
        for _ in 0..16 {
            assert_eq!(a.draw_rng(), b.draw_rng());
        }
        let mut c = GalaxyState::with_seed(100);
        assert_ne!(a.draw_rng(), c.draw_rng());
    }

    #[test]
    fn test_planet_owner_transfer_keeps_sets_consistent() {
        let mut state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_player(1)
            .with_planet(0, Some(0))
            .build();

        state.set_planet_owner(0, Some(1));

        assert!(!state.players[&0].planets_owned.contains(&0));
        assert!(state.players[&1].planets_owned.contains(&0));
        assert_eq!(state.planets[&0].owner, Some(1));
    }

    #[test]
    fn test_remove_ship_updates_owner_roster() {
        let mut state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_planet(0, Some(0))
            .build();
        let ship = state.spawn_ship(0, ShipClass::Frigate, 0);
        assert!(state.players[&0].ships_owned.contains(&ship));

        state.remove_ship(ship);
        assert!(!state.players[&0].ships_owned.contains(&ship));
        assert!(!state.ships.contains_key(&ship));
    }

    #[test]
    fn test_war_persists_until_peace() {
        let mut diplo = DiplomacyState::default();
        diplo.declare_war(2, 1);
        assert!(diplo.are_at_war(1, 2));

        // Score recovery alone must not end the war
        diplo.adjust_relation(1, 2, 200);
        assert!(diplo.are_at_war(1, 2));

        diplo.sign_peace(1, 2);
        assert!(!diplo.are_at_war(1, 2));
    }

    #[test]
    fn test_war_breaks_alliance() {
        let mut diplo = DiplomacyState::default();
        diplo.form_alliance(1, 2);
        assert!(diplo.are_allied(1, 2));

        diplo.declare_war(1, 2);
        assert!(!diplo.are_allied(1, 2));
        assert!(diplo.are_at_war(1, 2));
    }

    #[test]
    fn test_suitability_peaks_at_preference() {
        let planet = PlanetState::new(
            0,
            Fixed::ZERO,
            Fixed::ZERO,
            Fixed::from_int(20),
            Fixed::ONE,
        );
        let perfect = planet.suitability(Fixed::from_int(20), Fixed::ONE);
        let off = planet.suitability(Fixed::from_int(60), Fixed::ONE);
        assert_eq!(perfect, Fixed::ONE);
        assert!(off < perfect);
    }

    #[test]
    fn test_checksum_determinism() {
        let state = GalaxyStateBuilder::new()
            .with_player(0)
            .with_planet(0, Some(0))
            .build();
        assert_eq!(state.checksum(), state.checksum());
    }

    #[test]
    fn test_checksum_sensitivity() {
        let state1 = GalaxyStateBuilder::new().with_player(0).build();
        let mut state2 = GalaxyStateBuilder::new().with_player(0).build();
        state2.players.get_mut(&0).unwrap().funds += Fixed::ONE;
        assert_ne!(state1.checksum(), state2.checksum());
    }
}
