//! The tick: state in, state out.
//!
//! `step_galaxy` is a pure function. Commands are validated and applied in
//! stable player order, then the systems run in a fixed sequence. A
//! rejected command is logged and dropped; expected failures (broke, wrong
//! owner, stale target) never panic and never abort the tick.

use crate::config::SimConfig;
use crate::events::{apply_events, EventTrigger};
use crate::fixed::Fixed;
use crate::input::{Command, PlayerInputs, TradeOffer};
use crate::state::{
    BuildOrder, DevCategory, GalaxyState, MissionKind, PlanetId, PlayerId, ShipClass, ShipId,
    ShipOrder, TechId, DEV_CATEGORIES,
};
use crate::systems;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Fixed, available: Fixed },
    #[error("insufficient metal: required {required}, available {available}")]
    InsufficientMetal { required: Fixed, available: Fixed },
    #[error("{kind} {id} not found")]
    UnknownEntity { kind: &'static str, id: u32 },
    #[error("player {player} does not control {kind} {id}")]
    NotOwner {
        player: PlayerId,
        kind: &'static str,
        id: u32,
    },
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("proposal rejected")]
    ProposalRejected,
}

/// Advance the galaxy by one tick.
pub fn step_galaxy(
    state: &GalaxyState,
    inputs: &[PlayerInputs],
    events: &[EventTrigger],
    config: &SimConfig,
) -> GalaxyState {
    let mut new_state = state.clone();
    new_state.tick = state.tick + 1;
    new_state.battle_reports.clear();

    // Apply commands in stable player id order so simultaneous orders
    // resolve identically on every run.
    let mut ordered: Vec<&PlayerInputs> = inputs.iter().collect();
    ordered.sort_by_key(|i| i.player);
    for player_input in ordered {
        for cmd in &player_input.commands {
            if let Err(e) = execute_command(&mut new_state, player_input.player, cmd, config) {
                log::warn!(
                    "rejected command from player {}: {} ({:?})",
                    player_input.player,
                    e,
                    cmd
                );
            }
        }
    }

    systems::run_economy_tick(&mut new_state, config);
    systems::run_research_tick(&mut new_state);
    systems::run_movement_tick(&mut new_state);
    systems::run_combat_tick(&mut new_state, config);
    systems::run_diplomacy_tick(&mut new_state, config);
    systems::run_espionage_tick(&mut new_state);
    apply_events(&mut new_state, events);

    new_state
}

fn owned_ship(
    state: &GalaxyState,
    player: PlayerId,
    ship: ShipId,
) -> Result<(), ActionError> {
    let s = state.ships.get(&ship).ok_or(ActionError::UnknownEntity {
        kind: "ship",
        id: ship,
    })?;
    if s.owner != Some(player) {
        return Err(ActionError::NotOwner {
            player,
            kind: "ship",
            id: ship,
        });
    }
    Ok(())
}

fn owned_planet(
    state: &GalaxyState,
    player: PlayerId,
    planet: PlanetId,
) -> Result<(), ActionError> {
    let p = state.planets.get(&planet).ok_or(ActionError::UnknownEntity {
        kind: "planet",
        id: planet,
    })?;
    if p.owner != Some(player) {
        return Err(ActionError::NotOwner {
            player,
            kind: "planet",
            id: planet,
        });
    }
    Ok(())
}

/// Validate and apply a single command.
pub fn execute_command(
    state: &mut GalaxyState,
    player: PlayerId,
    cmd: &Command,
    config: &SimConfig,
) -> Result<(), ActionError> {
    if !state.players.contains_key(&player) {
        return Err(ActionError::UnknownEntity {
            kind: "player",
            id: player,
        });
    }
    match cmd {
        Command::Colonize { planet, ship } => colonize(state, player, *planet, *ship),
        Command::Invest {
            planet,
            category,
            amount,
        } => invest(state, player, *planet, *category, *amount, config),
        Command::SetAllocation { planet, allocation } => {
            set_allocation(state, player, *planet, allocation)
        }
        Command::BuildShip { planet, class } => build_ship(state, player, *planet, *class),
        Command::MoveFleet { ships, target } => move_fleet(state, player, ships, *target),
        Command::AttackTarget { ship, target } => attack_target(state, player, *ship, *target),
        Command::Invade { ship, planet } => invade(state, player, *ship, *planet),
        Command::ProposeTrade { to, offer } => propose_trade(state, player, *to, offer),
        Command::ProposeAlliance { to } => propose_alliance(state, player, *to, config),
        Command::ProposePeace { to } => propose_peace(state, player, *to, config),
        Command::DeclareWar { target } => declare_war(state, player, *target),
        Command::LaunchMission { target, kind } => launch_mission(state, player, *target, *kind),
        Command::SetResearchPriority { tech, priority } => {
            set_research_priority(state, player, *tech, *priority)
        }
        Command::ResolveDecision { decision, choice } => {
            resolve_decision(state, player, *decision, *choice)
        }
        Command::Pass => Ok(()),
    }
}

fn colonize(
    state: &mut GalaxyState,
    player: PlayerId,
    planet: PlanetId,
    ship: ShipId,
) -> Result<(), ActionError> {
    owned_ship(state, player, ship)?;
    let p = state.planets.get(&planet).ok_or(ActionError::UnknownEntity {
        kind: "planet",
        id: planet,
    })?;
    if p.owner.is_some() {
        return Err(ActionError::InvalidTarget(format!(
            "planet {planet} is already colonized"
        )));
    }
    let s = state.ships.get_mut(&ship).expect("checked above");
    if !s.class.can_colonize() {
        return Err(ActionError::InvalidTarget(format!(
            "{:?} cannot carry colonists",
            s.class
        )));
    }
    s.order = ShipOrder::Colonize(planet);
    Ok(())
}

/// Buy one development level. Metal comes from the planet's own stock and
/// the cost grows linearly with the current level, so late levels return
/// less per unit spent.
fn invest(
    state: &mut GalaxyState,
    player: PlayerId,
    planet: PlanetId,
    category: DevCategory,
    amount: Fixed,
    config: &SimConfig,
) -> Result<(), ActionError> {
    owned_planet(state, player, planet)?;
    let temperature_pref = state
        .players
        .get(&player)
        .map(|p| p.temperature_preference)
        .unwrap_or(Fixed::ZERO);
    let p = state.planets.get_mut(&planet).expect("checked above");

    let level = match category {
        DevCategory::Population => 0,
        DevCategory::Infrastructure => p.shipbuilding_level,
        DevCategory::Defense => p.defense_level,
        DevCategory::Mining => p.mining_level,
        DevCategory::Energy => p.terraforming_level,
    };
    let cost = config
        .invest_base_cost
        .mul(Fixed::ONE + Fixed::HALF.mul(Fixed::from_int(level as i64)));
    if amount < cost {
        return Err(ActionError::InsufficientMetal {
            required: cost,
            available: amount,
        });
    }
    if p.metal < cost {
        return Err(ActionError::InsufficientMetal {
            required: cost,
            available: p.metal,
        });
    }

    p.metal -= cost;
    p.rescued_this_tick = true;
    match category {
        DevCategory::Population => {
            // Direct settlement program: metal becomes people
            p.population += cost.div(Fixed::from_int(2));
        }
        DevCategory::Infrastructure => p.shipbuilding_level += 1,
        DevCategory::Defense => p.defense_level += 1,
        DevCategory::Mining => p.mining_level += 1,
        DevCategory::Energy => {
            p.terraforming_level += 1;
            // Terraforming nudges the climate toward the owner's ideal
            let shift =
                (temperature_pref - p.temperature).clamp(Fixed::from_int(-2), Fixed::from_int(2));
            p.temperature += shift;
        }
    }
    Ok(())
}

fn set_allocation(
    state: &mut GalaxyState,
    player: PlayerId,
    planet: PlanetId,
    allocation: &[Fixed; DEV_CATEGORIES],
) -> Result<(), ActionError> {
    owned_planet(state, player, planet)?;
    let total: Fixed = allocation.iter().fold(Fixed::ZERO, |a, &b| a + b);
    if total > Fixed::ONE || allocation.iter().any(|&a| a < Fixed::ZERO) {
        return Err(ActionError::InvalidTarget(format!(
            "allocation fractions must be non-negative and sum to at most 1, got {total}"
        )));
    }
    let p = state.planets.get_mut(&planet).expect("checked above");
    p.allocation = *allocation;
    Ok(())
}

/// Enqueue a hull. Metal is consumed up front; a queue entry never fails
/// later for lack of funds.
fn build_ship(
    state: &mut GalaxyState,
    player: PlayerId,
    planet: PlanetId,
    class: ShipClass,
) -> Result<(), ActionError> {
    owned_planet(state, player, planet)?;
    let p = state.planets.get_mut(&planet).expect("checked above");
    if p.shipbuilding_level == 0 {
        return Err(ActionError::InvalidTarget(format!(
            "planet {planet} has no shipyard"
        )));
    }
    let cost = class.template().metal_cost;
    if p.metal < cost {
        return Err(ActionError::InsufficientMetal {
            required: cost,
            available: p.metal,
        });
    }
    p.metal -= cost;
    p.build_queue.push_back(BuildOrder {
        class,
        remaining: cost,
    });
    Ok(())
}

fn move_fleet(
    state: &mut GalaxyState,
    player: PlayerId,
    ships: &[ShipId],
    target: PlanetId,
) -> Result<(), ActionError> {
    if !state.planets.contains_key(&target) {
        return Err(ActionError::UnknownEntity {
            kind: "planet",
            id: target,
        });
    }
    // Partial fleets are fine: ships the player lost since issuing the
    // order are skipped, not fatal.
    let mut moved = 0;
    for &ship_id in ships {
        if owned_ship(state, player, ship_id).is_ok() {
            let ship = state.ships.get_mut(&ship_id).expect("checked above");
            ship.order = ShipOrder::MoveTo(target);
            moved += 1;
        }
    }
    if moved == 0 {
        return Err(ActionError::InvalidTarget(
            "no ships in the fleet are controllable".into(),
        ));
    }
    Ok(())
}

fn attack_target(
    state: &mut GalaxyState,
    player: PlayerId,
    ship: ShipId,
    target: ShipId,
) -> Result<(), ActionError> {
    owned_ship(state, player, ship)?;
    let target_owner = state
        .ships
        .get(&target)
        .ok_or(ActionError::UnknownEntity {
            kind: "ship",
            id: target,
        })?
        .owner;
    if target_owner == Some(player) {
        return Err(ActionError::InvalidTarget("cannot attack own ship".into()));
    }
    let s = state.ships.get_mut(&ship).expect("checked above");
    s.order = ShipOrder::Attack(target);
    Ok(())
}

fn invade(
    state: &mut GalaxyState,
    player: PlayerId,
    ship: ShipId,
    planet: PlanetId,
) -> Result<(), ActionError> {
    owned_ship(state, player, ship)?;
    let p = state.planets.get(&planet).ok_or(ActionError::UnknownEntity {
        kind: "planet",
        id: planet,
    })?;
    if p.owner == Some(player) {
        return Err(ActionError::InvalidTarget("cannot invade own planet".into()));
    }
    let s = state.ships.get_mut(&ship).expect("checked above");
    if !s.class.can_invade() {
        return Err(ActionError::InvalidTarget(format!(
            "{:?} carries no invasion force",
            s.class
        )));
    }
    s.order = ShipOrder::Invade(planet);
    Ok(())
}

/// Trades resolve immediately: the receiver's pure evaluator accepts or
/// rejects, and acceptance moves resources both ways.
fn propose_trade(
    state: &mut GalaxyState,
    player: PlayerId,
    to: PlayerId,
    offer: &TradeOffer,
) -> Result<(), ActionError> {
    if !state.players.contains_key(&to) || to == player {
        return Err(ActionError::UnknownEntity { kind: "player", id: to });
    }
    let proposer = &state.players[&player];
    if proposer.metal < offer.metal_offer || proposer.energy < offer.energy_offer {
        return Err(ActionError::InsufficientMetal {
            required: offer.metal_offer,
            available: proposer.metal,
        });
    }
    let acceptor = &state.players[&to];
    if acceptor.metal < offer.metal_request || acceptor.energy < offer.energy_request {
        return Err(ActionError::ProposalRejected);
    }
    if !systems::diplomacy::evaluate_trade_offer(state, to, player, offer) {
        return Err(ActionError::ProposalRejected);
    }
    systems::diplomacy::complete_trade(state, player, to, offer);
    Ok(())
}

fn propose_alliance(
    state: &mut GalaxyState,
    player: PlayerId,
    to: PlayerId,
    config: &SimConfig,
) -> Result<(), ActionError> {
    if !state.players.contains_key(&to) || to == player {
        return Err(ActionError::UnknownEntity { kind: "player", id: to });
    }
    if !systems::diplomacy::evaluate_alliance_proposal(state, to, player, config) {
        return Err(ActionError::ProposalRejected);
    }
    systems::diplomacy::form_alliance(state, player, to);
    Ok(())
}

fn propose_peace(
    state: &mut GalaxyState,
    player: PlayerId,
    to: PlayerId,
    config: &SimConfig,
) -> Result<(), ActionError> {
    if !state.players.contains_key(&to) || to == player {
        return Err(ActionError::UnknownEntity { kind: "player", id: to });
    }
    if !systems::diplomacy::evaluate_peace_proposal(state, to, player, config) {
        return Err(ActionError::ProposalRejected);
    }
    systems::diplomacy::sign_peace(state, player, to);
    Ok(())
}

fn declare_war(
    state: &mut GalaxyState,
    player: PlayerId,
    target: PlayerId,
) -> Result<(), ActionError> {
    if !state.players.contains_key(&target) || target == player {
        return Err(ActionError::UnknownEntity {
            kind: "player",
            id: target,
        });
    }
    if state.diplomacy.are_at_war(player, target) {
        return Err(ActionError::InvalidTarget("already at war".into()));
    }
    systems::diplomacy::declare_war(state, player, target);
    Ok(())
}

fn launch_mission(
    state: &mut GalaxyState,
    player: PlayerId,
    target: PlayerId,
    kind: MissionKind,
) -> Result<(), ActionError> {
    if !state.players.contains_key(&target) || target == player {
        return Err(ActionError::UnknownEntity {
            kind: "player",
            id: target,
        });
    }
    systems::launch_mission(state, player, target, kind);
    Ok(())
}

fn set_research_priority(
    state: &mut GalaxyState,
    player: PlayerId,
    tech: TechId,
    priority: Fixed,
) -> Result<(), ActionError> {
    let p = state.players.get_mut(&player).expect("checked above");
    if !p.technologies.contains_key(&tech) {
        return Err(ActionError::UnknownEntity {
            kind: "technology",
            id: tech,
        });
    }
    p.research_priorities.insert(tech, priority.max(Fixed::ZERO));
    Ok(())
}

/// Resolve a queued story decision. The choice index selects a canned
/// effect; unknown decisions and foreign decisions are rejected.
fn resolve_decision(
    state: &mut GalaxyState,
    player: PlayerId,
    decision: u32,
    choice: u32,
) -> Result<(), ActionError> {
    let idx = state
        .pending_decisions
        .iter()
        .position(|d| d.id == decision)
        .ok_or(ActionError::UnknownEntity {
            kind: "decision",
            id: decision,
        })?;
    if state.pending_decisions[idx].player != player {
        return Err(ActionError::NotOwner {
            player,
            kind: "decision",
            id: decision,
        });
    }
    if choice as usize >= state.pending_decisions[idx].options.len() {
        return Err(ActionError::InvalidTarget(format!(
            "decision {decision} has no option {choice}"
        )));
    }
    state.pending_decisions.remove(idx);
    // First option is always the bold one: a funds reward with a small
    // reputation risk. Any other option is declining safely.
    if choice == 0 {
        if let Some(p) = state.players.get_mut(&player) {
            p.funds += Fixed::from_int(100);
            p.reputation.add(-1);
        }
    }
    log::info!(
        "player {player} resolved decision {decision} with option {choice}"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GalaxyStateBuilder;

    fn base_world() -> GalaxyState {
        GalaxyStateBuilder::new()
            .with_player(0)
            .with_player(1)
            .with_planet(0, Some(0))
            .with_planet(1, Some(1))
            .with_planet(2, None)
            .build()
    }

    #[test]
    fn test_step_advances_tick() {
        let state = base_world();
        let next = step_galaxy(&state, &[], &[], &SimConfig::default());
        assert_eq!(next.tick, state.tick + 1);
    }

    #[test]
    fn test_step_is_deterministic() {
        let state = base_world();
        let inputs = vec![PlayerInputs {
            player: 0,
            commands: vec![Command::BuildShip {
                planet: 0,
                class: ShipClass::Scout,
            }],
        }];
        let config = SimConfig::default();

        let a = step_galaxy(&state, &inputs, &[], &config);
        let b = step_galaxy(&state, &inputs, &[], &config);
        assert_eq!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_rejected_command_is_silent_noop() {
        let state = base_world();
        let inputs = vec![PlayerInputs {
            player: 0,
            commands: vec![
                // Not our planet
                Command::BuildShip {
                    planet: 1,
                    class: ShipClass::Scout,
                },
                // Unknown planet
                Command::Invest {
                    planet: 99,
                    category: DevCategory::Mining,
                    amount: Fixed::from_int(100),
                },
            ],
        }];

        // Must not panic; foreign planet untouched
        let next = step_galaxy(&state, &inputs, &[], &SimConfig::default());
        assert!(next.planets[&1].build_queue.is_empty());
    }

    #[test]
    fn test_build_ship_charges_metal_up_front() {
        let mut state = base_world();
        let cost = ShipClass::Frigate.template().metal_cost;
        let before = state.planets[&0].metal;

        execute_command(
            &mut state,
            0,
            &Command::BuildShip {
                planet: 0,
                class: ShipClass::Frigate,
            },
            &SimConfig::default(),
        )
        .unwrap();

        assert_eq!(state.planets[&0].metal, before - cost);
        assert_eq!(state.planets[&0].build_queue.len(), 1);
    }

    #[test]
    fn test_build_ship_rejected_without_metal() {
        let mut state = base_world();
        state.planets.get_mut(&0).unwrap().metal = Fixed::from_int(10);

        let result = execute_command(
            &mut state,
            0,
            &Command::BuildShip {
                planet: 0,
                class: ShipClass::Destroyer,
            },
            &SimConfig::default(),
        );

        assert!(matches!(
            result,
            Err(ActionError::InsufficientMetal { .. })
        ));
        assert!(state.planets[&0].build_queue.is_empty());
    }

    #[test]
    fn test_invest_raises_level_and_marks_rescue() {
        let mut state = base_world();

        execute_command(
            &mut state,
            0,
            &Command::Invest {
                planet: 0,
                category: DevCategory::Mining,
                amount: Fixed::from_int(100),
            },
            &SimConfig::default(),
        )
        .unwrap();

        let planet = &state.planets[&0];
        assert_eq!(planet.mining_level, 1);
        assert!(planet.rescued_this_tick);
        assert_eq!(planet.metal, Fixed::from_int(400));
    }

    #[test]
    fn test_invest_cost_grows_with_level() {
        let mut state = base_world();
        state.planets.get_mut(&0).unwrap().mining_level = 2;
        let config = SimConfig::default();

        // Level 2 costs 100 × (1 + 0.5×2) = 200
        let too_little = execute_command(
            &mut state,
            0,
            &Command::Invest {
                planet: 0,
                category: DevCategory::Mining,
                amount: Fixed::from_int(150),
            },
            &config,
        );
        assert!(too_little.is_err());

        execute_command(
            &mut state,
            0,
            &Command::Invest {
                planet: 0,
                category: DevCategory::Mining,
                amount: Fixed::from_int(200),
            },
            &config,
        )
        .unwrap();
        assert_eq!(state.planets[&0].mining_level, 3);
    }

    #[test]
    fn test_allocation_must_sum_to_at_most_one() {
        let mut state = base_world();
        let mut allocation = [Fixed::ZERO; DEV_CATEGORIES];
        allocation[0] = Fixed::from_f32(0.6);
        allocation[1] = Fixed::from_f32(0.6);

        let result = execute_command(
            &mut state,
            0,
            &Command::SetAllocation {
                planet: 0,
                allocation,
            },
            &SimConfig::default(),
        );
        assert!(result.is_err());

        allocation[1] = Fixed::from_f32(0.4);
        execute_command(
            &mut state,
            0,
            &Command::SetAllocation {
                planet: 0,
                allocation,
            },
            &SimConfig::default(),
        )
        .unwrap();
        assert_eq!(state.planets[&0].allocation[0], Fixed::from_f32(0.6));
    }

    #[test]
    fn test_colonize_sets_ship_order() {
        let mut state = base_world();
        let ship = state.spawn_ship(0, ShipClass::Freighter, 0);

        execute_command(
            &mut state,
            0,
            &Command::Colonize { planet: 2, ship },
            &SimConfig::default(),
        )
        .unwrap();

        assert_eq!(state.ships[&ship].order, ShipOrder::Colonize(2));
    }

    #[test]
    fn test_colonize_rejects_owned_planet() {
        let mut state = base_world();
        let ship = state.spawn_ship(0, ShipClass::Freighter, 0);

        let result = execute_command(
            &mut state,
            0,
            &Command::Colonize { planet: 1, ship },
            &SimConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_move_fleet_skips_lost_ships() {
        let mut state = base_world();
        let mine = state.spawn_ship(0, ShipClass::Scout, 0);
        let theirs = state.spawn_ship(1, ShipClass::Scout, 1);

        execute_command(
            &mut state,
            0,
            &Command::MoveFleet {
                ships: vec![mine, theirs, 999],
                target: 2,
            },
            &SimConfig::default(),
        )
        .unwrap();

        assert_eq!(state.ships[&mine].order, ShipOrder::MoveTo(2));
        assert_eq!(state.ships[&theirs].order, ShipOrder::Hold);
    }

    #[test]
    fn test_trade_command_resolves_immediately() {
        let mut state = base_world();
        let offer = TradeOffer {
            metal_offer: Fixed::from_int(100),
            energy_offer: Fixed::ZERO,
            metal_request: Fixed::from_int(20),
            energy_request: Fixed::ZERO,
        };

        execute_command(
            &mut state,
            0,
            &Command::ProposeTrade { to: 1, offer },
            &SimConfig::default(),
        )
        .unwrap();

        assert_eq!(state.players[&0].metal, Fixed::from_int(420));
        assert_eq!(state.players[&1].metal, Fixed::from_int(580));
    }

    #[test]
    fn test_war_then_peace_round_trip() {
        let mut state = base_world();
        let config = SimConfig::default();

        execute_command(&mut state, 0, &Command::DeclareWar { target: 1 }, &config).unwrap();
        assert!(state.diplomacy.are_at_war(0, 1));

        // Target is not worn down yet; peace is refused
        let refused = execute_command(&mut state, 0, &Command::ProposePeace { to: 1 }, &config);
        assert!(matches!(refused, Err(ActionError::ProposalRejected)));

        state
            .players
            .get_mut(&1)
            .unwrap()
            .war_weariness
            .set(config.peace_weariness_threshold);
        execute_command(&mut state, 0, &Command::ProposePeace { to: 1 }, &config).unwrap();
        assert!(!state.diplomacy.are_at_war(0, 1));
    }

    #[test]
    fn test_resolve_decision_consumes_pending() {
        let mut state = base_world();
        state.pending_decisions.push(crate::state::PendingDecision {
            id: 7,
            player: 0,
            prompt: "Salvage the derelict?".into(),
            options: vec!["Yes".into(), "No".into()],
        });
        let funds_before = state.players[&0].funds;

        // Wrong player cannot answer
        let foreign = execute_command(
            &mut state,
            1,
            &Command::ResolveDecision {
                decision: 7,
                choice: 0,
            },
            &SimConfig::default(),
        );
        assert!(foreign.is_err());

        execute_command(
            &mut state,
            0,
            &Command::ResolveDecision {
                decision: 7,
                choice: 0,
            },
            &SimConfig::default(),
        )
        .unwrap();

        assert!(state.pending_decisions.is_empty());
        assert!(state.players[&0].funds > funds_before);
    }
}
