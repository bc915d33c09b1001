//! Diplomatic relations: score drift, proposal evaluation and the
//! symmetric state changes acceptance triggers.
//!
//! The evaluators are pure functions of current state, so the same offer
//! against the same state always gets the same answer. Human and AI
//! proposals go through identical evaluation; there is no privileged path.

use crate::config::SimConfig;
use crate::fixed::Fixed;
use crate::input::TradeOffer;
use crate::state::{GalaxyState, PlayerId};
use tracing::instrument;

/// Relationship cost of declaring war.
const WAR_RELATION_PENALTY: i32 = -60;

/// Relationship gained by a completed trade.
const TRADE_RELATION_BONUS: i32 = 10;

/// Relationship gained by forming an alliance.
const ALLIANCE_RELATION_BONUS: i32 = 20;

/// Runs passive diplomacy updates: relation decay toward neutral and war
/// weariness accrual.
#[instrument(skip_all, name = "diplomacy")]
pub fn run_diplomacy_tick(state: &mut GalaxyState, config: &SimConfig) {
    let player_ids = state.sorted_player_ids();

    for &a in &player_ids {
        for &b in &player_ids {
            if a == b {
                continue;
            }
            if let Some(score) = state.diplomacy.relations.get_mut(&(a, b)) {
                score.decay_toward(0, config.relation_decay);
            }
        }
    }

    for &id in &player_ids {
        let at_war = !state.diplomacy.wars_of(id).is_empty();
        if let Some(player) = state.players.get_mut(&id) {
            if at_war {
                player.war_weariness.add(config.weariness_per_war_tick);
            } else {
                player.war_weariness.decay_toward(0, config.weariness_per_war_tick);
            }
        }
    }
}

/// Would `evaluator` accept this trade?
///
/// A trade is acceptable when it nets out favorably, or close to even with
/// a partner the evaluator likes.
pub fn evaluate_trade_offer(
    state: &GalaxyState,
    evaluator: PlayerId,
    proposer: PlayerId,
    offer: &TradeOffer,
) -> bool {
    if state.diplomacy.are_at_war(evaluator, proposer) {
        return false;
    }
    let gain = offer.metal_offer + offer.energy_offer;
    let cost = offer.metal_request + offer.energy_request;
    if gain >= cost {
        return true;
    }
    // Accept a mild loss for a friend
    let relation = state.diplomacy.relation(evaluator, proposer);
    relation >= 50 && cost - gain <= gain.div(Fixed::from_int(4))
}

/// Would `evaluator` ally with `proposer`?
pub fn evaluate_alliance_proposal(
    state: &GalaxyState,
    evaluator: PlayerId,
    proposer: PlayerId,
    config: &SimConfig,
) -> bool {
    !state.diplomacy.are_at_war(evaluator, proposer)
        && !state
            .diplomacy
            .is_enemy(evaluator, proposer, config.enemy_threshold)
        && state.diplomacy.relation(evaluator, proposer) >= config.alliance_threshold
}

/// Would `evaluator` sign peace with `proposer`?
///
/// Peace is attractive to a side that is worn down and no stronger than
/// its enemy.
pub fn evaluate_peace_proposal(
    state: &GalaxyState,
    evaluator: PlayerId,
    proposer: PlayerId,
    config: &SimConfig,
) -> bool {
    if !state.diplomacy.are_at_war(evaluator, proposer) {
        return false;
    }
    let Some(player) = state.players.get(&evaluator) else {
        return false;
    };
    let Some(other) = state.players.get(&proposer) else {
        return false;
    };
    player.war_weariness.get() >= config.peace_weariness_threshold
        && player.military_strength(&state.ships) <= other.military_strength(&state.ships)
}

/// Execute an accepted trade: both sides pay, both sides receive, and the
/// relationship warms. The caller has already validated affordability.
pub fn complete_trade(
    state: &mut GalaxyState,
    proposer: PlayerId,
    acceptor: PlayerId,
    offer: &TradeOffer,
) {
    {
        let Some(p) = state.players.get_mut(&proposer) else {
            return;
        };
        p.metal = p.metal - offer.metal_offer + offer.metal_request;
        p.energy = p.energy - offer.energy_offer + offer.energy_request;
    }
    {
        let Some(a) = state.players.get_mut(&acceptor) else {
            return;
        };
        a.metal = a.metal + offer.metal_offer - offer.metal_request;
        a.energy = a.energy + offer.energy_offer - offer.energy_request;
    }
    state
        .diplomacy
        .adjust_relation(proposer, acceptor, TRADE_RELATION_BONUS);
    log::info!("trade completed between players {proposer} and {acceptor}");
}

/// Execute an accepted alliance.
pub fn form_alliance(state: &mut GalaxyState, a: PlayerId, b: PlayerId) {
    state.diplomacy.form_alliance(a, b);
    state
        .diplomacy
        .adjust_relation(a, b, ALLIANCE_RELATION_BONUS);
    log::info!("alliance formed between players {a} and {b}");
}

/// Execute a war declaration. Fatal for the pair: only an accepted peace
/// ends it, whatever the score does afterwards.
pub fn declare_war(state: &mut GalaxyState, aggressor: PlayerId, target: PlayerId) {
    state.diplomacy.declare_war(aggressor, target);
    state
        .diplomacy
        .adjust_relation(aggressor, target, WAR_RELATION_PENALTY);
    log::info!("player {aggressor} declared war on player {target}");
}

/// Execute an accepted peace.
pub fn sign_peace(state: &mut GalaxyState, a: PlayerId, b: PlayerId) {
    state.diplomacy.sign_peace(a, b);
    for id in [a, b] {
        if let Some(player) = state.players.get_mut(&id) {
            player.war_weariness.set(0);
        }
    }
    log::info!("peace signed between players {a} and {b}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GalaxyStateBuilder;
    use proptest::prelude::*;

    fn two_players() -> GalaxyState {
        GalaxyStateBuilder::new().with_player(0).with_player(1).build()
    }

    #[test]
    fn test_relation_decays_toward_neutral() {
        let config = SimConfig::default();
        let mut state = two_players();
        state.diplomacy.adjust_relation(0, 1, -10);

        run_diplomacy_tick(&mut state, &config);
        assert_eq!(state.diplomacy.relation(0, 1), -9);

        for _ in 0..20 {
            run_diplomacy_tick(&mut state, &config);
        }
        assert_eq!(state.diplomacy.relation(0, 1), 0);
    }

    #[test]
    fn test_war_outlasts_score_recovery() {
        let config = SimConfig::default();
        let mut state = two_players();
        declare_war(&mut state, 0, 1);

        for _ in 0..200 {
            run_diplomacy_tick(&mut state, &config);
            state.diplomacy.adjust_relation(0, 1, 5);
        }

        assert_eq!(state.diplomacy.relation(0, 1), 100);
        assert!(state.diplomacy.are_at_war(0, 1));

        sign_peace(&mut state, 0, 1);
        assert!(!state.diplomacy.are_at_war(0, 1));
    }

    #[test]
    fn test_trade_evaluation() {
        let state = two_players();
        let favorable = TradeOffer {
            metal_offer: Fixed::from_int(100),
            energy_offer: Fixed::ZERO,
            metal_request: Fixed::from_int(50),
            energy_request: Fixed::ZERO,
        };
        let unfavorable = TradeOffer {
            metal_offer: Fixed::from_int(50),
            energy_offer: Fixed::ZERO,
            metal_request: Fixed::from_int(100),
            energy_request: Fixed::ZERO,
        };
        assert!(evaluate_trade_offer(&state, 1, 0, &favorable));
        assert!(!evaluate_trade_offer(&state, 1, 0, &unfavorable));
    }

    #[test]
    fn test_friends_accept_slightly_unfavorable_trades() {
        let mut state = two_players();
        state.diplomacy.adjust_relation(0, 1, 60);
        let slightly_bad = TradeOffer {
            metal_offer: Fixed::from_int(100),
            energy_offer: Fixed::ZERO,
            metal_request: Fixed::from_int(110),
            energy_request: Fixed::ZERO,
        };
        assert!(evaluate_trade_offer(&state, 1, 0, &slightly_bad));
    }

    #[test]
    fn test_completed_trade_moves_resources_and_warms_relations() {
        let mut state = two_players();
        let offer = TradeOffer {
            metal_offer: Fixed::from_int(100),
            energy_offer: Fixed::ZERO,
            metal_request: Fixed::ZERO,
            energy_request: Fixed::from_int(30),
        };

        complete_trade(&mut state, 0, 1, &offer);

        assert_eq!(state.players[&0].metal, Fixed::from_int(400));
        assert_eq!(state.players[&1].metal, Fixed::from_int(600));
        assert_eq!(state.players[&0].energy, Fixed::from_int(530));
        assert_eq!(state.players[&1].energy, Fixed::from_int(470));
        assert_eq!(state.diplomacy.relation(0, 1), TRADE_RELATION_BONUS);
    }

    #[test]
    fn test_alliance_needs_warm_relations() {
        let config = SimConfig::default();
        let mut state = two_players();
        assert!(!evaluate_alliance_proposal(&state, 1, 0, &config));

        state.diplomacy.adjust_relation(0, 1, 60);
        assert!(evaluate_alliance_proposal(&state, 1, 0, &config));

        declare_war(&mut state, 0, 1);
        assert!(!evaluate_alliance_proposal(&state, 1, 0, &config));
    }

    #[test]
    fn test_peace_needs_weariness_and_weakness() {
        let config = SimConfig::default();
        let mut state = two_players();
        declare_war(&mut state, 0, 1);

        // Fresh belligerent refuses
        assert!(!evaluate_peace_proposal(&state, 1, 0, &config));

        state
            .players
            .get_mut(&1)
            .unwrap()
            .war_weariness
            .set(config.peace_weariness_threshold);
        assert!(evaluate_peace_proposal(&state, 1, 0, &config));
    }

    #[test]
    fn test_weariness_accrues_at_war_only() {
        let config = SimConfig::default();
        let mut state = two_players();
        declare_war(&mut state, 0, 1);

        run_diplomacy_tick(&mut state, &config);
        assert_eq!(
            state.players[&0].war_weariness.get(),
            config.weariness_per_war_tick
        );

        sign_peace(&mut state, 0, 1);
        assert_eq!(state.players[&0].war_weariness.get(), 0);
    }

    proptest! {
        /// Relation score stays bounded under arbitrary event sequences.
        #[test]
        fn prop_relation_bounded_under_events(
            deltas in proptest::collection::vec(-200..200i32, 1..40)
        ) {
            let config = SimConfig::default();
            let mut state = two_players();
            for delta in deltas {
                state.diplomacy.adjust_relation(0, 1, delta);
                run_diplomacy_tick(&mut state, &config);
                let r = state.diplomacy.relation(0, 1);
                prop_assert!((-100..=100).contains(&r));
            }
        }
    }
}
