use crate::fixed::Fixed;
use crate::state::{
    DevCategory, MissionKind, PlanetId, PlayerId, ShipClass, ShipId, TechId, DEV_CATEGORIES,
};
use serde::{Deserialize, Serialize};

/// One player's orders for a tick. Human and AI orders use the same type
/// and the same validation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInputs {
    pub player: PlayerId,
    pub commands: Vec<Command>,
}

/// The terms of a resource trade: what the proposer gives and asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub metal_offer: Fixed,
    pub energy_offer: Fixed,
    pub metal_request: Fixed,
    pub energy_request: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Command {
    // Economic
    /// Settle an unowned planet with one of the player's colony-capable
    /// ships. The ship flies there and is consumed on arrival.
    Colonize {
        planet: PlanetId,
        ship: ShipId,
    },
    /// Spend planet metal on one development level in a category.
    Invest {
        planet: PlanetId,
        category: DevCategory,
        amount: Fixed,
    },
    /// Replace a planet's population allocation fractions (must sum <= 1).
    SetAllocation {
        planet: PlanetId,
        allocation: [Fixed; DEV_CATEGORIES],
    },
    /// Enqueue a hull on the planet's yard. Metal is charged up front.
    BuildShip {
        planet: PlanetId,
        class: ShipClass,
    },

    // Military
    MoveFleet {
        ships: Vec<ShipId>,
        target: PlanetId,
    },
    AttackTarget {
        ship: ShipId,
        target: ShipId,
    },
    Invade {
        ship: ShipId,
        planet: PlanetId,
    },

    // Diplomatic
    ProposeTrade {
        to: PlayerId,
        offer: TradeOffer,
    },
    ProposeAlliance {
        to: PlayerId,
    },
    ProposePeace {
        to: PlayerId,
    },
    DeclareWar {
        target: PlayerId,
    },
    LaunchMission {
        target: PlayerId,
        kind: MissionKind,
    },

    // Research
    SetResearchPriority {
        tech: TechId,
        priority: Fixed,
    },

    // Story events
    ResolveDecision {
        decision: u32,
        choice: u32,
    },

    // Meta
    Pass,
}

/// Coarse command grouping used by AI planners to pick one action per
/// concern instead of a single globally best action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandCategory {
    Economic,
    Military,
    Diplomatic,
    Research,
    Meta,
}

impl Command {
    pub fn category(&self) -> CommandCategory {
        match self {
            Command::Colonize { .. }
            | Command::Invest { .. }
            | Command::SetAllocation { .. }
            | Command::BuildShip { .. } => CommandCategory::Economic,
            Command::MoveFleet { .. } | Command::AttackTarget { .. } | Command::Invade { .. } => {
                CommandCategory::Military
            }
            Command::ProposeTrade { .. }
            | Command::ProposeAlliance { .. }
            | Command::ProposePeace { .. }
            | Command::DeclareWar { .. }
            | Command::LaunchMission { .. } => CommandCategory::Diplomatic,
            Command::SetResearchPriority { .. } => CommandCategory::Research,
            Command::ResolveDecision { .. } | Command::Pass => CommandCategory::Meta,
        }
    }
}
