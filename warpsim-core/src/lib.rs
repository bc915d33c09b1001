//! # Warpsim Core
//!
//! Deterministic simulation engine for a multi-player galactic strategy
//! campaign: colonization, economy, research, fleet combat, diplomacy and
//! espionage, advanced one tick at a time.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │  AI Players │────▶│ PlayerInputs │────▶│ step_galaxy │
//! │  (decide)   │     │ (commands)   │     │ (pure fn)   │
//! └─────────────┘     └──────────────┘     └──────┬──────┘
//!                                                 │
//!                     ┌──────────────┐     ┌──────▼──────┐
//!                     │  Observers   │◀────│ GalaxyState │
//!                     │  (side fx)   │     │ (new state) │
//!                     └──────────────┘     └─────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`GalaxyState`] | Complete simulation state (planets, ships, players) |
//! | [`Command`] | Player actions (Colonize, BuildShip, DeclareWar, ...) |
//! | [`step_galaxy`] | Pure function: `(state, inputs, events) -> state` |
//! | [`TurnScheduler`] | One call per tick: AI, step, observers, victory |
//! | [`AiPlayer`] | Trait for AI decision making |
//! | [`SimObserver`] | Trait for observing state changes |
//! | [`SaveGame`] | Flat ordered-record snapshot with validated restore |
//!
//! ## Determinism
//!
//! All simulation arithmetic is fixed-point ([`Fixed`]); randomness flows
//! from a single seeded cursor on the state. Identical seed and inputs
//! give identical checksums, which is what the replay and desync checks
//! are built on.

pub mod ai;
pub mod bounded;
pub mod config;
pub mod events;
pub mod fixed;
pub mod input;
pub mod metrics;
pub mod observer;
pub mod persist;
pub mod scheduler;
pub mod state;
pub mod step;
pub mod systems;
pub mod testing;


pub use ai::{
    available_commands, visible_state, AiPlayer, PlannerAi, RandomAi, VisibilityMode,
    VisibleGalaxyState,
};
pub use bounded::{new_relation, new_reputation, new_war_weariness, BoundedFixed, BoundedInt};
pub use config::SimConfig;
pub use events::EventTrigger;
pub use fixed::Fixed;
pub use input::{Command, PlayerInputs, TradeOffer};
pub use metrics::SimMetrics;
pub use observer::console::ConsoleObserver;
pub use observer::event_log::{EventLogObserver, GameEvent};
pub use observer::{ObserverConfig, ObserverError, ObserverRegistry, SimObserver, Snapshot};
pub use persist::{LoadError, SaveGame};
pub use scheduler::{TickOutcome, TurnScheduler};
pub use state::{
    BattleOutcome, DevCategory, GalaxyState, MissionKind, PlanetId, PlayerId, ShipClass, ShipId,
    ShipOrder, TechCategory, TechId,
};
pub use step::{execute_command, step_galaxy, ActionError};
