//! Simulation systems, one module per engine.

pub mod combat;
pub mod diplomacy;
pub mod economy;
pub mod espionage;
pub mod movement;
pub mod research;
pub mod victory;

pub use combat::{resolve_battle, run_combat_tick};
pub use diplomacy::run_diplomacy_tick;
pub use economy::run_economy_tick;
pub use espionage::{launch_mission, run_espionage_tick};
pub use movement::run_movement_tick;
pub use research::run_research_tick;
pub use victory::evaluate_victory;
