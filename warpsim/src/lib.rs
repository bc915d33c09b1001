//! Headless campaign runner for the warpsim engine.

pub mod loader;
pub mod events;
