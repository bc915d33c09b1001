//! Console observer: one log line per notified tick.

use super::{ObserverConfig, ObserverError, SimObserver, Snapshot};
use crate::state::PlayerId;

/// Logs a per-player summary line on its configured cadence.
pub struct ConsoleObserver {
    watched: Vec<PlayerId>,
    config: ObserverConfig,
}

impl ConsoleObserver {
    pub fn new(watched: &[PlayerId]) -> Self {
        Self {
            watched: watched.to_vec(),
            config: ObserverConfig::default(),
        }
    }

    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.config.frequency = frequency;
        self
    }
}

impl SimObserver for ConsoleObserver {
    fn on_tick(&self, snapshot: &Snapshot) -> Result<(), ObserverError> {
        for &id in &self.watched {
            let Some(player) = snapshot.state.players.get(&id) else {
                continue;
            };
            log::info!(
                "year {} | {} | planets {} ships {} | pop {:.0} funds {:.1} metal {:.1}",
                snapshot.state.year(),
                player.name,
                player.planets_owned.len(),
                player.ships_owned.len(),
                player.total_population.to_f32(),
                player.funds.to_f32(),
                player.metal.to_f32(),
            );
        }
        for report in &snapshot.state.battle_reports {
            log::info!(
                "battle at planet {}: {:?} in {} rounds",
                report.planet,
                report.outcome,
                report.rounds
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ConsoleObserver"
    }

    fn config(&self) -> ObserverConfig {
        self.config.clone()
    }
}
