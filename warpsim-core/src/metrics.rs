use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accumulated timing metrics for simulation performance.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct SimMetrics {
    pub total_ticks: u64,
    pub total_time: Duration,
    /// Observation and decision time across all AI players.
    pub ai_time: Duration,
    /// The step itself: commands plus every system.
    pub step_time: Duration,
    /// Time spent in observers (console, event log).
    pub observer_time: Duration,
    /// Checksum computation time.
    pub checksum_time: Duration,
}

impl SimMetrics {
    pub fn tick_avg_ms(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.total_time.as_secs_f64() * 1000.0 / self.total_ticks as f64
        }
    }

    pub fn ticks_per_second(&self) -> f64 {
        if self.total_time.as_secs_f64() == 0.0 {
            0.0
        } else {
            self.total_ticks as f64 / self.total_time.as_secs_f64()
        }
    }
}
