//! Observer pattern for simulation state inspection.
//!
//! Observers receive immutable post-tick snapshots wrapped in `Arc` and
//! can never affect determinism: there is no `&mut` route from an observer
//! back into the simulation. The excluded rendering, audio and save layers
//! all consume these snapshots; the core never depends on any of them.

pub mod console;
pub mod event_log;

use crate::state::GalaxyState;
use std::sync::Arc;
use thiserror::Error;

/// Immutable snapshot of simulation state for observers.
#[derive(Clone)]
pub struct Snapshot {
    pub state: Arc<GalaxyState>,
    /// Monotonic tick counter.
    pub tick: u64,
    /// State checksum for desync detection (0 if disabled this tick).
    pub checksum: u64,
}

impl Snapshot {
    pub fn new(state: GalaxyState, tick: u64, checksum: u64) -> Self {
        Self {
            state: Arc::new(state),
            tick,
            checksum,
        }
    }

    pub fn from_arc(state: Arc<GalaxyState>, tick: u64, checksum: u64) -> Self {
        Self {
            state,
            tick,
            checksum,
        }
    }
}

/// Errors that can occur during observation.
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("render error: {0}")]
    Render(String),
}

/// Configuration for observer notification frequency.
#[derive(Clone, Debug)]
pub struct ObserverConfig {
    /// Notify every N ticks (1 = every tick).
    pub frequency: u32,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self { frequency: 1 }
    }
}

/// Trait for simulation observers.
///
/// A failing observer is logged and skipped; it cannot stop the game.
pub trait SimObserver: Send + Sync {
    fn on_tick(&self, snapshot: &Snapshot) -> Result<(), ObserverError>;

    fn name(&self) -> &str;

    fn config(&self) -> ObserverConfig {
        ObserverConfig::default()
    }

    /// Called once when the simulation ends; flush buffers here.
    fn on_shutdown(&self) {}
}

/// Holds registered observers and fans snapshots out to them.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Box<dyn SimObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn SimObserver>) {
        log::debug!("registered observer {}", observer.name());
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify(&self, snapshot: &Snapshot) {
        for observer in &self.observers {
            let frequency = observer.config().frequency.max(1);
            if snapshot.tick % frequency as u64 != 0 {
                continue;
            }
            if let Err(e) = observer.on_tick(snapshot) {
                log::warn!("observer {} failed: {e}", observer.name());
            }
        }
    }

    pub fn shutdown(&self) {
        for observer in &self.observers {
            observer.on_shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GalaxyStateBuilder;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingObserver {
        calls: Arc<AtomicU32>,
        frequency: u32,
    }

    impl SimObserver for CountingObserver {
        fn on_tick(&self, _snapshot: &Snapshot) -> Result<(), ObserverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "CountingObserver"
        }

        fn config(&self) -> ObserverConfig {
            ObserverConfig {
                frequency: self.frequency,
            }
        }
    }

    #[test]
    fn test_notify_respects_frequency() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = ObserverRegistry::new();
        registry.register(Box::new(CountingObserver {
            calls: calls.clone(),
            frequency: 3,
        }));

        let state = GalaxyStateBuilder::new().with_player(0).build();
        for tick in 1..=9 {
            let snapshot = Snapshot::new(state.clone(), tick, 0);
            registry.notify(&snapshot);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3); // Ticks 3, 6, 9
    }

    struct FailingObserver;

    impl SimObserver for FailingObserver {
        fn on_tick(&self, _snapshot: &Snapshot) -> Result<(), ObserverError> {
            Err(ObserverError::Render("always broken".into()))
        }

        fn name(&self) -> &str {
            "FailingObserver"
        }
    }

    #[test]
    fn test_failing_observer_is_contained() {
        let mut registry = ObserverRegistry::new();
        registry.register(Box::new(FailingObserver));

        let state = GalaxyStateBuilder::new().with_player(0).build();
        let snapshot = Snapshot::new(state, 1, 0);
        registry.notify(&snapshot); // Must not panic
    }
}
