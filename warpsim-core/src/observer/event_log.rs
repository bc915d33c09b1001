//! Event log observer: notable happenings as JSONL.
//!
//! Detects events by comparing state between ticks and writes structured
//! JSON lines to any `Write` destination (stdout, file, pipe). Battles are
//! read straight off the tick's reports; everything else is a diff.

use super::{ObserverConfig, ObserverError, SimObserver, Snapshot};
use crate::state::{BattleOutcome, PlanetId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Events detected each tick.
///
/// Serde's tag format gives clean JSONL:
/// ```json
/// {"type":"war_declared","tick":12,"a":0,"b":2}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    WarDeclared {
        tick: u64,
        a: PlayerId,
        b: PlayerId,
    },
    PeaceSigned {
        tick: u64,
        a: PlayerId,
        b: PlayerId,
    },
    AllianceFormed {
        tick: u64,
        a: PlayerId,
        b: PlayerId,
    },
    PlanetOwnerChanged {
        tick: u64,
        planet: PlanetId,
        #[serde(skip_serializing_if = "Option::is_none")]
        old_owner: Option<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_owner: Option<PlayerId>,
    },
    BattleFought {
        tick: u64,
        planet: PlanetId,
        #[serde(skip_serializing_if = "Option::is_none")]
        attacker: Option<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        defender: Option<PlayerId>,
        outcome: BattleOutcome,
        rounds: u32,
    },
    PlayerEliminated {
        tick: u64,
        player: PlayerId,
    },
    GameWon {
        tick: u64,
        player: PlayerId,
    },
}

/// Cached previous-tick facts for diff detection.
#[derive(Debug, Default)]
struct EventLogState {
    prev_wars: HashSet<(PlayerId, PlayerId)>,
    prev_alliances: HashSet<(PlayerId, PlayerId)>,
    prev_planet_owners: HashMap<PlanetId, Option<PlayerId>>,
    prev_eliminated: HashSet<PlayerId>,
    prev_winner: Option<PlayerId>,
    first_tick: bool,
}

impl EventLogState {
    fn new() -> Self {
        Self {
            first_tick: true,
            ..Default::default()
        }
    }

    fn update_from(&mut self, state: &crate::state::GalaxyState) {
        self.prev_wars = state.diplomacy.wars.iter().copied().collect();
        self.prev_alliances = state.diplomacy.alliances.iter().copied().collect();
        self.prev_planet_owners = state
            .planets
            .iter()
            .map(|(id, p)| (*id, p.owner))
            .collect();
        self.prev_eliminated = state
            .players
            .iter()
            .filter(|(_, p)| p.eliminated)
            .map(|(id, _)| *id)
            .collect();
        self.prev_winner = state.winner;
        self.first_tick = false;
    }
}

/// Observer that logs simulation events as JSONL.
pub struct EventLogObserver {
    writer: Mutex<Box<dyn Write + Send>>,
    state: Mutex<EventLogState>,
    config: ObserverConfig,
}

impl EventLogObserver {
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(std::io::stdout())))
    }

    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            state: Mutex::new(EventLogState::new()),
            config: ObserverConfig { frequency: 1 },
        }
    }

    fn detect_events(&self, snapshot: &Snapshot, prev: &EventLogState) -> Vec<GameEvent> {
        let galaxy = &snapshot.state;
        let mut events = Vec::new();

        for &(a, b) in &galaxy.diplomacy.wars {
            if !prev.prev_wars.contains(&(a, b)) {
                events.push(GameEvent::WarDeclared {
                    tick: snapshot.tick,
                    a,
                    b,
                });
            }
        }
        for &(a, b) in &prev.prev_wars {
            if !galaxy.diplomacy.wars.contains(&(a, b)) {
                events.push(GameEvent::PeaceSigned {
                    tick: snapshot.tick,
                    a,
                    b,
                });
            }
        }
        for &(a, b) in &galaxy.diplomacy.alliances {
            if !prev.prev_alliances.contains(&(a, b)) {
                events.push(GameEvent::AllianceFormed {
                    tick: snapshot.tick,
                    a,
                    b,
                });
            }
        }

        let mut ownership: Vec<_> = galaxy
            .planets
            .iter()
            .filter_map(|(id, planet)| {
                let old = prev.prev_planet_owners.get(id)?;
                (*old != planet.owner).then_some((*id, *old, planet.owner))
            })
            .collect();
        ownership.sort_unstable_by_key(|(id, _, _)| *id);
        for (planet, old_owner, new_owner) in ownership {
            events.push(GameEvent::PlanetOwnerChanged {
                tick: snapshot.tick,
                planet,
                old_owner,
                new_owner,
            });
        }

        for report in &galaxy.battle_reports {
            events.push(GameEvent::BattleFought {
                tick: snapshot.tick,
                planet: report.planet,
                attacker: report.attacker,
                defender: report.defender,
                outcome: report.outcome,
                rounds: report.rounds,
            });
        }

        let mut eliminated: Vec<_> = galaxy
            .players
            .iter()
            .filter(|(id, p)| p.eliminated && !prev.prev_eliminated.contains(id))
            .map(|(id, _)| *id)
            .collect();
        eliminated.sort_unstable();
        for player in eliminated {
            events.push(GameEvent::PlayerEliminated {
                tick: snapshot.tick,
                player,
            });
        }

        if let Some(winner) = galaxy.winner {
            if prev.prev_winner.is_none() {
                events.push(GameEvent::GameWon {
                    tick: snapshot.tick,
                    player: winner,
                });
            }
        }

        events
    }

    fn write_event(&self, writer: &mut dyn Write, event: &GameEvent) -> Result<(), ObserverError> {
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
        Ok(())
    }
}

impl SimObserver for EventLogObserver {
    fn on_tick(&self, snapshot: &Snapshot) -> Result<(), ObserverError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ObserverError::Render("event log state lock poisoned".into()))?;

        if !state.first_tick {
            let events = self.detect_events(snapshot, &state);
            if !events.is_empty() {
                let mut writer = self
                    .writer
                    .lock()
                    .map_err(|_| ObserverError::Render("event log writer lock poisoned".into()))?;
                for event in &events {
                    self.write_event(&mut *writer, event)?;
                }
                writer.flush()?;
            }
        }

        state.update_from(&snapshot.state);
        Ok(())
    }

    fn name(&self) -> &str {
        "EventLogObserver"
    }

    fn config(&self) -> ObserverConfig {
        self.config.clone()
    }

    fn on_shutdown(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GalaxyStateBuilder;
    use std::io::Cursor;
    use std::sync::Arc;

    /// Helper to capture JSONL output.
    struct OutputCapture(Arc<Mutex<Cursor<Vec<u8>>>>);

    impl Write for OutputCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.lock().unwrap().flush()
        }
    }

    fn capture() -> (EventLogObserver, Arc<Mutex<Cursor<Vec<u8>>>>) {
        let output = Arc::new(Mutex::new(Cursor::new(Vec::new())));
        let observer = EventLogObserver::new(Box::new(OutputCapture(output.clone())));
        (observer, output)
    }

    fn contents(output: &Arc<Mutex<Cursor<Vec<u8>>>>) -> String {
        String::from_utf8_lossy(output.lock().unwrap().get_ref()).into_owned()
    }

    #[test]
    fn test_war_declared_event() {
        let (observer, output) = capture();

        let state1 = GalaxyStateBuilder::new().with_player(0).with_player(1).build();
        observer.on_tick(&Snapshot::new(state1.clone(), 1, 0)).unwrap();

        let mut state2 = state1;
        state2.diplomacy.declare_war(0, 1);
        observer.on_tick(&Snapshot::new(state2, 2, 0)).unwrap();

        let out = contents(&output);
        assert!(out.contains("\"type\":\"war_declared\""));
        assert!(out.contains("\"tick\":2"));
    }

    #[test]
    fn test_peace_signed_event() {
        let (observer, output) = capture();

        let mut state1 = GalaxyStateBuilder::new().with_player(0).with_player(1).build();
        state1.diplomacy.declare_war(0, 1);
        observer.on_tick(&Snapshot::new(state1.clone(), 1, 0)).unwrap();

        let mut state2 = state1;
        state2.diplomacy.sign_peace(0, 1);
        observer.on_tick(&Snapshot::new(state2, 2, 0)).unwrap();

        assert!(contents(&output).contains("\"type\":\"peace_signed\""));
    }

    #[test]
    fn test_planet_owner_change_event() {
        let (observer, output) = capture();

        let state1 = GalaxyStateBuilder::new()
            .with_player(0)
            .with_player(1)
            .with_planet(0, Some(0))
            .build();
        observer.on_tick(&Snapshot::new(state1.clone(), 1, 0)).unwrap();

        let mut state2 = state1;
        state2.set_planet_owner(0, Some(1));
        observer.on_tick(&Snapshot::new(state2, 2, 0)).unwrap();

        let out = contents(&output);
        assert!(out.contains("\"type\":\"planet_owner_changed\""));
        assert!(out.contains("\"old_owner\":0"));
        assert!(out.contains("\"new_owner\":1"));
    }

    #[test]
    fn test_no_events_on_first_tick() {
        let (observer, output) = capture();

        let mut state = GalaxyStateBuilder::new().with_player(0).with_player(1).build();
        state.diplomacy.declare_war(0, 1);
        observer.on_tick(&Snapshot::new(state, 1, 0)).unwrap();

        assert!(contents(&output).is_empty());
    }

    #[test]
    fn test_battle_reports_pass_through() {
        let (observer, output) = capture();

        let state1 = GalaxyStateBuilder::new().with_player(0).with_player(1).build();
        observer.on_tick(&Snapshot::new(state1.clone(), 1, 0)).unwrap();

        let mut state2 = state1;
        state2.battle_reports.push(crate::state::BattleReport {
            id: 0,
            planet: 3,
            attacker: Some(0),
            defender: Some(1),
            rounds: 7,
            outcome: BattleOutcome::AttackerVictory,
            attacker_losses: 1,
            defender_losses: 2,
        });
        observer.on_tick(&Snapshot::new(state2, 2, 0)).unwrap();

        let out = contents(&output);
        assert!(out.contains("\"type\":\"battle_fought\""));
        assert!(out.contains("\"rounds\":7"));
    }
}
