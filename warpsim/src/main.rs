use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use warpsim::{events, loader};
use warpsim_core::{
    ConsoleObserver, EventLogObserver, PlannerAi, SaveGame, SimConfig, TurnScheduler,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of AI empires
    #[arg(short, long, default_value_t = 4)]
    players: u32,

    /// Number of planets in the galaxy
    #[arg(long, default_value_t = 40)]
    planets: u32,

    /// Number of ticks to run (one tick is one year)
    #[arg(short, long, default_value_t = 100)]
    ticks: u32,

    /// Galaxy and campaign seed
    #[arg(short, long, default_value_t = 12345)]
    seed: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write a JSONL event log here
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Write the final state snapshot here as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Resume from a snapshot instead of generating a galaxy
    #[arg(long)]
    load: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    log::info!("starting warpsim...");

    let mut state = match &args.load {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            let save: SaveGame =
                serde_json::from_str(&raw).context("parsing snapshot JSON")?;
            save.restore().context("restoring snapshot")?
        }
        None => loader::generate_galaxy(args.seed, args.players, args.planets)?,
    };

    let watched: Vec<u32> = state.sorted_player_ids();
    let mut scheduler = TurnScheduler::new(SimConfig::default());
    for &player_id in &watched {
        scheduler.register_ai(player_id, Box::new(PlannerAi::new()));
    }
    scheduler.register_observer(Box::new(ConsoleObserver::new(&watched).with_frequency(10)));
    if let Some(path) = &args.event_log {
        scheduler.register_observer(Box::new(
            EventLogObserver::file(path)
                .with_context(|| format!("opening event log {}", path.display()))?,
        ));
    }

    let mut event_rng = StdRng::seed_from_u64(args.seed ^ 0xE7E7_E7E7);
    for _ in 0..args.ticks {
        let triggers = events::roll_events(&mut event_rng, &state);
        let outcome = scheduler.run_tick(&state, &[], &triggers);
        state = outcome.state;

        if let Some(checksum) = outcome.checksum {
            log::debug!("tick {} checksum {checksum:016x}", state.tick);
        }
        if let Some(winner) = outcome.winner {
            let name = state
                .players
                .get(&winner)
                .map(|p| p.name.as_str())
                .unwrap_or("unknown");
            log::info!("{name} wins in year {}", state.year());
            break;
        }
    }
    scheduler.shutdown();

    let metrics = scheduler.metrics();
    log::info!(
        "finished at year {} | {} ticks, {:.2} ms/tick avg",
        state.year(),
        metrics.total_ticks,
        metrics.tick_avg_ms()
    );

    if let Some(path) = &args.save {
        let save = SaveGame::capture(&state);
        let json = serde_json::to_string_pretty(&save)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        log::info!("snapshot written to {}", path.display());
    }

    Ok(())
}
