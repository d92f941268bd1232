// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! HazardWatch - floor occupancy tracking and hazard-zone alarms
//!
//! Runs a configured building either against simulated walkers (demo mode)
//! or against newline-delimited JSON sightings read from stdin.

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hazardwatch::core::{Event, EventPayload, SystemClock};
use hazardwatch::tracking::WalkSimulator;
use hazardwatch::{Config, Engine, EventBus, PersonLocationUpdate, TimeSource, VERSION};

/// HazardWatch - floor occupancy tracking and hazard-zone alarms
#[derive(Parser, Debug)]
#[command(name = "hazardwatch")]
#[command(version = VERSION)]
#[command(about = "Occupancy tracking with pre-alarm and alarm escalation for hazard zones")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with simulated walkers
    #[arg(long)]
    demo: bool,

    /// Print every event to stdout as a JSON line
    #[arg(long)]
    json_events: bool,

    /// Simulated walkers per floor
    #[arg(long)]
    persons: Option<usize>,
}

/// One line of stdin input
#[derive(Debug, Deserialize)]
struct Sighting {
    floor: String,
    #[serde(flatten)]
    update: PersonLocationUpdate,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    let directive = log_directive(&args, &config);
    let (filter, rejected) = match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("info"), Some(e)),
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{}", config.app_name, VERSION);
    if let Some(e) = rejected {
        warn!("Invalid log level '{}', using info: {}", directive, e);
    }
    if config.version != VERSION {
        warn!("Configuration was written for v{}, running v{}", config.version, VERSION);
    }

    if args.demo {
        config.demo_mode = true;
    }
    if let Some(persons) = args.persons {
        config.simulator.persons = persons;
    }

    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args.json_events))
}

/// `--trace` and `--debug` override the configured level
fn log_directive<'a>(args: &Args, config: &'a Config) -> &'a str {
    if args.trace {
        "trace"
    } else if args.debug {
        "debug"
    } else if config.log_level.trim().is_empty() {
        "info"
    } else {
        config.log_level.trim()
    }
}

async fn run(config: Config, json_events: bool) -> Result<()> {
    let bus = Arc::new(EventBus::new(config.events.delivery, Arc::new(SystemClock)));
    bus.subscribe(move |event| report(event, json_events));

    let engine = Engine::from_config(&config, TimeSource::system()?, bus)?;
    for snapshot in engine.status() {
        info!(
            "Zone '{}': {} / {} (allowed {})",
            snapshot.name, snapshot.zone_state, snapshot.alarm_state, snapshot.allowed_number_of_persons
        );
    }

    info!("Press Ctrl+C to shutdown");
    tokio::select! {
        result = feed(&engine, &config) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received, cleaning up...");
        }
    }

    for snapshot in engine.status() {
        info!(
            "Zone '{}' final: {} / {}, {} person(s) inside",
            snapshot.name, snapshot.zone_state, snapshot.alarm_state, snapshot.person_count
        );
    }
    engine.dispose();
    engine.bus().shutdown();

    info!("HazardWatch shutdown complete");
    Ok(())
}

async fn feed(engine: &Engine, config: &Config) -> Result<()> {
    if config.demo_mode {
        simulate(engine, config).await
    } else {
        read_stdin(engine).await
    }
}

async fn simulate(engine: &Engine, config: &Config) -> Result<()> {
    let settings = &config.simulator;
    let mut simulators: Vec<(String, WalkSimulator)> = engine
        .floors()
        .iter()
        .enumerate()
        .map(|(i, floor)| {
            let seed = settings.seed.map(|s| s.wrapping_add(i as u64));
            let sim = WalkSimulator::new(settings.persons, floor.outline(), settings.step, seed);
            (floor.name().to_string(), sim)
        })
        .collect();

    info!(
        "Simulating {} walker(s) per floor every {:?}",
        settings.persons,
        settings.tick_interval()
    );

    let mut interval = tokio::time::interval(settings.tick_interval());
    loop {
        interval.tick().await;
        for (floor, sim) in &mut simulators {
            for update in sim.tick() {
                engine.update_location(floor, &update);
            }
        }
    }
}

async fn read_stdin(engine: &Engine) -> Result<()> {
    info!("Reading sightings from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Sighting>(&line) {
            Ok(sighting) => {
                engine.update_location(&sighting.floor, &sighting.update);
            }
            Err(e) => warn!("Skipping malformed sighting: {}", e),
        }
    }

    info!("Input closed");
    Ok(())
}

fn report(event: &Event, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode event {}: {}", event.id, e),
        }
        return;
    }

    match &event.payload {
        EventPayload::AlarmStateChanged { zone, state } => info!("[{}] alarm {}", zone, state),
        EventPayload::ZoneStateChanged { zone, state } => info!("[{}] zone {}", zone, state),
        other => debug!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directive_prefers_flags_over_config() {
        let config = Config {
            log_level: "hazardwatch=debug,warn".to_string(),
            ..Config::default()
        };

        let args = Args::parse_from(["hazardwatch"]);
        assert_eq!(log_directive(&args, &config), "hazardwatch=debug,warn");

        let args = Args::parse_from(["hazardwatch", "--debug"]);
        assert_eq!(log_directive(&args, &config), "debug");

        let args = Args::parse_from(["hazardwatch", "--debug", "--trace"]);
        assert_eq!(log_directive(&args, &config), "trace");
    }

    #[test]
    fn test_blank_log_level_defaults_to_info() {
        let config = Config {
            log_level: "  ".to_string(),
            ..Config::default()
        };
        let args = Args::parse_from(["hazardwatch"]);

        assert_eq!(log_directive(&args, &config), "info");
        assert!(EnvFilter::try_new(log_directive(&args, &config)).is_ok());
    }
}
