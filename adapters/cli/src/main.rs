#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that animates a synthetic venue through the Crowd Pulse engine.

mod terminal;
mod venue;

use std::{
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use crowd_pulse_core::{Timestamp, Tuning};
use crowd_pulse_engine::{
    clock::{Clock, ManualClock, MonotonicClock},
    scheduler::Scheduler,
    HeatmapEngine,
};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use self::{
    terminal::TerminalSurface,
    venue::{SyntheticVenue, VenueConfig},
};

const GRID_COLUMNS: usize = 75;
const GRID_ROWS: usize = 25;

#[derive(Parser, Debug)]
#[command(
    name = "crowd-pulse",
    version,
    about = "Animated crowd-density heatmap over a synthetic venue"
)]
struct Args {
    /// TOML file with engine tuning and an optional [venue] table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds of venue activity to simulate
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,

    /// Override the number of guests the venue holds
    #[arg(long)]
    guests: Option<u32>,

    /// Seed for the venue population and the guest orbits
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Draw guest markers on top of the density grid
    #[arg(long)]
    debug_overlay: bool,

    /// Log filter directive; falls back to RUST_LOG, then `info`
    #[arg(long)]
    log_filter: Option<String>,

    /// Advance a manual clock instead of sleeping in real time
    #[arg(long)]
    fast_forward: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VenueSection {
    venue: VenueConfig,
}

/// Entry point for the Crowd Pulse command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_filter.as_deref())?;

    let (tuning, mut venue_config) = load_config(args.config.as_deref())?;
    if let Some(guests) = args.guests {
        venue_config.guests = guests;
    }
    venue_config.validate()?;
    anyhow::ensure!(
        args.seconds.is_finite() && args.seconds >= 0.0,
        "--seconds must be a non-negative number"
    );

    let mut engine =
        HeatmapEngine::seeded(tuning.clone(), args.seed).context("invalid engine tuning")?;
    engine.set_debug_overlay(args.debug_overlay);
    let mut venue = SyntheticVenue::new(&tuning, venue_config, args.seed);
    let mut surface = TerminalSurface::new(tuning.canvas, GRID_COLUMNS, GRID_ROWS);
    let until = Timestamp::from_duration(Duration::from_secs_f64(args.seconds));

    info!(
        zones = venue.zones().len(),
        seconds = args.seconds,
        fast_forward = args.fast_forward,
        "crowd-pulse starting"
    );

    if args.fast_forward {
        let clock = ManualClock::new(Timestamp::ZERO);
        let mut scheduler = Scheduler::new(&clock, &tuning);
        run_until(
            &mut scheduler,
            &clock,
            until,
            &mut engine,
            &mut venue,
            &mut surface,
            |pause| clock.advance(pause),
        )?;
    } else {
        let clock = MonotonicClock::new();
        let mut scheduler = Scheduler::new(clock, &tuning);
        run_until(
            &mut scheduler,
            &clock,
            until,
            &mut engine,
            &mut venue,
            &mut surface,
            thread::sleep,
        )?;
    }

    println!("{}", surface.render());
    info!(
        guests = engine.guest_count(),
        pushes = surface.pushes(),
        links = surface.links(),
        zones = surface.zones(),
        "crowd-pulse finished"
    );
    Ok(())
}

fn init_tracing(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter `{directive}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<(Tuning, VenueConfig)> {
    let Some(path) = path else {
        return Ok((Tuning::default(), VenueConfig::default()));
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config at {}", path.display()))
}

fn parse_config(contents: &str) -> Result<(Tuning, VenueConfig)> {
    let tuning: Tuning = toml::from_str(contents).context("failed to parse tuning")?;
    tuning.validate()?;
    let section: VenueSection = toml::from_str(contents).context("failed to parse [venue]")?;
    Ok((tuning, section.venue))
}

fn run_until<C: Clock>(
    scheduler: &mut Scheduler<C>,
    clock: &impl Clock,
    until: Timestamp,
    engine: &mut HeatmapEngine,
    venue: &mut SyntheticVenue,
    surface: &mut TerminalSurface,
    mut pause: impl FnMut(Duration),
) -> Result<()> {
    let frames = scheduler.frame_stop_handle();
    let polls = scheduler.poll_stop_handle();

    scheduler.run(engine, venue, surface, |wait| {
        let remaining = until.saturating_duration_since(clock.now());
        pause(wait.min(remaining));
        if clock.now() >= until {
            frames.stop();
            polls.stop();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_reads_tuning_and_venue_tables() {
        let (tuning, venue) = parse_config(
            r#"
                fade_ms = 500

                [venue]
                guests = 8
            "#,
        )
        .expect("valid config");

        assert_eq!(tuning.fade_ms, 500);
        assert_eq!(tuning.transition_ms, Tuning::default().transition_ms);
        assert_eq!(venue.guests, 8);
        assert_eq!(venue.extra_zones, VenueConfig::default().extra_zones);
    }

    #[test]
    fn invalid_tuning_is_reported() {
        let error = parse_config("max_frame_step_ms = 0").expect_err("zero step");
        assert!(format!("{error:#}").contains("max_frame_step_ms"));
    }

    #[test]
    fn fast_forward_run_pushes_frames_and_stops() {
        let tuning = Tuning::default();
        let mut engine = HeatmapEngine::seeded(tuning.clone(), 3).expect("valid tuning");
        let mut venue = SyntheticVenue::new(&tuning, VenueConfig::default(), 3);
        let mut surface = TerminalSurface::new(tuning.canvas, 30, 10);
        let clock = ManualClock::new(Timestamp::ZERO);
        let mut scheduler = Scheduler::new(&clock, &tuning);

        run_until(
            &mut scheduler,
            &clock,
            Timestamp::from_millis(3_000),
            &mut engine,
            &mut venue,
            &mut surface,
            |pause| clock.advance(pause),
        )
        .expect("run");

        assert!(scheduler.is_stopped());
        assert_eq!(clock.now(), Timestamp::from_millis(3_000));
        assert!(surface.pushes() > 100);
        assert!(engine.guest_count() > 0);
        assert!(surface.links() > 0);
        assert_eq!(surface.zones(), venue.zones().len());
        assert!(surface.render().contains('@'));
    }
}
