use std::{env, fs::File, io::BufReader};

use anyhow::Context as _;
use stride::{
    StrideConfig,
    format::{format_distance, format_elapsed, format_pace},
    models::UnitSystem,
    replay::{replay_run, samples_from_gpx},
    stats::RunningStatsEngine,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let config = StrideConfig::load()?;

    let mut args = env::args().skip(1);
    let path = args
        .next()
        .context("usage: stride <activity.gpx> [metric|imperial]")?;
    let unit = match args.next() {
        Some(s) => UnitSystem::parse(&s).with_context(|| format!("unknown unit system {s}"))?,
        None => config.stats.unit_system,
    };

    let file = File::open(&path).with_context(|| format!("opening {path}"))?;
    let samples = samples_from_gpx(BufReader::new(file))?;
    tracing::info!("Replaying {} samples from {path}", samples.len());

    let mut engine = RunningStatsEngine::new(config.stats.pace_log_capacity);
    let stats = replay_run(&mut engine, &samples);

    tracing::info!("Distance:   {}", format_distance(stats.total_distance_meters, unit));
    tracing::info!("Time:       {}", format_elapsed(stats.elapsed_time_seconds));
    tracing::info!(
        "Pace:       {}",
        format_pace(Some(stats.overall_pace_per(unit)), unit)
    );
    tracing::info!(
        "Last mile:  {}",
        format_pace(stats.rolling_mile_pace_seconds, UnitSystem::Imperial)
    );

    Ok(())
}
