//! Simulated run - drives a full session against the in-memory player
//!
//! Run with:
//! ```
//! cargo run -p stride-sim --bin simulate [seed] [minutes]
//! ```

use std::{env, time::Duration};

use anyhow::Context as _;
use geo::Point;
use stride::{
    format::{format_distance, format_elapsed, format_pace},
    models::UnitSystem,
    player::RemotePlayer,
};
use stride_sim::prelude::*;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

/// Simulated seconds each track plays for.
const TRACK_LENGTH_S: f64 = 200.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let seed: u64 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("invalid seed {s}"))?,
        None => 12345,
    };
    let minutes: f64 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("invalid duration {s}"))?,
        None => 30.0,
    };

    let config = StrideConfig::load()?;
    let unit = config.stats.unit_system;
    let mut rng = StdRng::seed_from_u64(seed);

    let library = generate_library(400, 140.0..190.0, &mut rng);
    let player = Arc::new(SimulatedPlayer::new(
        config.scheduler.track_uri_prefix.clone(),
    ));
    let backend = Arc::new(StaticBackend::new(library, 3.0));
    player.connect().await?;

    let mut session = RunSession::new(config, player.clone(), backend);
    let runner = RunnerProfile::recreational();
    let start = OffsetDateTime::now_utc();
    let samples = runner.generate_samples(
        start,
        Point::new(-105.2705, 40.0150),
        minutes * 60.0,
        &SampleNoise::default(),
        &mut rng,
    );
    tracing::info!("Generated {} samples over {minutes} minutes", samples.len());

    session.start_run_at(start);
    let queued = session
        .change_tempo(runner.cadence_spm(), &["top".to_string()])
        .await?;
    tracing::info!("Initial queue: {queued} tracks at {:.0} bpm", runner.cadence_spm());

    let mut rejected = 0;
    let mut next_track_at = TRACK_LENGTH_S;
    for sample in samples {
        let elapsed = (sample.timestamp - start).as_seconds_f64();
        if session.record_sample(sample).is_err() {
            rejected += 1;
        }
        if elapsed >= next_track_at {
            next_track_at += TRACK_LENGTH_S;
            player.finish_track();
            // Let the listener and any refill catch up.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    let last = session.stats().clone();
    let end = start + time::Duration::seconds_f64(last.elapsed_time_seconds);
    session.stop_run_at(end);

    let played = player.history();
    let radio = played
        .iter()
        .filter(|id| SimulatedPlayer::is_radio(id))
        .count();

    tracing::info!("Run complete!");
    tracing::info!("  Distance:  {}", format_distance(last.total_distance_meters, unit));
    tracing::info!("  Time:      {}", format_elapsed(last.elapsed_time_seconds));
    tracing::info!("  Pace:      {}", format_pace(Some(last.overall_pace_per(unit)), unit));
    tracing::info!(
        "  Last mile: {}",
        format_pace(last.rolling_mile_pace_seconds, UnitSystem::Imperial)
    );
    tracing::info!("  Samples rejected: {rejected}");
    tracing::info!("  Tracks played: {} ({radio} autoplay)", played.len());

    Ok(())
}
