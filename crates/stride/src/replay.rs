//! Feeds recorded GPX tracks through the stats engine.

use std::io::Read;

use geo::{Distance as _, Haversine, geometry::Point};
use time::OffsetDateTime;

use crate::{
    errors::ReplayError,
    models::{RunSample, RunStats},
    stats::RunningStatsEngine,
};

/// Converts every timed track point into a cumulative-distance sample.
///
/// Distance accumulates over all points, timed or not, so gaps in the
/// timestamps do not shorten the run.
pub fn samples_from_gpx<R: Read>(reader: R) -> Result<Vec<RunSample>, ReplayError> {
    let gpx = gpx::read(reader)
        .map_err(|e| ReplayError::GpxParsing(format!("Failed to parse GPX: {e}")))?;

    let mut samples = Vec::new();
    let mut cumulative = 0.0;
    let mut last_point: Option<Point> = None;

    for track in &gpx.tracks {
        for seg in &track.segments {
            for wpt in &seg.points {
                let point = wpt.point();
                cumulative += last_point.map_or(0.0, |prev| Haversine.distance(prev, point));
                last_point = Some(point);

                if let Some(time) = wpt.time {
                    let timestamp: OffsetDateTime = time.into();
                    samples.push(RunSample::new(timestamp, cumulative).with_coordinate(point));
                }
            }
        }
    }

    if samples.is_empty() {
        return Err(ReplayError::NoTimedPoints);
    }
    Ok(samples)
}

/// Runs `samples` through a fresh run on `engine`, starting at the first
/// sample's timestamp.
pub fn replay_run(engine: &mut RunningStatsEngine, samples: &[RunSample]) -> RunStats {
    let Some(first) = samples.first() else {
        return engine.stats().clone();
    };
    engine.start_run(first.timestamp);
    let mut rejected = 0;
    for sample in samples {
        if engine
            .record_sample(
                sample.cumulative_distance_meters,
                sample.timestamp,
                sample.coordinate,
            )
            .is_err()
        {
            rejected += 1;
        }
    }
    engine.stop_run(OffsetDateTime::now_utc());
    if rejected > 0 {
        tracing::info!("Replay skipped {rejected} of {} samples", samples.len());
    }
    engine.stats().clone()
}
