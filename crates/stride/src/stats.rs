//! Live run statistics derived from a cumulative-distance sample stream.

use std::collections::VecDeque;

use geo::Point;
use time::OffsetDateTime;

use crate::{
    errors::SampleError,
    models::{METERS_PER_MILE, PaceDataPoint, RunStats},
};

pub const DEFAULT_PACE_LOG_CAPACITY: usize = 500;

/// Rolling paces at or below this many seconds are treated as noise.
const PACE_NOISE_FLOOR_SECONDS: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct RunningStatsEngine {
    stats: RunStats,
    run_start: Option<OffsetDateTime>,
    last_accepted: Option<OffsetDateTime>,
    last_sample_at: Option<OffsetDateTime>,
    pace_log: VecDeque<PaceDataPoint>,
    capacity: usize,
    running: bool,
}

impl Default for RunningStatsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PACE_LOG_CAPACITY)
    }
}

impl RunningStatsEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            stats: RunStats::default(),
            run_start: None,
            last_accepted: None,
            last_sample_at: None,
            pace_log: VecDeque::new(),
            capacity: capacity.max(1),
            running: false,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run_start(&self) -> Option<OffsetDateTime> {
        self.run_start
    }

    pub fn pace_log_len(&self) -> usize {
        self.pace_log.len()
    }

    /// Discards any previous run and starts a new one at `started_at`.
    pub fn start_run(&mut self, started_at: OffsetDateTime) {
        self.reset_stats();
        self.run_start = Some(started_at);
        self.last_accepted = Some(started_at);
        self.pace_log.push_back(PaceDataPoint {
            timestamp: started_at,
            cumulative_distance_meters: 0.0,
        });
        self.running = true;
        tracing::info!("Run started at {started_at}");
    }

    pub fn record_sample(
        &mut self,
        cumulative_distance_meters: f64,
        timestamp: OffsetDateTime,
        coordinate: Option<Point>,
    ) -> Result<(), SampleError> {
        let result = self.accept(cumulative_distance_meters, timestamp, coordinate);
        if let Err(e) = &result {
            tracing::debug!("Ignoring sample: {e}");
        }
        result
    }

    fn accept(
        &mut self,
        distance: f64,
        timestamp: OffsetDateTime,
        coordinate: Option<Point>,
    ) -> Result<(), SampleError> {
        let (Some(run_start), Some(last_accepted), true) =
            (self.run_start, self.last_accepted, self.running)
        else {
            return Err(SampleError::NoActiveRun);
        };

        // Also rejects NaN distances.
        if !(distance >= self.stats.total_distance_meters) {
            return Err(SampleError::DistanceRegressed {
                received: distance,
                recorded: self.stats.total_distance_meters,
            });
        }
        if timestamp < last_accepted {
            return Err(SampleError::TimestampRegressed {
                received: timestamp,
                last_accepted,
            });
        }

        self.last_accepted = Some(timestamp);
        self.last_sample_at = Some(timestamp);
        self.stats.total_distance_meters = distance;
        self.stats.elapsed_time_seconds = (timestamp - run_start).as_seconds_f64();

        if let Some(point) = coordinate {
            self.stats.route.push(point);
        }

        let moved = self
            .pace_log
            .back()
            .is_none_or(|last| last.cumulative_distance_meters != distance);
        if moved {
            self.pace_log.push_back(PaceDataPoint {
                timestamp,
                cumulative_distance_meters: distance,
            });
        }

        self.stats.overall_pace_seconds_per_km = if distance > 0.0 {
            self.stats.elapsed_time_seconds / distance * 1000.0
        } else {
            0.0
        };

        self.stats.rolling_mile_pace_seconds =
            rolling_mile_pace(&self.pace_log, run_start, distance, timestamp);

        while self.pace_log.len() > self.capacity {
            self.pace_log.pop_front();
        }

        Ok(())
    }

    /// Freezes the run. Stats stay readable until the next start or reset.
    pub fn stop_run(&mut self, now: OffsetDateTime) {
        if let Some(run_start) = self.run_start {
            let end = self.last_sample_at.unwrap_or(now);
            self.stats.elapsed_time_seconds = (end - run_start).as_seconds_f64().max(0.0);
        }
        self.running = false;
        tracing::info!(
            "Run stopped: {:.1} m in {:.1} s",
            self.stats.total_distance_meters,
            self.stats.elapsed_time_seconds
        );
    }

    pub fn reset_stats(&mut self) {
        self.stats = RunStats::default();
        self.run_start = None;
        self.last_accepted = None;
        self.last_sample_at = None;
        self.pace_log.clear();
        self.running = false;
    }
}

/// Time taken to cover the last mile ending at (`now`, `distance`).
///
/// The moment the runner was exactly one mile back is linearly interpolated
/// between the two log points bracketing it.
pub fn rolling_mile_pace(
    log: &VecDeque<PaceDataPoint>,
    run_start: OffsetDateTime,
    distance: f64,
    now: OffsetDateTime,
) -> Option<f64> {
    if distance < METERS_PER_MILE {
        return None;
    }
    let target = distance - METERS_PER_MILE;
    let secs = |t: OffsetDateTime| (t - run_start).as_seconds_f64();

    let (time_a, dist_a) = log
        .iter()
        .rev()
        .find(|p| p.cumulative_distance_meters <= target)
        .map_or((0.0, 0.0), |p| {
            (secs(p.timestamp), p.cumulative_distance_meters)
        });
    let (time_b, dist_b) = log
        .iter()
        .find(|p| p.cumulative_distance_meters > target)
        .map_or((secs(now), distance), |p| {
            (secs(p.timestamp), p.cumulative_distance_meters)
        });

    let interpolated = if dist_b == dist_a {
        if target == dist_a {
            time_a
        } else {
            return None;
        }
    } else {
        let fraction = (target - dist_a) / (dist_b - dist_a);
        if !(0.0..=1.0).contains(&fraction) {
            tracing::warn!("Mile start {target:.1} m is not bracketed ({dist_a:.1}..{dist_b:.1})");
            return None;
        }
        time_a + fraction * (time_b - time_a)
    };

    let pace = secs(now) - interpolated;
    (pace > PACE_NOISE_FLOOR_SECONDS).then_some(pace)
}
