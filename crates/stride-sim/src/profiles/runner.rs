//! Runner profile.

use geo::Point;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use stride::models::RunSample;
use time::{Duration, OffsetDateTime};

use super::SampleNoise;

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Speed and cadence of a synthetic runner.
///
/// The default is a recreational runner at ~5:00/km (3.33 m/s) and
/// ~165 steps per minute.
#[derive(Debug, Clone)]
pub struct RunnerProfile {
    /// Base speed in m/s.
    base_speed: f64,
    /// Steps per minute, the tempo music is matched to.
    cadence: f64,
    /// Day-to-day variance (coefficient of variation).
    variance: f64,
}

impl Default for RunnerProfile {
    fn default() -> Self {
        Self {
            base_speed: 1000.0 / 300.0, // 5:00/km
            cadence: 165.0,
            variance: 0.05,
        }
    }
}

impl RunnerProfile {
    /// Creates a runner with the given pace in minutes per kilometer.
    pub fn with_pace(pace_min_per_km: f64) -> Self {
        Self {
            base_speed: 1000.0 / (pace_min_per_km * 60.0),
            ..Default::default()
        }
    }

    pub fn with_cadence(mut self, steps_per_minute: f64) -> Self {
        self.cadence = steps_per_minute;
        self
    }

    /// Creates a steady runner with no day-to-day variance.
    pub fn steady(pace_min_per_km: f64) -> Self {
        Self {
            variance: 0.0,
            ..Self::with_pace(pace_min_per_km)
        }
    }

    /// Creates an elite runner profile (~3:30/km, 180 spm).
    pub fn elite() -> Self {
        Self::with_pace(3.5).with_cadence(180.0)
    }

    /// Creates a recreational runner profile (~6:30/km, 155 spm).
    pub fn recreational() -> Self {
        Self::with_pace(6.5).with_cadence(155.0)
    }

    pub fn base_speed_mps(&self) -> f64 {
        self.base_speed
    }

    pub fn cadence_spm(&self) -> f64 {
        self.cadence
    }

    /// Samples today's performance factor around 1.0.
    fn sample_variance(&self, rng: &mut impl Rng) -> f64 {
        match Normal::new(1.0, self.variance) {
            Ok(normal) if self.variance > 0.0 => normal.sample(rng).clamp(0.8, 1.2),
            _ => 1.0,
        }
    }

    /// Generates the sample stream for a run of `duration_s` seconds heading
    /// north from `origin`.
    pub fn generate_samples(
        &self,
        start: OffsetDateTime,
        origin: Point,
        duration_s: f64,
        noise: &SampleNoise,
        rng: &mut impl Rng,
    ) -> Vec<RunSample> {
        let speed = self.base_speed * self.sample_variance(rng);
        let interval = Normal::new(1.0, noise.interval_jitter_s.max(0.0)).ok();
        let jitter = Normal::new(0.0, noise.gps_jitter_m.max(0.0)).ok();

        let mut samples: Vec<RunSample> = Vec::new();
        let mut t = 0.0;
        let mut d = 0.0;
        while t < duration_s {
            let dt = interval
                .map_or(1.0, |n| n.sample(rng))
                .clamp(0.2, 3.0);
            t += dt;
            d += speed * dt;

            let (north, east) = match jitter {
                Some(n) if noise.gps_jitter_m > 0.0 => (d + n.sample(rng), n.sample(rng)),
                _ => (d, 0.0),
            };
            let lat = origin.y() + north / METERS_PER_DEGREE_LAT;
            let lon = origin.x()
                + east / (METERS_PER_DEGREE_LAT * origin.y().to_radians().cos());

            let sample = RunSample::new(start + Duration::seconds_f64(t), d)
                .with_coordinate(Point::new(lon, lat));
            samples.push(sample);

            if rng.gen_bool(noise.duplicate_probability.clamp(0.0, 1.0)) {
                samples.push(sample);
            }
            if samples.len() >= 2 && rng.gen_bool(noise.out_of_order_probability.clamp(0.0, 1.0)) {
                let n = samples.len();
                samples.swap(n - 1, n - 2);
            }
        }
        samples
    }
}
