//! Synthetic runners.
//!
//! Profiles turn a target speed and cadence into the noisy, irregular sample
//! stream a phone's location and pedometer sensors produce.

mod runner;

pub use runner::RunnerProfile;

/// Imperfections injected into generated sample streams.
#[derive(Debug, Clone)]
pub struct SampleNoise {
    /// Standard deviation of the ~1 s sampling interval, in seconds.
    pub interval_jitter_s: f64,
    /// Probability that a sample is delivered twice.
    pub duplicate_probability: f64,
    /// Probability that a sample arrives before its predecessor.
    pub out_of_order_probability: f64,
    /// GPS position jitter standard deviation in meters.
    pub gps_jitter_m: f64,
}

impl Default for SampleNoise {
    fn default() -> Self {
        Self {
            interval_jitter_s: 0.25,
            duplicate_probability: 0.02,
            out_of_order_probability: 0.01,
            gps_jitter_m: 3.0,
        }
    }
}

impl SampleNoise {
    /// Perfectly regular 1 Hz samples.
    pub fn none() -> Self {
        Self {
            interval_jitter_s: 0.0,
            duplicate_probability: 0.0,
            out_of_order_probability: 0.0,
            gps_jitter_m: 0.0,
        }
    }
}
