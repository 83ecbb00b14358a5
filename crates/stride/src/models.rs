use std::{
    fmt,
    hash::{Hash, Hasher},
};

use geo::Point;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Meters in one statute mile.
pub const METERS_PER_MILE: f64 = 1609.344;

/// A single reading from the distance source (GPS or pedometer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSample {
    pub timestamp: OffsetDateTime,
    pub cumulative_distance_meters: f64,
    /// x = longitude, y = latitude
    pub coordinate: Option<Point>,
}

impl RunSample {
    pub fn new(timestamp: OffsetDateTime, cumulative_distance_meters: f64) -> Self {
        Self {
            timestamp,
            cumulative_distance_meters,
            coordinate: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Point) -> Self {
        self.coordinate = Some(coordinate);
        self
    }
}

/// Derived statistics for the active (or last finished) run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub total_distance_meters: f64,
    pub elapsed_time_seconds: f64,
    pub overall_pace_seconds_per_km: f64,
    /// Time taken over the most recently completed mile.
    pub rolling_mile_pace_seconds: Option<f64>,
    pub route: Vec<Point>,
}

impl RunStats {
    /// Overall pace expressed in seconds per kilometer or per mile.
    pub fn overall_pace_per(&self, unit: UnitSystem) -> f64 {
        match unit {
            UnitSystem::Metric => self.overall_pace_seconds_per_km,
            UnitSystem::Imperial => self.overall_pace_seconds_per_km * METERS_PER_MILE / 1000.0,
        }
    }
}

/// Entry of the engine's interpolation log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaceDataPoint {
    pub timestamp: OffsetDateTime,
    pub cumulative_distance_meters: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn pace_label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "/km",
            UnitSystem::Imperial => "/mi",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "metric" | "km" => Some(UnitSystem::Metric),
            "imperial" | "mi" => Some(UnitSystem::Imperial),
            _ => None,
        }
    }
}

/// A BPM-matched candidate. Identity is the id alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub bpm: f64,
    pub name: Option<String>,
    pub artist: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, bpm: f64) -> Self {
        Self {
            id: id.into(),
            bpm,
            name: None,
            artist: None,
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Snapshot delivered by the remote player on every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub is_paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    Off,
    Track,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Feedback {
    Like,
    Dislike,
}

/// Lifecycle of the remote queue for one BPM session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueuePhase {
    #[default]
    Idle,
    Initialized,
    Flushing,
    InitialBatchQueued,
    Steady,
    Cleared,
}

impl QueuePhase {
    /// Whether track changes may trigger a refill.
    pub fn accepts_refill(self) -> bool {
        matches!(self, QueuePhase::InitialBatchQueued | QueuePhase::Steady)
    }
}

/// Notifications published by the scheduler for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerStatus {
    NotConnected,
    NoSongs,
    Preparing { total: usize },
    Flushing,
    FlushTimedOut { skips: usize },
    Queued { queued: usize, total: usize },
    Refilled { queued: usize },
    Cleared,
}

impl fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerStatus::NotConnected => write!(f, "Music player is not connected"),
            SchedulerStatus::NoSongs => write!(f, "No songs found for this tempo"),
            SchedulerStatus::Preparing { total } => write!(f, "Preparing {total} songs"),
            SchedulerStatus::Flushing => write!(f, "Clearing the current queue"),
            SchedulerStatus::FlushTimedOut { skips } => {
                write!(f, "Could not fully clear the queue after {skips} skips")
            }
            SchedulerStatus::Queued { queued, total } => {
                write!(f, "Queued {queued} of {total} songs")
            }
            SchedulerStatus::Refilled { queued } => write!(f, "Queued {queued} more songs"),
            SchedulerStatus::Cleared => write!(f, "Queue cleared"),
        }
    }
}
