//! In-memory track backend.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use stride::{backend::BackendClient, models::Feedback};

/// Answers BPM queries from a fixed library.
pub struct StaticBackend {
    library: HashMap<String, f64>,
    /// Accepted distance from the target tempo.
    tolerance_bpm: f64,
    feedback: Mutex<Vec<(String, Feedback)>>,
    playlists: Mutex<usize>,
}

impl StaticBackend {
    pub fn new(library: HashMap<String, f64>, tolerance_bpm: f64) -> Self {
        Self {
            library,
            tolerance_bpm,
            feedback: Mutex::new(Vec::new()),
            playlists: Mutex::new(0),
        }
    }

    pub fn feedback(&self) -> Vec<(String, Feedback)> {
        self.feedback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn matching(&self, target_bpm: f64) -> HashMap<String, f64> {
        self.library
            .iter()
            .filter(|(_, bpm)| (**bpm - target_bpm).abs() <= self.tolerance_bpm)
            .map(|(id, bpm)| (id.clone(), *bpm))
            .collect()
    }
}

#[async_trait]
impl BackendClient for StaticBackend {
    async fn tracks_by_bpm(&self, target_bpm: f64, _sources: &[String]) -> HashMap<String, f64> {
        self.matching(target_bpm)
    }

    async fn create_playlist(&self, bpm: f64, _sources: &[String]) -> Option<String> {
        if self.matching(bpm).is_empty() {
            return None;
        }
        let mut count = self.playlists.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        Some(format!("playlist-{}-{:.0}", *count, bpm))
    }

    async fn send_feedback(&self, track_id: &str, feedback: Feedback) -> bool {
        if !self.library.contains_key(track_id) {
            return false;
        }
        self.feedback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((track_id.to_string(), feedback));
        true
    }

    async fn register_user(&self) -> bool {
        true
    }
}
