//! Candidate tracks for one BPM session and their consumption state.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::models::Track;

#[derive(Debug)]
pub struct TrackCatalog {
    all_available: HashMap<String, f64>,
    unqueued_ids: VecDeque<String>,
    /// Copies of each id currently believed to be in the player's queue.
    queued_ids: HashMap<String, usize>,
    played_ids: HashSet<String>,
    queued_count: usize,
    passes: usize,
    rng: StdRng,
}

impl Default for TrackCatalog {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic shuffles, for tests and simulations.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            all_available: HashMap::new(),
            unqueued_ids: VecDeque::new(),
            queued_ids: HashMap::new(),
            played_ids: HashSet::new(),
            queued_count: 0,
            passes: 0,
            rng,
        }
    }

    /// Replaces the candidate set and shuffles it into the work queue.
    pub fn initialize_batching(&mut self, tracks: HashMap<String, f64>) {
        self.all_available = tracks;
        self.passes = 0;
        self.reshuffle();
        tracing::debug!("Catalog initialized with {} tracks", self.all_available.len());
    }

    /// Starts a new pass over every known id, including played ones.
    pub fn reshuffle(&mut self) {
        let mut ids: Vec<String> = self.all_available.keys().cloned().collect();
        // HashMap order is random; sort so a seeded rng fully determines the pass.
        ids.sort_unstable();
        ids.shuffle(&mut self.rng);
        self.unqueued_ids = ids.into();
        self.passes += 1;
    }

    /// Takes up to `count` ids off the front of the work queue.
    pub fn next_batch(&mut self, count: usize) -> Vec<Track> {
        let take = count.min(self.unqueued_ids.len());
        self.unqueued_ids
            .drain(..take)
            .filter_map(|id| {
                let bpm = *self.all_available.get(&id)?;
                Some(Track::new(id, bpm))
            })
            .collect()
    }

    /// Records one more queued copy of `id`.
    pub fn mark_queued(&mut self, id: &str) {
        *self.queued_ids.entry(id.to_string()).or_default() += 1;
        self.queued_count += 1;
    }

    /// Consumes one queued copy of `id` and records it as played. Returns
    /// false if no copy was queued.
    pub fn mark_played(&mut self, id: &str) -> bool {
        let Some(copies) = self.queued_ids.get_mut(id) else {
            return false;
        };
        *copies -= 1;
        if *copies == 0 {
            self.queued_ids.remove(id);
        }
        self.played_ids.insert(id.to_string());
        self.queued_count = self.queued_count.saturating_sub(1);
        true
    }

    pub fn is_queued(&self, id: &str) -> bool {
        self.queued_ids.contains_key(id)
    }

    /// Queued copies of `id` not yet played.
    pub fn queued_copies(&self, id: &str) -> usize {
        self.queued_ids.get(id).copied().unwrap_or(0)
    }

    pub fn is_played(&self, id: &str) -> bool {
        self.played_ids.contains(id)
    }

    /// Forgets what is queued or played; the candidate set is kept.
    pub fn clear_consumption(&mut self) {
        self.queued_ids.clear();
        self.played_ids.clear();
        self.queued_count = 0;
    }

    pub fn clear(&mut self) {
        self.all_available.clear();
        self.unqueued_ids.clear();
        self.clear_consumption();
        self.passes = 0;
    }

    pub fn total(&self) -> usize {
        self.all_available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_available.is_empty()
    }

    pub fn unqueued_len(&self) -> usize {
        self.unqueued_ids.len()
    }

    pub fn unqueued_ids(&self) -> impl Iterator<Item = &str> {
        self.unqueued_ids.iter().map(String::as_str)
    }

    pub fn queued_len(&self) -> usize {
        self.queued_ids.len()
    }

    pub fn played_len(&self) -> usize {
        self.played_ids.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queued_count
    }

    pub fn passes(&self) -> usize {
        self.passes
    }
}
