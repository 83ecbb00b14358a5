//! Keeps the remote player's queue filled with BPM-matched tracks.
//!
//! All bookkeeping lives in one [`QueueState`] behind a mutex that is never
//! held across an `.await`. The player's async calls are the only suspension
//! points, so every call chain observes a consistent catalog between them.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    sync::{broadcast, watch},
    task::JoinHandle,
};

use crate::{
    catalog::TrackCatalog,
    config::SchedulerConfig,
    errors::PlayerError,
    models::{PlayerState, QueuePhase, SchedulerStatus, Track},
    player::RemotePlayer,
};

/// Pause before retrying when a skip could not be issued.
const SKIP_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub reached_placeholder: bool,
    /// Skips attempted while searching for the placeholder.
    pub skips: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipResult {
    Confirmed,
    Unconfirmed,
    Failed,
    Busy,
}

#[derive(Debug)]
struct QueueState {
    catalog: TrackCatalog,
    phase: QueuePhase,
    has_queued_songs: bool,
    /// Bumped whenever the candidate set is replaced or dropped.
    generation: u64,
}

struct Inner {
    player: Arc<dyn RemotePlayer>,
    config: SchedulerConfig,
    state: Mutex<QueueState>,
    loading_more: AtomicBool,
    skipping: AtomicBool,
    current_track: watch::Sender<Option<String>>,
    status: broadcast::Sender<SchedulerStatus>,
}

/// Set while held; released on drop.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct QueueScheduler {
    inner: Arc<Inner>,
}

impl QueueScheduler {
    pub fn new(player: Arc<dyn RemotePlayer>, config: SchedulerConfig) -> Self {
        Self::with_catalog(player, config, TrackCatalog::new())
    }

    pub fn with_catalog(
        player: Arc<dyn RemotePlayer>,
        config: SchedulerConfig,
        catalog: TrackCatalog,
    ) -> Self {
        let (current_track, _) = watch::channel(None);
        let (status, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(Inner {
                player,
                config,
                state: Mutex::new(QueueState {
                    catalog,
                    phase: QueuePhase::Idle,
                    has_queued_songs: false,
                    generation: 0,
                }),
                loading_more: AtomicBool::new(false),
                skipping: AtomicBool::new(false),
                current_track,
                status,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, status: SchedulerStatus) {
        tracing::info!("{status}");
        // No subscribers is fine.
        let _ = self.inner.status.send(status);
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<SchedulerStatus> {
        self.inner.status.subscribe()
    }

    pub fn queued_songs_count(&self) -> usize {
        self.state().catalog.queued_count()
    }

    pub fn has_queued_songs(&self) -> bool {
        self.state().has_queued_songs
    }

    pub fn phase(&self) -> QueuePhase {
        self.state().phase
    }

    pub fn current_track_id(&self) -> Option<String> {
        self.inner.current_track.borrow().clone()
    }

    pub fn is_loading_more_songs(&self) -> bool {
        self.inner.loading_more.load(Ordering::Acquire)
    }

    /// Read-only view of the catalog.
    pub fn with_catalog_view<R>(&self, f: impl FnOnce(&TrackCatalog) -> R) -> R {
        f(&self.state().catalog)
    }

    /// Forwards the player's state stream into [`Self::handle_player_state`].
    ///
    /// The task holds only a weak reference and ends once the scheduler is
    /// dropped or the player closes its stream.
    pub fn start(&self) -> JoinHandle<()> {
        let mut states = self.inner.player.subscribe();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                match states.recv().await {
                    Ok(state) => {
                        let Some(inner) = weak.upgrade() else { break };
                        QueueScheduler { inner }.handle_player_state(state);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {missed} player state updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("Player state listener stopped");
        })
    }

    pub fn initialize_batching(&self, tracks: HashMap<String, f64>) {
        {
            let mut state = self.state();
            state.catalog.initialize_batching(tracks);
            state.phase = QueuePhase::Initialized;
            state.generation += 1;
        }
        self.inner.loading_more.store(false, Ordering::Release);
    }

    pub fn next_batch(&self, count: usize) -> Vec<Track> {
        self.state().catalog.next_batch(count)
    }

    /// Enqueues `batch` in order, one call at a time. Returns how many were
    /// accepted by the player.
    pub async fn queue_batch(
        &self,
        batch: Vec<Track>,
        skip_after_first: bool,
        allow_requeue: bool,
    ) -> usize {
        let generation = self.state().generation;
        self.queue_batch_for(generation, batch, skip_after_first, allow_requeue)
            .await
    }

    /// Like [`Self::queue_batch`], but stops as soon as the catalog that
    /// `batch` was drawn from has been replaced.
    async fn queue_batch_for(
        &self,
        generation: u64,
        batch: Vec<Track>,
        skip_after_first: bool,
        allow_requeue: bool,
    ) -> usize {
        let mut queued = 0;
        for track in batch {
            {
                let state = self.state();
                if state.generation != generation {
                    tracing::debug!("Catalog replaced, dropping the rest of the batch");
                    break;
                }
                if !allow_requeue && state.catalog.is_queued(&track.id) {
                    tracing::debug!("Track {} already queued", track.id);
                    continue;
                }
            }

            let uri = self.inner.config.track_uri(&track.id);
            if let Err(e) = self.inner.player.enqueue(&uri).await {
                tracing::warn!("Failed to enqueue {}: {e}", track.id);
                continue;
            }

            {
                let mut state = self.state();
                if state.generation != generation {
                    tracing::warn!("Queued {} after its catalog was replaced", track.id);
                    break;
                }
                state.catalog.mark_queued(&track.id);
            }
            queued += 1;
            tracing::debug!("Queued {} ({:.0} bpm)", track.id, track.bpm);

            if skip_after_first && queued == 1 {
                // Move off whatever was playing onto the first candidate.
                self.skip(false).await;
            }
        }
        queued
    }

    /// Bookkeeping for one player state update.
    pub fn handle_player_state(&self, state: PlayerState) {
        let previous = self.current_track_id();
        if previous.as_deref() == Some(state.track_id.as_str()) {
            return;
        }
        self.inner
            .current_track
            .send_replace(Some(state.track_id.clone()));

        let refill = {
            let mut queue = self.state();
            if let Some(prev) = previous.as_deref()
                && queue.catalog.mark_played(prev)
            {
                tracing::debug!(
                    "Played {prev}, {} left in queue",
                    queue.catalog.queued_count()
                );
            }
            let depth = queue.catalog.queued_count();
            queue.phase.accepts_refill()
                && depth > 0
                && depth <= self.inner.config.low_water_mark
        };

        if refill {
            self.spawn_refill();
        }
    }

    fn spawn_refill(&self) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("No runtime available for queue refill");
            return;
        };
        let this = self.clone();
        let count = self.inner.config.refill_batch_size;
        handle.spawn(async move {
            this.queue_more_songs(count).await;
        });
    }

    /// Draws and queues the next batch. At most one runs at a time.
    pub async fn queue_more_songs(&self, count: usize) -> usize {
        let Some(_loading) = FlagGuard::acquire(&self.inner.loading_more) else {
            tracing::debug!("Refill already in progress");
            return 0;
        };

        let (generation, batch, allow_requeue) = {
            let mut state = self.state();
            let mut allow_requeue = false;
            if state.catalog.unqueued_len() == 0 && !state.catalog.is_empty() {
                state.catalog.reshuffle();
                allow_requeue = true;
                tracing::info!(
                    "All {} tracks used, starting pass {}",
                    state.catalog.total(),
                    state.catalog.passes()
                );
            }
            (state.generation, state.catalog.next_batch(count), allow_requeue)
        };
        if batch.is_empty() {
            return 0;
        }

        let queued = self
            .queue_batch_for(generation, batch, false, allow_requeue)
            .await;
        {
            let mut state = self.state();
            if state.generation != generation {
                return queued;
            }
            if queued > 0 {
                state.has_queued_songs = true;
            }
            if state.phase == QueuePhase::InitialBatchQueued {
                state.phase = QueuePhase::Steady;
            }
        }
        self.publish(SchedulerStatus::Refilled { queued });
        queued
    }

    async fn skip(&self, wait_for_change: bool) -> SkipResult {
        let Some(_skipping) = FlagGuard::acquire(&self.inner.skipping) else {
            tracing::debug!("Skip already in flight");
            return SkipResult::Busy;
        };

        // Subscribing marks the current value as seen.
        let mut changes = self.inner.current_track.subscribe();
        if let Err(e) = self.inner.player.skip_next().await {
            tracing::warn!("Skip failed: {e}");
            return SkipResult::Failed;
        }
        if !wait_for_change {
            return SkipResult::Unconfirmed;
        }

        let timeout = self.inner.config.skip_confirm_timeout();
        match tokio::time::timeout(timeout, changes.changed()).await {
            Ok(Ok(())) => SkipResult::Confirmed,
            Ok(Err(_)) => SkipResult::Unconfirmed,
            Err(_) => {
                tracing::warn!("No track change within {timeout:?} after skip");
                SkipResult::Unconfirmed
            }
        }
    }

    /// Clears the player's existing queue by skipping to a placeholder track.
    ///
    /// Consumption bookkeeping is reset whatever the outcome.
    pub async fn flush_queue(&self) -> FlushOutcome {
        self.state().phase = QueuePhase::Flushing;
        self.publish(SchedulerStatus::Flushing);

        let config = &self.inner.config;
        let placeholder = config.placeholder_track_id.as_str();
        let mut outcome = FlushOutcome {
            reached_placeholder: false,
            skips: 0,
        };

        match self.inner.player.enqueue(&config.track_uri(placeholder)).await {
            Ok(()) => {
                loop {
                    if self.current_track_id().as_deref() == Some(placeholder) {
                        outcome.reached_placeholder = true;
                        break;
                    }
                    if outcome.skips >= config.max_flush_skips {
                        break;
                    }
                    outcome.skips += 1;
                    match self.skip(true).await {
                        SkipResult::Confirmed | SkipResult::Unconfirmed => {}
                        SkipResult::Failed | SkipResult::Busy => {
                            tokio::time::sleep(SKIP_RETRY_DELAY).await;
                        }
                    }
                }
                if outcome.reached_placeholder {
                    self.skip(true).await;
                }
            }
            Err(e) => tracing::warn!("Failed to enqueue placeholder track: {e}"),
        }

        {
            let mut state = self.state();
            state.catalog.clear_consumption();
            state.has_queued_songs = false;
        }

        if !outcome.reached_placeholder {
            tracing::warn!("Flush gave up after {} skips", outcome.skips);
            self.publish(SchedulerStatus::FlushTimedOut {
                skips: outcome.skips,
            });
        }
        outcome
    }

    /// Queues the first batch of a session and skips onto it.
    pub async fn queue_initial_batch(&self, size: usize) -> usize {
        let batch = self.next_batch(size);
        let queued = self.queue_batch(batch, true, false).await;
        let mut state = self.state();
        state.has_queued_songs = queued > 0;
        state.phase = QueuePhase::InitialBatchQueued;
        queued
    }

    /// Replaces the candidate set and rebuilds the player's queue from it.
    pub async fn refresh_songs_and_queue(
        &self,
        tracks: HashMap<String, f64>,
        initial_batch_size: usize,
    ) -> Result<usize, PlayerError> {
        if !self.inner.player.is_connected() {
            self.publish(SchedulerStatus::NotConnected);
            return Err(PlayerError::NotConnected);
        }
        if tracks.is_empty() {
            self.publish(SchedulerStatus::NoSongs);
            return Ok(0);
        }

        let total = tracks.len();
        self.publish(SchedulerStatus::Preparing { total });
        self.initialize_batching(tracks);
        self.flush_queue().await;
        let queued = self.queue_initial_batch(initial_batch_size).await;
        self.publish(SchedulerStatus::Queued { queued, total });
        Ok(queued)
    }

    /// Drops the candidate set, e.g. when the run ends.
    pub fn clear(&self) {
        {
            let mut state = self.state();
            state.catalog.clear();
            state.has_queued_songs = false;
            state.phase = QueuePhase::Cleared;
            state.generation += 1;
        }
        self.publish(SchedulerStatus::Cleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::{HashSet, VecDeque},
        sync::atomic::AtomicUsize,
    };

    use async_trait::async_trait;

    use crate::{models::RepeatMode, player::PlayerResult};

    const PREFIX: &str = "spotify:track:";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Enqueue(String),
        Skip,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum SkipMode {
        /// Skip plays the next queued id, if any.
        Queue,
        /// Skip always lands on a fresh track outside the queue.
        Filler,
        /// Skip never reports a change.
        Silent,
    }

    struct RecordingPlayer {
        calls: Mutex<Vec<Call>>,
        queue: Mutex<VecDeque<String>>,
        failing: Mutex<HashSet<String>>,
        connected: AtomicBool,
        mode: SkipMode,
        enqueue_delay: Option<Duration>,
        fillers: AtomicUsize,
        states: broadcast::Sender<PlayerState>,
    }

    impl RecordingPlayer {
        fn new(mode: SkipMode) -> Self {
            let (states, _) = broadcast::channel(64);
            Self {
                calls: Mutex::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                failing: Mutex::new(HashSet::new()),
                connected: AtomicBool::new(true),
                mode,
                enqueue_delay: None,
                fillers: AtomicUsize::new(0),
                states,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn enqueued(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Enqueue(id) => Some(id),
                    Call::Skip => None,
                })
                .collect()
        }

        fn skips(&self) -> usize {
            self.calls().iter().filter(|c| **c == Call::Skip).count()
        }

        fn emit(&self, track_id: String) {
            let _ = self.states.send(PlayerState {
                track_id,
                track_name: String::new(),
                artist_name: String::new(),
                is_paused: false,
            });
        }
    }

    #[async_trait]
    impl RemotePlayer for RecordingPlayer {
        async fn connect(&self) -> PlayerResult {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn disconnect(&self) -> PlayerResult {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        async fn play(&self, _uri: &str) -> PlayerResult {
            Ok(())
        }
        async fn pause(&self) -> PlayerResult {
            Ok(())
        }
        async fn resume(&self) -> PlayerResult {
            Ok(())
        }
        async fn skip_next(&self) -> PlayerResult {
            self.calls.lock().unwrap().push(Call::Skip);
            match self.mode {
                SkipMode::Queue => {
                    let next = self.queue.lock().unwrap().pop_front();
                    if let Some(id) = next {
                        self.emit(id);
                    }
                }
                SkipMode::Filler => {
                    let n = self.fillers.fetch_add(1, Ordering::SeqCst);
                    self.emit(format!("filler-{n}"));
                }
                SkipMode::Silent => {}
            }
            Ok(())
        }
        async fn skip_previous(&self) -> PlayerResult {
            Ok(())
        }
        async fn seek(&self, _position_ms: u64) -> PlayerResult {
            Ok(())
        }
        async fn enqueue(&self, uri: &str) -> PlayerResult {
            if let Some(delay) = self.enqueue_delay {
                tokio::time::sleep(delay).await;
            }
            let id = uri.strip_prefix(PREFIX).unwrap_or(uri).to_string();
            if self.failing.lock().unwrap().contains(&id) {
                return Err(PlayerError::Rejected(format!("cannot queue {id}")));
            }
            self.calls.lock().unwrap().push(Call::Enqueue(id.clone()));
            self.queue.lock().unwrap().push_back(id);
            Ok(())
        }
        async fn set_repeat_mode(&self, _mode: RepeatMode) -> PlayerResult {
            Ok(())
        }
        fn subscribe(&self) -> broadcast::Receiver<PlayerState> {
            self.states.subscribe()
        }
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            placeholder_track_id: "placeholder".into(),
            track_uri_prefix: PREFIX.into(),
            skip_confirm_timeout_ms: 200,
            ..Default::default()
        }
    }

    fn scheduler(player: &Arc<RecordingPlayer>, config: SchedulerConfig) -> QueueScheduler {
        QueueScheduler::with_catalog(player.clone(), config, TrackCatalog::with_seed(42))
    }

    fn tracks(n: usize) -> HashMap<String, f64> {
        (0..n).map(|i| (format!("t{i}"), 150.0 + i as f64)).collect()
    }

    fn batch(ids: &[&str]) -> Vec<Track> {
        ids.iter().map(|id| Track::new(*id, 150.0)).collect()
    }

    fn state(track_id: &str) -> PlayerState {
        PlayerState {
            track_id: track_id.into(),
            track_name: String::new(),
            artist_name: String::new(),
            is_paused: false,
        }
    }

    #[tokio::test]
    async fn test_skip_after_first_ordering() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let scheduler = scheduler(&player, test_config());

        let queued = scheduler.queue_batch(batch(&["a", "b"]), true, false).await;

        assert_eq!(queued, 2);
        assert_eq!(
            player.calls(),
            vec![Call::Enqueue("a".into()), Call::Skip, Call::Enqueue("b".into())]
        );
        assert_eq!(scheduler.queued_songs_count(), 2);
    }

    #[tokio::test]
    async fn test_queue_batch_deduplicates() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let scheduler = scheduler(&player, test_config());

        scheduler.queue_batch(batch(&["a", "b"]), false, false).await;
        scheduler.queue_batch(batch(&["b", "c"]), false, false).await;

        assert_eq!(player.enqueued(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.queued_songs_count(), 3);

        scheduler.queue_batch(batch(&["a"]), false, true).await;
        assert_eq!(player.enqueued(), vec!["a", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_partial_batch_on_failure() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        player.failing.lock().unwrap().insert("a".into());
        player.failing.lock().unwrap().insert("c".into());
        let scheduler = scheduler(&player, test_config());

        let queued = scheduler
            .queue_batch(batch(&["a", "b", "c", "d"]), true, false)
            .await;

        assert_eq!(queued, 2);
        // The skip follows the first enqueue that actually succeeded.
        assert_eq!(
            player.calls(),
            vec![Call::Enqueue("b".into()), Call::Skip, Call::Enqueue("d".into())]
        );
        assert!(scheduler.with_catalog_view(|c| !c.is_queued("a") && c.is_queued("d")));
    }

    #[tokio::test]
    async fn test_flush_terminates_when_placeholder_never_plays() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Filler));
        let scheduler = scheduler(&player, test_config());
        let listener = scheduler.start();
        scheduler.queue_batch(batch(&["a", "b"]), false, false).await;
        scheduler.state().has_queued_songs = true;

        let outcome = scheduler.flush_queue().await;

        assert!(!outcome.reached_placeholder);
        assert_eq!(outcome.skips, 50);
        assert_eq!(player.skips(), 50);
        assert_eq!(scheduler.queued_songs_count(), 0);
        assert!(!scheduler.has_queued_songs());
        scheduler.with_catalog_view(|c| {
            assert_eq!(c.queued_len(), 0);
            assert_eq!(c.played_len(), 0);
        });
        listener.abort();
    }

    #[tokio::test]
    async fn test_flush_survives_silent_player() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let config = SchedulerConfig {
            max_flush_skips: 3,
            skip_confirm_timeout_ms: 10,
            ..test_config()
        };
        let scheduler = scheduler(&player, config);
        let mut statuses = scheduler.subscribe_status();

        let outcome = scheduler.flush_queue().await;

        assert_eq!(
            outcome,
            FlushOutcome {
                reached_placeholder: false,
                skips: 3
            }
        );
        assert_eq!(statuses.recv().await.unwrap(), SchedulerStatus::Flushing);
        assert_eq!(
            statuses.recv().await.unwrap(),
            SchedulerStatus::FlushTimedOut { skips: 3 }
        );
    }

    #[tokio::test]
    async fn test_flush_stops_past_placeholder() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Queue));
        player
            .queue
            .lock()
            .unwrap()
            .extend(["old1".to_string(), "old2".to_string()]);
        let config = SchedulerConfig {
            skip_confirm_timeout_ms: 50,
            ..test_config()
        };
        let scheduler = scheduler(&player, config);
        let listener = scheduler.start();

        let outcome = scheduler.flush_queue().await;

        assert!(outcome.reached_placeholder);
        assert_eq!(outcome.skips, 3);
        // Three skips to reach it, one more to move past it.
        assert_eq!(player.skips(), 4);
        assert!(player.queue.lock().unwrap().is_empty());
        listener.abort();
    }

    #[tokio::test]
    async fn test_track_change_moves_queued_to_played() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let scheduler = scheduler(&player, test_config());
        scheduler.queue_batch(batch(&["a", "b", "c"]), false, false).await;

        scheduler.handle_player_state(state("a"));
        assert_eq!(scheduler.queued_songs_count(), 3);

        // Pause updates for the same track are not track changes.
        scheduler.handle_player_state(PlayerState {
            is_paused: true,
            ..state("a")
        });
        assert_eq!(scheduler.queued_songs_count(), 3);

        scheduler.handle_player_state(state("b"));
        assert_eq!(scheduler.queued_songs_count(), 2);
        assert!(scheduler.with_catalog_view(|c| c.is_played("a")));
        assert_eq!(scheduler.current_track_id().as_deref(), Some("b"));

        // Unknown tracks do not touch the count.
        scheduler.handle_player_state(state("x"));
        scheduler.handle_player_state(state("y"));
        assert_eq!(scheduler.queued_songs_count(), 1);
    }

    #[tokio::test]
    async fn test_depletion_triggers_refill() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let config = SchedulerConfig {
            refill_batch_size: 4,
            ..test_config()
        };
        let scheduler = scheduler(&player, config);
        scheduler.initialize_batching(tracks(20));
        assert_eq!(scheduler.queue_initial_batch(6).await, 6);
        assert_eq!(scheduler.phase(), QueuePhase::InitialBatchQueued);

        let first = player.enqueued()[0].clone();
        let second = player.enqueued()[1].clone();
        scheduler.handle_player_state(state(&first));
        assert_eq!(scheduler.queued_songs_count(), 6);
        scheduler.handle_player_state(state(&second));

        for _ in 0..100 {
            if scheduler.queued_songs_count() > 5 && !scheduler.is_loading_more_songs() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(scheduler.queued_songs_count(), 9);
        assert_eq!(player.enqueued().len(), 10);
        assert_eq!(scheduler.phase(), QueuePhase::Steady);
    }

    #[tokio::test]
    async fn test_no_refill_while_flushing() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let scheduler = scheduler(&player, test_config());
        scheduler.initialize_batching(tracks(20));
        scheduler.queue_batch(scheduler.next_batch(3), false, false).await;
        let ids = player.enqueued();
        scheduler.state().phase = QueuePhase::Flushing;

        scheduler.handle_player_state(state(&ids[0]));
        scheduler.handle_player_state(state(&ids[1]));
        tokio::task::yield_now().await;

        assert_eq!(player.enqueued().len(), 3);
        assert_eq!(scheduler.queued_songs_count(), 2);
    }

    #[tokio::test]
    async fn test_full_cycle_reshuffles() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let scheduler = scheduler(&player, test_config());
        let batch_size = 2;
        let n = 5;
        scheduler.initialize_batching(tracks(n));
        scheduler.queue_initial_batch(batch_size).await;

        for _ in 0..n.div_ceil(batch_size) {
            assert!(scheduler.queue_more_songs(batch_size).await > 0);
        }

        assert!(scheduler.with_catalog_view(|c| c.passes()) >= 2);
        // Reshuffled ids are queued again even though they are still queued.
        assert_eq!(player.enqueued().len(), 7);
        let distinct: HashSet<String> = player.enqueued().into_iter().collect();
        assert_eq!(distinct.len(), 5);
    }

    #[tokio::test]
    async fn test_refill_is_single_flight() {
        let mut player = RecordingPlayer::new(SkipMode::Silent);
        player.enqueue_delay = Some(Duration::from_millis(20));
        let player = Arc::new(player);
        let scheduler = scheduler(&player, test_config());
        scheduler.initialize_batching(tracks(10));

        let (first, second) = tokio::join!(
            scheduler.queue_more_songs(3),
            scheduler.queue_more_songs(3)
        );

        assert_eq!(first + second, 3);
        assert_eq!(player.enqueued().len(), 3);
        assert!(!scheduler.is_loading_more_songs());
        // flag released, a later refill proceeds
        assert_eq!(scheduler.queue_more_songs(3).await, 3);
    }

    #[tokio::test]
    async fn test_refresh_requires_connection() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        player.connected.store(false, Ordering::SeqCst);
        let scheduler = scheduler(&player, test_config());
        let mut statuses = scheduler.subscribe_status();

        let result = scheduler.refresh_songs_and_queue(tracks(5), 3).await;

        assert_eq!(result, Err(PlayerError::NotConnected));
        assert_eq!(statuses.recv().await.unwrap(), SchedulerStatus::NotConnected);
        assert!(player.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_with_no_songs() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let scheduler = scheduler(&player, test_config());
        let mut statuses = scheduler.subscribe_status();

        let result = scheduler.refresh_songs_and_queue(HashMap::new(), 3).await;

        assert_eq!(result, Ok(0));
        assert_eq!(statuses.recv().await.unwrap(), SchedulerStatus::NoSongs);
        assert_eq!(scheduler.phase(), QueuePhase::Idle);
    }

    #[tokio::test]
    async fn test_refresh_flushes_then_queues() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Queue));
        player.queue.lock().unwrap().push_back("old1".to_string());
        let config = SchedulerConfig {
            low_water_mark: 1,
            skip_confirm_timeout_ms: 50,
            ..test_config()
        };
        let scheduler = scheduler(&player, config);
        let listener = scheduler.start();
        let mut statuses = scheduler.subscribe_status();

        let queued = scheduler.refresh_songs_and_queue(tracks(5), 3).await;

        assert_eq!(queued, Ok(3));
        let enqueued = player.enqueued();
        assert_eq!(enqueued[0], "placeholder");
        assert_eq!(enqueued.len(), 4);
        assert_eq!(
            player.calls()[1..],
            [
                Call::Skip,
                Call::Skip,
                Call::Skip,
                Call::Enqueue(enqueued[1].clone()),
                Call::Skip,
                Call::Enqueue(enqueued[2].clone()),
                Call::Enqueue(enqueued[3].clone()),
            ]
        );
        assert!(scheduler.has_queued_songs());
        assert_eq!(scheduler.queued_songs_count(), 3);
        assert_eq!(scheduler.phase(), QueuePhase::InitialBatchQueued);

        assert_eq!(
            statuses.recv().await.unwrap(),
            SchedulerStatus::Preparing { total: 5 }
        );
        assert_eq!(statuses.recv().await.unwrap(), SchedulerStatus::Flushing);
        assert_eq!(
            statuses.recv().await.unwrap(),
            SchedulerStatus::Queued {
                queued: 3,
                total: 5
            }
        );
        listener.abort();
    }

    #[tokio::test]
    async fn test_refill_from_replaced_catalog_is_dropped() {
        let mut player = RecordingPlayer::new(SkipMode::Silent);
        player.enqueue_delay = Some(Duration::from_millis(50));
        let player = Arc::new(player);
        let scheduler = scheduler(&player, test_config());
        scheduler.initialize_batching(tracks(20));

        let refill = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.queue_more_songs(5).await }
        });
        // Land inside the second enqueue.
        tokio::time::sleep(Duration::from_millis(75)).await;
        let fresh = (0..5).map(|i| (format!("n{i}"), 180.0)).collect();
        scheduler.initialize_batching(fresh);

        assert_eq!(refill.await.unwrap(), 1);
        assert_eq!(player.enqueued().len(), 2);
        let second = player.enqueued()[1].clone();
        assert!(scheduler.with_catalog_view(|c| !c.is_queued(&second)));
        assert_eq!(scheduler.phase(), QueuePhase::Initialized);
    }

    #[tokio::test]
    async fn test_track_change_counts_every_requeued_copy() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let scheduler = scheduler(&player, test_config());
        scheduler.queue_batch(batch(&["a", "b"]), false, false).await;
        scheduler.queue_batch(batch(&["a"]), false, true).await;
        assert_eq!(scheduler.queued_songs_count(), 3);

        for id in ["a", "b", "a", "x"] {
            scheduler.handle_player_state(state(id));
        }

        // Both copies of "a" and the one "b" have played.
        assert_eq!(scheduler.queued_songs_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_drops_catalog() {
        let player = Arc::new(RecordingPlayer::new(SkipMode::Silent));
        let scheduler = scheduler(&player, test_config());
        scheduler.initialize_batching(tracks(5));
        scheduler.queue_initial_batch(2).await;

        scheduler.clear();

        assert_eq!(scheduler.phase(), QueuePhase::Cleared);
        assert!(!scheduler.has_queued_songs());
        assert_eq!(scheduler.queued_songs_count(), 0);
        assert_eq!(scheduler.with_catalog_view(|c| c.total()), 0);
    }
}
