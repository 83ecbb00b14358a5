//! One active run: stats engine, queue scheduler and backend under a single owner.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::{
    backend::BackendClient,
    config::StrideConfig,
    errors::{PlayerError, SampleError},
    models::{Feedback, RunSample, RunStats},
    player::RemotePlayer,
    scheduler::QueueScheduler,
    stats::RunningStatsEngine,
};

pub struct RunSession {
    id: Uuid,
    config: StrideConfig,
    engine: RunningStatsEngine,
    scheduler: QueueScheduler,
    backend: Arc<dyn BackendClient>,
    stats_tx: watch::Sender<RunStats>,
    listener: Option<JoinHandle<()>>,
}

impl RunSession {
    pub fn new(
        config: StrideConfig,
        player: Arc<dyn RemotePlayer>,
        backend: Arc<dyn BackendClient>,
    ) -> Self {
        let scheduler = QueueScheduler::new(player, config.scheduler.clone());
        Self::with_scheduler(config, scheduler, backend)
    }

    pub fn with_scheduler(
        config: StrideConfig,
        scheduler: QueueScheduler,
        backend: Arc<dyn BackendClient>,
    ) -> Self {
        let (stats_tx, _) = watch::channel(RunStats::default());
        Self {
            id: Uuid::new_v4(),
            engine: RunningStatsEngine::new(config.stats.pace_log_capacity),
            config,
            scheduler,
            backend,
            stats_tx,
            listener: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &StrideConfig {
        &self.config
    }

    pub fn stats(&self) -> &RunStats {
        self.engine.stats()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn scheduler(&self) -> &QueueScheduler {
        &self.scheduler
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<RunStats> {
        self.stats_tx.subscribe()
    }

    fn publish_stats(&self) {
        self.stats_tx.send_replace(self.engine.stats().clone());
    }

    /// Starts a run now. Must be called from within a tokio runtime.
    pub fn start_run(&mut self) {
        self.start_run_at(OffsetDateTime::now_utc());
    }

    pub fn start_run_at(&mut self, started_at: OffsetDateTime) {
        let _span = info_span!("run", session = %self.id).entered();
        self.engine.start_run(started_at);
        self.ensure_listener();
        self.publish_stats();
    }

    /// Flush confirmations depend on the player state listener.
    fn ensure_listener(&mut self) {
        if self.listener.as_ref().is_none_or(|l| l.is_finished()) {
            self.listener = Some(self.scheduler.start());
        }
    }

    pub fn record_sample(&mut self, sample: RunSample) -> Result<(), SampleError> {
        self.engine.record_sample(
            sample.cumulative_distance_meters,
            sample.timestamp,
            sample.coordinate,
        )?;
        self.publish_stats();
        Ok(())
    }

    pub fn stop_run(&mut self) {
        self.stop_run_at(OffsetDateTime::now_utc());
    }

    pub fn stop_run_at(&mut self, now: OffsetDateTime) {
        let _span = info_span!("run", session = %self.id).entered();
        self.engine.stop_run(now);
        self.scheduler.clear();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.publish_stats();
    }

    /// Fetches tracks matching `bpm` and rebuilds the player's queue from them.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn change_tempo(
        &mut self,
        bpm: f64,
        sources: &[String],
    ) -> Result<usize, PlayerError> {
        self.ensure_listener();
        async {
            let tracks = self.backend.tracks_by_bpm(bpm, sources).await;
            tracing::info!("Fetched {} tracks for {bpm:.0} bpm", tracks.len());
            self.scheduler
                .refresh_songs_and_queue(tracks, self.config.scheduler.initial_batch_size)
                .await
        }
        .instrument(info_span!("tempo", session = %self.id, bpm))
        .await
    }

    pub async fn send_feedback(&self, track_id: &str, feedback: Feedback) -> bool {
        self.backend.send_feedback(track_id, feedback).await
    }
}

impl Drop for RunSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
