//! In-memory remote player.
//!
//! Behaves like a streaming app's queue: enqueued tracks play after the
//! current one, skipping past the end of the queue falls through to
//! autoplay radio, and every call can be made to fail.

use std::{
    collections::VecDeque,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use stride::{
    errors::PlayerError,
    models::{PlayerState, RepeatMode},
    player::{PlayerResult, RemotePlayer},
};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    Play(String),
    Pause,
    Resume,
    SkipNext,
    SkipPrevious,
    Seek(u64),
    Enqueue(String),
    SetRepeatMode(RepeatMode),
}

#[derive(Debug, Default)]
struct Playback {
    current: Option<String>,
    queue: VecDeque<String>,
    history: Vec<String>,
    paused: bool,
    position_ms: u64,
    repeat: Option<RepeatMode>,
    calls: Vec<PlayerCall>,
}

pub struct SimulatedPlayer {
    uri_prefix: String,
    playback: Mutex<Playback>,
    connected: AtomicBool,
    /// Every n-th enqueue fails when non-zero.
    fail_every_nth_enqueue: AtomicUsize,
    enqueue_attempts: AtomicUsize,
    radio_tracks: AtomicUsize,
    states: broadcast::Sender<PlayerState>,
}

impl SimulatedPlayer {
    pub fn new(uri_prefix: impl Into<String>) -> Self {
        let (states, _) = broadcast::channel(256);
        Self {
            uri_prefix: uri_prefix.into(),
            playback: Mutex::new(Playback::default()),
            connected: AtomicBool::new(false),
            fail_every_nth_enqueue: AtomicUsize::new(0),
            enqueue_attempts: AtomicUsize::new(0),
            radio_tracks: AtomicUsize::new(0),
            states,
        }
    }

    fn playback(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track_id<'a>(&self, uri: &'a str) -> &'a str {
        uri.strip_prefix(self.uri_prefix.as_str()).unwrap_or(uri)
    }

    fn ensure_connected(&self) -> PlayerResult {
        if self.is_connected() {
            Ok(())
        } else {
            Err(PlayerError::NotConnected)
        }
    }

    /// Pre-loads tracks as if another app had queued them.
    pub fn seed_queue<I, S>(&self, current: &str, queued: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut playback = self.playback();
        playback.current = Some(current.to_string());
        playback.queue.extend(queued.into_iter().map(Into::into));
    }

    pub fn fail_every_nth_enqueue(&self, n: usize) {
        self.fail_every_nth_enqueue.store(n, Ordering::SeqCst);
    }

    pub fn current_track(&self) -> Option<String> {
        self.playback().current.clone()
    }

    pub fn queue(&self) -> Vec<String> {
        self.playback().queue.iter().cloned().collect()
    }

    /// Tracks that started playing, in order.
    pub fn history(&self) -> Vec<String> {
        self.playback().history.clone()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.playback().calls.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.playback().paused
    }

    pub fn is_radio(track_id: &str) -> bool {
        track_id.starts_with("radio-")
    }

    /// The current track plays to its end and the next one starts.
    pub fn finish_track(&self) {
        self.advance(None);
    }

    fn advance(&self, call: Option<PlayerCall>) {
        let state = {
            let mut playback = self.playback();
            if let Some(call) = call {
                playback.calls.push(call);
            }
            let next = match playback.queue.pop_front() {
                Some(id) => id,
                None => format!("radio-{}", self.radio_tracks.fetch_add(1, Ordering::SeqCst)),
            };
            Self::start_track(&mut playback, next)
        };
        self.emit(state);
    }

    fn start_track(playback: &mut Playback, id: String) -> PlayerState {
        playback.history.push(id.clone());
        playback.current = Some(id.clone());
        playback.position_ms = 0;
        playback.paused = false;
        PlayerState {
            track_name: format!("Track {id}"),
            artist_name: "Simulated Artist".to_string(),
            track_id: id,
            is_paused: false,
        }
    }

    fn emit(&self, state: PlayerState) {
        // Nobody listening is fine.
        let _ = self.states.send(state);
    }

    fn current_state(playback: &Playback) -> Option<PlayerState> {
        playback.current.as_ref().map(|id| PlayerState {
            track_id: id.clone(),
            track_name: format!("Track {id}"),
            artist_name: "Simulated Artist".to_string(),
            is_paused: playback.paused,
        })
    }
}

#[async_trait]
impl RemotePlayer for SimulatedPlayer {
    async fn connect(&self) -> PlayerResult {
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("Simulated player connected");
        Ok(())
    }

    async fn disconnect(&self) -> PlayerResult {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn play(&self, uri: &str) -> PlayerResult {
        self.ensure_connected()?;
        let state = {
            let mut playback = self.playback();
            playback.calls.push(PlayerCall::Play(uri.to_string()));
            let id = self.track_id(uri).to_string();
            Self::start_track(&mut playback, id)
        };
        self.emit(state);
        Ok(())
    }

    async fn pause(&self) -> PlayerResult {
        self.ensure_connected()?;
        let state = {
            let mut playback = self.playback();
            playback.calls.push(PlayerCall::Pause);
            playback.paused = true;
            Self::current_state(&playback)
        };
        if let Some(state) = state {
            self.emit(state);
        }
        Ok(())
    }

    async fn resume(&self) -> PlayerResult {
        self.ensure_connected()?;
        let state = {
            let mut playback = self.playback();
            playback.calls.push(PlayerCall::Resume);
            playback.paused = false;
            Self::current_state(&playback)
        };
        if let Some(state) = state {
            self.emit(state);
        }
        Ok(())
    }

    async fn skip_next(&self) -> PlayerResult {
        self.ensure_connected()?;
        self.advance(Some(PlayerCall::SkipNext));
        Ok(())
    }

    async fn skip_previous(&self) -> PlayerResult {
        self.ensure_connected()?;
        let state = {
            let mut playback = self.playback();
            playback.calls.push(PlayerCall::SkipPrevious);
            if playback.history.len() < 2 {
                playback.position_ms = 0;
                None
            } else {
                let current = playback.history.pop();
                let previous = playback.history.pop();
                if let Some(id) = current {
                    playback.queue.push_front(id);
                }
                previous.map(|id| Self::start_track(&mut playback, id))
            }
        };
        if let Some(state) = state {
            self.emit(state);
        }
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> PlayerResult {
        self.ensure_connected()?;
        let mut playback = self.playback();
        playback.calls.push(PlayerCall::Seek(position_ms));
        playback.position_ms = position_ms;
        Ok(())
    }

    async fn enqueue(&self, uri: &str) -> PlayerResult {
        self.ensure_connected()?;
        let attempt = self.enqueue_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let every = self.fail_every_nth_enqueue.load(Ordering::SeqCst);
        if every > 0 && attempt % every == 0 {
            return Err(PlayerError::Transport(format!(
                "simulated failure queueing {uri}"
            )));
        }
        let mut playback = self.playback();
        playback.calls.push(PlayerCall::Enqueue(uri.to_string()));
        let id = self.track_id(uri).to_string();
        playback.queue.push_back(id);
        Ok(())
    }

    async fn set_repeat_mode(&self, mode: RepeatMode) -> PlayerResult {
        self.ensure_connected()?;
        let mut playback = self.playback();
        playback.calls.push(PlayerCall::SetRepeatMode(mode));
        playback.repeat = Some(mode);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerState> {
        self.states.subscribe()
    }
}
