//! Capability interface of the remote-controlled music player.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    errors::PlayerError,
    models::{PlayerState, RepeatMode},
};

pub type PlayerResult = Result<(), PlayerError>;

/// A music player driven over an SDK or network bridge.
///
/// Every mutating call completes exactly once with success or a
/// [`PlayerError`]. Callers must assume any call can fail.
#[async_trait]
pub trait RemotePlayer: Send + Sync {
    async fn connect(&self) -> PlayerResult;
    async fn disconnect(&self) -> PlayerResult;
    fn is_connected(&self) -> bool;

    async fn play(&self, uri: &str) -> PlayerResult;
    async fn pause(&self) -> PlayerResult;
    async fn resume(&self) -> PlayerResult;
    async fn skip_next(&self) -> PlayerResult;
    async fn skip_previous(&self) -> PlayerResult;
    async fn seek(&self, position_ms: u64) -> PlayerResult;

    /// Appends to the play queue without interrupting playback.
    async fn enqueue(&self, uri: &str) -> PlayerResult;
    async fn set_repeat_mode(&self, mode: RepeatMode) -> PlayerResult;

    /// State changes in the order the player reports them.
    fn subscribe(&self) -> broadcast::Receiver<PlayerState>;
}
