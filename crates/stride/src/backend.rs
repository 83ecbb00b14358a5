//! Track-matching backend.
//!
//! Failures never propagate past [`BackendClient`]: they are logged and
//! reported as empty results so callers can simply try again later.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{config::BackendConfig, errors::BackendError, models::Feedback};

#[async_trait]
pub trait BackendClient: Send + Sync {
    /// `{track id: bpm}` for tracks near `target_bpm`. Empty on failure.
    async fn tracks_by_bpm(&self, target_bpm: f64, sources: &[String]) -> HashMap<String, f64>;
    async fn create_playlist(&self, bpm: f64, sources: &[String]) -> Option<String>;
    async fn send_feedback(&self, track_id: &str, feedback: Feedback) -> bool;
    async fn register_user(&self) -> bool;
}

/// Supplies the access token for backend calls.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// A fixed token, mostly for tests and tooling.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TracksResponse {
    tracks: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
struct PlaylistRequest<'a> {
    bpm: f64,
    sources: &'a [String],
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    playlist_id: String,
}

#[derive(Debug, Serialize)]
struct FeedbackRequest<'a> {
    track_id: &'a str,
    feedback: Feedback,
}

#[derive(Clone)]
pub struct HttpBackendClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpBackendClient {
    pub fn new(
        config: &BackendConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> Result<String, BackendError> {
        self.credentials
            .access_token()
            .ok_or(BackendError::MissingCredentials)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }

    pub async fn try_tracks_by_bpm(
        &self,
        target_bpm: f64,
        sources: &[String],
    ) -> Result<HashMap<String, f64>, BackendError> {
        let resp = self
            .client
            .get(self.url("/tracks"))
            .bearer_auth(self.token()?)
            .query(&[
                ("bpm", format!("{target_bpm:.0}")),
                ("sources", sources.join(",")),
            ])
            .send()
            .await?;
        let body: TracksResponse = Self::check(resp).await?.json().await?;
        debug!("Backend returned {} tracks for {target_bpm:.0} bpm", body.tracks.len());
        Ok(body.tracks)
    }

    pub async fn try_create_playlist(
        &self,
        bpm: f64,
        sources: &[String],
    ) -> Result<String, BackendError> {
        let resp = self
            .client
            .post(self.url("/playlists"))
            .bearer_auth(self.token()?)
            .json(&PlaylistRequest { bpm, sources })
            .send()
            .await?;
        let body: PlaylistResponse = Self::check(resp).await?.json().await?;
        Ok(body.playlist_id)
    }

    pub async fn try_send_feedback(
        &self,
        track_id: &str,
        feedback: Feedback,
    ) -> Result<(), BackendError> {
        let resp = self
            .client
            .post(self.url("/feedback"))
            .bearer_auth(self.token()?)
            .json(&FeedbackRequest { track_id, feedback })
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn try_register_user(&self) -> Result<(), BackendError> {
        let resp = self
            .client
            .post(self.url("/users/register"))
            .bearer_auth(self.token()?)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn tracks_by_bpm(&self, target_bpm: f64, sources: &[String]) -> HashMap<String, f64> {
        self.try_tracks_by_bpm(target_bpm, sources)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to fetch tracks: {e}");
                HashMap::new()
            })
    }

    async fn create_playlist(&self, bpm: f64, sources: &[String]) -> Option<String> {
        self.try_create_playlist(bpm, sources)
            .await
            .inspect_err(|e| error!("Failed to create playlist: {e}"))
            .ok()
    }

    async fn send_feedback(&self, track_id: &str, feedback: Feedback) -> bool {
        self.try_send_feedback(track_id, feedback)
            .await
            .inspect_err(|e| error!("Failed to send feedback for {track_id}: {e}"))
            .is_ok()
    }

    async fn register_user(&self) -> bool {
        self.try_register_user()
            .await
            .inspect_err(|e| error!("Failed to register user: {e}"))
            .is_ok()
    }
}
