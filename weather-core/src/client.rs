use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::model::{Coordinates, WeatherSnapshot};

/// Why a weather fetch produced no snapshot. `Display` is the message shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Non-2xx from the proxy.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Decode(String),

    /// Superseded by a newer fetch. Never shown.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Message for a non-2xx reply: the body's `error` string when there is
    /// one, otherwise a generic line with the status.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
            .unwrap_or_else(|| format!("Network error ({status})"));

        FetchError::Status { status, message }
    }
}

#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    /// Fetch current conditions. Must return [`FetchError::Cancelled`] promptly
    /// once `cancel` fires.
    async fn fetch(
        &self,
        coords: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<WeatherSnapshot, FetchError>;
}

/// Talks to the weather proxy over HTTP.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    base_url: String,
    http: Client,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http: Client::new() }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/weather", self.base_url.trim_end_matches('/'))
    }

    async fn request(&self, coords: Coordinates) -> Result<WeatherSnapshot, FetchError> {
        let res = self
            .http
            .get(self.endpoint())
            .query(&[("lat", coords.latitude), ("lon", coords.longitude)])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = res.status();
        let body = res.bytes().await.map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16(), &body));
        }

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl WeatherFetcher for ProxyClient {
    async fn fetch(
        &self,
        coords: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<WeatherSnapshot, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            res = self.request(coords) => res,
        }
    }
}
