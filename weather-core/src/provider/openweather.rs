use async_trait::async_trait;
use reqwest::{
    Client,
    header::{CACHE_CONTROL, PRAGMA},
};

use crate::config::DEFAULT_UPSTREAM_URL;

use super::{UpstreamError, WeatherProvider};

#[derive(Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    endpoint: String,
    http: Client,
}

// Keep the credential out of logs.
impl std::fmt::Debug for OpenWeatherProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherProvider")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, DEFAULT_UPSTREAM_URL.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Self {
        Self {
            api_key,
            endpoint,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_by_coords(&self, lat: &str, lon: &str) -> Result<String, UpstreamError> {
        tracing::debug!(lat, lon, endpoint = %self.endpoint, "requesting current weather");

        let res = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("lat", lat),
                ("lon", lon),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            // always fresh data
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(strip_url)?;

        let status = res.status();
        let body = res.text().await.map_err(strip_url)?;

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                body = %truncate_body(&body),
                "OpenWeather request failed"
            );
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        serde_json::from_str::<serde_json::Value>(&body)?;
        Ok(body)
    }
}

// The request URL carries `appid`; it must not end up in error text.
fn strip_url(err: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport(err.without_url())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
