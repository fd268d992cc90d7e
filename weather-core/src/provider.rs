use crate::{Config, provider::openweather::OpenWeatherProvider};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Failure talking to the upstream weather service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Upstream answered with a non-2xx status; `body` is its raw text.
    #[error("upstream responded with status {status}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions at `lat`/`lon` (decimal degree strings, passed through
    /// untouched). Returns the upstream JSON document as text.
    async fn current_by_coords(&self, lat: &str, lon: &str) -> Result<String, UpstreamError>;
}

/// Construct the provider from config. Fails when no credential is configured.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for OpenWeather.\n\
                 Hint: set OPENWEATHER_API_KEY or run `weather configure`."
        )
    })?;

    Ok(Arc::new(OpenWeatherProvider::with_endpoint(
        api_key.to_owned(),
        config.upstream_url.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());

        assert!(provider_from_config(&cfg).is_ok());
    }

    #[test]
    fn status_error_mentions_code() {
        let err = UpstreamError::Status { status: 401, body: "invalid key".into() };
        assert!(err.to_string().contains("401"));
    }
}
