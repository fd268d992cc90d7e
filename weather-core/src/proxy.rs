//! HTTP boundary that forwards coordinates to the upstream provider.
//!
//! The credential stays on this side; callers only ever see the provider's
//! JSON or a structured `{ error, detail? }` body.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{
    Config,
    provider::{UpstreamError, WeatherProvider, provider_from_config},
};

/// Errors surfaced to proxy callers. Each maps to one status and body.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("lat and lon query params are required")]
    MissingCoordinates,

    #[error("Missing OPENWEATHER_API_KEY")]
    MissingCredential,

    #[error("OpenWeather request failed")]
    Upstream { status: StatusCode, detail: String },

    #[error("Unexpected server error")]
    Unexpected(String),
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingCoordinates => StatusCode::BAD_REQUEST,
            ProxyError::MissingCredential | ProxyError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::Upstream { status, .. } => *status,
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ProxyError::Upstream { detail, .. } | ProxyError::Unexpected(detail) => {
                Some(detail.clone())
            }
            _ => None,
        }
    }
}

impl From<UpstreamError> for ProxyError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, body } => ProxyError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                detail: body,
            },
            other => ProxyError::Unexpected(other.to_string()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            detail: self.detail(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Shared handler state. `provider` is `None` when no credential is configured.
#[derive(Debug, Clone, Default)]
pub struct ProxyState {
    provider: Option<Arc<dyn WeatherProvider>>,
}

impl ProxyState {
    pub fn new(provider: Option<Arc<dyn WeatherProvider>>) -> Self {
        Self { provider }
    }

    pub fn from_config(config: &Config) -> Self {
        match provider_from_config(config) {
            Ok(provider) => Self::new(Some(provider)),
            Err(err) => {
                tracing::warn!("{err:#}; weather requests will fail until it is set");
                Self::new(None)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct WeatherQuery {
    lat: Option<String>,
    lon: Option<String>,
}

impl WeatherQuery {
    /// First occurrence of each parameter wins; repeats are ignored.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "lat" => &mut query.lat,
                "lon" => &mut query.lon,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }

    /// Both parameters, if present and non-empty.
    fn coordinates(&self) -> Option<(&str, &str)> {
        let lat = self.lat.as_deref().filter(|s| !s.is_empty())?;
        let lon = self.lon.as_deref().filter(|s| !s.is_empty())?;
        Some((lat, lon))
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/weather", get(current_weather))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn current_weather(
    State(state): State<ProxyState>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, ProxyError> {
    // A missing credential wins over bad parameters.
    let provider = state.provider.as_deref().ok_or(ProxyError::MissingCredential)?;
    let query = match pairs {
        Ok(Query(pairs)) => WeatherQuery::from_pairs(pairs),
        Err(rejection) => {
            tracing::debug!("unparseable query string: {rejection}");
            WeatherQuery::default()
        }
    };
    let (lat, lon) = query.coordinates().ok_or(ProxyError::MissingCoordinates)?;

    let body = provider.current_by_coords(lat, lon).await?;
    Ok((StatusCode::OK, [(CONTENT_TYPE, "application/json")], body).into_response())
}

/// Bind `config.bind` and serve the proxy until the process is stopped.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let app = router(ProxyState::from_config(config));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("Weather proxy listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Proxy server failed")
}
