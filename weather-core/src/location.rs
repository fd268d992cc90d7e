//! One-shot position acquisition on top of a platform location capability.

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::model::Coordinates;

/// Time allowed for a single fix before it counts as timed out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(12_000);

/// Per-request settings handed to the location capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix accepted. Zero means a fresh fix every time.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: DEFAULT_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }
}

/// Failure codes reported by a location capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Other(u16),
}

impl From<u16> for PositionErrorCode {
    fn from(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct PositionError {
    pub code: PositionErrorCode,
    pub message: String,
}

impl PositionError {
    pub fn new(code: impl Into<PositionErrorCode>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// A platform location capability.
#[async_trait]
pub trait LocationSource: Send + Sync + Debug {
    async fn current_position(&self, options: &PositionOptions)
    -> Result<Coordinates, PositionError>;

    /// Whether [`LocationAcquirer`] should cut the request off after
    /// `options.timeout`. Sources that wait on the user (a permission or
    /// input prompt) return `false`; time spent there doesn't count.
    fn enforces_timeout(&self) -> bool {
        true
    }
}

/// User-facing location failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Geolocation is not supported in this browser.")]
    Unsupported,
    #[error("Permission denied. Please allow location access and try again.")]
    PermissionDenied,
    #[error("Location unavailable. Check your device settings and try again.")]
    Unavailable,
    #[error("Location request timed out. Please try again.")]
    Timeout,
    #[error("Failed to get your location.")]
    Unknown,
}

impl From<PositionErrorCode> for LocationError {
    fn from(code: PositionErrorCode) -> Self {
        match code {
            PositionErrorCode::PermissionDenied => Self::PermissionDenied,
            PositionErrorCode::PositionUnavailable => Self::Unavailable,
            PositionErrorCode::Timeout => Self::Timeout,
            PositionErrorCode::Other(_) => Self::Unknown,
        }
    }
}

/// Always reports the same fix, e.g. coordinates given on the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationSource for FixedLocation {
    async fn current_position(&self, _: &PositionOptions) -> Result<Coordinates, PositionError> {
        Ok(self.0)
    }
}

/// Wraps an optional [`LocationSource`]; `None` means the platform has no
/// location capability at all.
#[derive(Debug, Clone)]
pub struct LocationAcquirer {
    source: Option<Arc<dyn LocationSource>>,
    options: PositionOptions,
}

impl LocationAcquirer {
    pub fn new(source: Option<Arc<dyn LocationSource>>) -> Self {
        Self { source, options: PositionOptions::default() }
    }

    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    /// Request a single fix. Never retries.
    pub async fn acquire(&self) -> Result<Coordinates, LocationError> {
        let source = self.source.as_ref().ok_or(LocationError::Unsupported)?;

        let request = source.current_position(&self.options);
        let fix = if source.enforces_timeout() {
            tokio::time::timeout(self.options.timeout, request)
                .await
                .map_err(|_| LocationError::Timeout)?
        } else {
            request.await
        };

        match fix {
            Ok(coords) => {
                tracing::debug!(lat = coords.latitude, lon = coords.longitude, "location acquired");
                Ok(coords)
            }
            Err(err) => {
                tracing::info!(code = ?err.code, "location request failed: {err}");
                Err(err.code.into())
            }
        }
    }
}
