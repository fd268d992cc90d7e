//! Core library for the `weather` app.
//!
//! This crate defines:
//! - Configuration & credential handling
//! - The OpenWeather provider and the HTTP proxy in front of it
//! - Location acquisition over a pluggable platform capability
//! - The client view controller (locate -> fetch -> render state)
//! - Shared domain models and display helpers
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod display;
pub mod location;
pub mod model;
pub mod provider;
pub mod proxy;
pub mod view;

pub use client::{FetchError, ProxyClient, WeatherFetcher};
pub use config::Config;
pub use location::{FixedLocation, LocationAcquirer, LocationError, LocationSource};
pub use model::{Coordinates, WeatherSnapshot};
pub use provider::{UpstreamError, WeatherProvider};
pub use proxy::{ProxyState, router};
pub use view::{FetchOutcome, LoadState, ViewController};
