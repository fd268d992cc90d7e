//! Client-side orchestration: locate, fetch, publish render state.
//!
//! [`ViewController`] owns the [`LoadState`] machine:
//!
//! ```text
//! idle -> locating -> loading -> done
//!             |          |
//!             +-> error <+
//! ```
//!
//! Every cycle re-enters at `locating`. At most one weather fetch is in flight;
//! starting a new one cancels the previous token, and a fetch only commits its
//! result while its token is still live.

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{FetchError, WeatherFetcher},
    location::LocationAcquirer,
    model::{Coordinates, WeatherSnapshot},
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Locating,
    Loading,
    Done(WeatherSnapshot),
    Error(String),
}

impl LoadState {
    pub fn is_busy(&self) -> bool {
        matches!(self, LoadState::Locating | LoadState::Loading)
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            LoadState::Done(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// What became of a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Result was written to the render state.
    Applied,
    /// A newer fetch took over; the result was dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct Inner {
    started: bool,
    coords: Option<Coordinates>,
    in_flight: Option<CancellationToken>,
}

pub struct ViewController<F> {
    location: LocationAcquirer,
    fetcher: F,
    state: watch::Sender<LoadState>,
    inner: Mutex<Inner>,
}

impl<F: WeatherFetcher> ViewController<F> {
    pub fn new(location: LocationAcquirer, fetcher: F) -> Self {
        Self {
            location,
            fetcher,
            state: watch::Sender::new(LoadState::Idle),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.inner.lock().coords
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_busy()
    }

    /// Initial trigger. Runs a cycle the first time only; returns whether it did.
    pub async fn start(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.started {
                return false;
            }
            inner.started = true;
        }
        self.refresh().await
    }

    /// User-triggered refresh. A no-op returning `false` while locating or loading.
    pub async fn refresh(&self) -> bool {
        if !self.begin_locating() {
            tracing::debug!("refresh ignored, a request is already running");
            return false;
        }

        match self.location.acquire().await {
            Ok(coords) => {
                self.inner.lock().coords = Some(coords);
                self.fetch_weather(coords).await;
            }
            Err(err) => {
                self.transition(LoadState::Error(err.to_string()));
            }
        }
        true
    }

    /// Publish `next`. Subscribers only see the latest value, so a state that
    /// is left within the same poll (e.g. `Locating` with an instant fix) may
    /// never be observed; every transition is still logged here.
    fn transition(&self, next: LoadState) {
        let to = state_name(&next);
        let previous = self.state.send_replace(next);
        tracing::debug!(from = state_name(&previous), to, "view state");
    }

    fn begin_locating(&self) -> bool {
        let mut inner = self.inner.lock();
        if self.state.borrow().is_busy() {
            return false;
        }
        inner.started = true;
        inner.coords = None;
        self.transition(LoadState::Locating);
        true
    }

    /// Fetch weather for `coords`, cancelling whichever fetch is still pending.
    pub async fn fetch_weather(&self, coords: Coordinates) -> FetchOutcome {
        let token = CancellationToken::new();
        {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.in_flight.replace(token.clone()) {
                previous.cancel();
            }
            self.transition(LoadState::Loading);
        }

        let result = self.fetcher.fetch(coords, &token).await;

        let mut inner = self.inner.lock();
        if token.is_cancelled() || matches!(result, Err(FetchError::Cancelled)) {
            tracing::debug!("discarding superseded weather fetch");
            return FetchOutcome::Superseded;
        }
        inner.in_flight = None;

        let next = match result {
            Ok(snapshot) => {
                tracing::info!(location = %snapshot.name, "weather updated");
                LoadState::Done(snapshot)
            }
            Err(err) => {
                tracing::warn!("weather fetch failed: {err}");
                LoadState::Error(err.to_string())
            }
        };
        self.transition(next);
        FetchOutcome::Applied
    }
}

fn state_name(state: &LoadState) -> &'static str {
    match state {
        LoadState::Idle => "idle",
        LoadState::Locating => "locating",
        LoadState::Loading => "loading",
        LoadState::Done(_) => "done",
        LoadState::Error(_) => "error",
    }
}

impl<F> Drop for ViewController<F> {
    fn drop(&mut self) {
        if let Some(token) = self.inner.get_mut().in_flight.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        location::{FixedLocation, LocationSource, PositionError, PositionOptions},
        model::fixtures,
    };

    fn snapshot(name: &str) -> WeatherSnapshot {
        let mut snapshot: WeatherSnapshot =
            serde_json::from_value(fixtures::snapshot_json()).expect("fixture");
        snapshot.name = name.to_string();
        snapshot
    }

    /// Answers by latitude. Latitudes listed in `gates` wait for their notify first.
    #[derive(Default)]
    struct ScriptedFetcher {
        replies: HashMap<u64, Result<WeatherSnapshot, FetchError>>,
        gates: HashMap<u64, Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn reply(mut self, lat: f64, reply: Result<WeatherSnapshot, FetchError>) -> Self {
            self.replies.insert(lat.to_bits(), reply);
            self
        }

        fn gate(mut self, lat: f64, notify: Arc<Notify>) -> Self {
            self.gates.insert(lat.to_bits(), notify);
            self
        }
    }

    #[async_trait]
    impl WeatherFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            coords: Coordinates,
            _cancel: &CancellationToken,
        ) -> Result<WeatherSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = coords.latitude.to_bits();
            if let Some(gate) = self.gates.get(&key) {
                gate.notified().await;
            }
            self.replies
                .get(&key)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Transport("no reply scripted".into())))
        }
    }

    #[derive(Debug)]
    struct Denied;

    #[async_trait]
    impl LocationSource for Denied {
        async fn current_position(
            &self,
            _: &PositionOptions,
        ) -> Result<Coordinates, PositionError> {
            Err(PositionError::new(1u16, "User denied Geolocation"))
        }
    }

    /// Holds every fix until `gate` is notified, counting requests.
    #[derive(Debug)]
    struct GatedLocation {
        gate: Arc<Notify>,
        requests: AtomicUsize,
    }

    #[async_trait]
    impl LocationSource for GatedLocation {
        async fn current_position(
            &self,
            _: &PositionOptions,
        ) -> Result<Coordinates, PositionError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(Coordinates::new(1.0, 1.0))
        }
    }

    fn fixed(lat: f64, lon: f64) -> LocationAcquirer {
        LocationAcquirer::new(Some(Arc::new(FixedLocation(Coordinates::new(lat, lon)))))
    }

    #[tokio::test]
    async fn start_locates_then_shows_weather() {
        let fetcher = ScriptedFetcher::default().reply(52.5, Ok(snapshot("Berlin")));
        let view = ViewController::new(fixed(52.5, 13.4), fetcher);
        assert_eq!(view.state(), LoadState::Idle);

        assert!(view.start().await);

        assert_eq!(view.state().snapshot().map(|s| s.name.as_str()), Some("Berlin"));
        assert_eq!(view.coordinates(), Some(Coordinates::new(52.5, 13.4)));
    }

    #[tokio::test]
    async fn start_only_runs_once() {
        let fetcher = ScriptedFetcher::default().reply(1.0, Ok(snapshot("A")));
        let view = ViewController::new(fixed(1.0, 1.0), fetcher);

        assert!(view.start().await);
        assert!(!view.start().await);
        assert_eq!(view.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permission_denied_goes_to_error_without_fetching() {
        let view = ViewController::new(
            LocationAcquirer::new(Some(Arc::new(Denied))),
            ScriptedFetcher::default(),
        );
        let mut rx = view.subscribe();

        view.start().await;

        assert_eq!(
            view.state(),
            LoadState::Error("Permission denied. Please allow location access and try again.".into())
        );
        assert_eq!(view.fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(view.coordinates().is_none());
        assert!(rx.has_changed().expect("sender alive"));
        assert!(!matches!(*rx.borrow_and_update(), LoadState::Loading));
    }

    #[tokio::test]
    async fn unsupported_location_reports_message() {
        let view = ViewController::new(LocationAcquirer::unsupported(), ScriptedFetcher::default());

        view.start().await;

        assert_eq!(
            view.state().error(),
            Some("Geolocation is not supported in this browser.")
        );
    }

    #[tokio::test]
    async fn fetch_error_message_is_surfaced() {
        let fetcher = ScriptedFetcher::default().reply(
            1.0,
            Err(FetchError::Status { status: 401, message: "OpenWeather request failed".into() }),
        );
        let view = ViewController::new(fixed(1.0, 1.0), fetcher);

        view.start().await;

        assert_eq!(view.state().error(), Some("OpenWeather request failed"));
    }

    #[tokio::test]
    async fn refresh_is_ignored_while_locating() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(GatedLocation { gate: gate.clone(), requests: AtomicUsize::new(0) });
        let fetcher = ScriptedFetcher::default().reply(1.0, Ok(snapshot("A")));
        let view = ViewController::new(LocationAcquirer::new(Some(source.clone())), fetcher);
        let mut rx = view.subscribe();

        let (started, refreshed) = tokio::join!(view.start(), async {
            tokio::task::yield_now().await;
            assert_eq!(view.state(), LoadState::Locating);
            assert_eq!(*rx.borrow_and_update(), LoadState::Locating);

            let refreshed = view.refresh().await;
            assert_eq!(view.state(), LoadState::Locating);
            assert_eq!(source.requests.load(Ordering::SeqCst), 1);
            assert_eq!(view.fetcher.calls.load(Ordering::SeqCst), 0);

            gate.notify_one();
            refreshed
        });

        assert!(started);
        assert!(!refreshed);
        assert_eq!(source.requests.load(Ordering::SeqCst), 1);
        assert_eq!(view.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.state().snapshot().map(|s| s.name.as_str()), Some("A"));
    }

    #[tokio::test]
    async fn refresh_is_ignored_while_loading() {
        let gate = Arc::new(Notify::new());
        let fetcher = ScriptedFetcher::default()
            .reply(1.0, Ok(snapshot("A")))
            .gate(1.0, gate.clone());
        let view = ViewController::new(fixed(1.0, 1.0), fetcher);

        let (started, refreshed) = tokio::join!(view.start(), async {
            tokio::task::yield_now().await;
            assert_eq!(view.state(), LoadState::Loading);
            let refreshed = view.refresh().await;
            assert_eq!(view.state(), LoadState::Loading);
            gate.notify_one();
            refreshed
        });

        assert!(started);
        assert!(!refreshed);
        assert_eq!(view.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.state().snapshot().map(|s| s.name.as_str()), Some("A"));
    }

    #[tokio::test]
    async fn refresh_after_error_runs_new_cycle() {
        let fetcher = ScriptedFetcher::default()
            .reply(1.0, Err(FetchError::Transport("connection refused".into())));
        let view = ViewController::new(fixed(1.0, 1.0), fetcher);

        view.start().await;
        assert_eq!(view.state().error(), Some("connection refused"));

        assert!(view.refresh().await);
        assert_eq!(view.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn newer_fetch_supersedes_pending_one() {
        let gate = Arc::new(Notify::new());
        let fetcher = ScriptedFetcher::default()
            .reply(1.0, Err(FetchError::Transport("late failure".into())))
            .gate(1.0, gate.clone())
            .reply(2.0, Ok(snapshot("Second")));
        let view = ViewController::new(LocationAcquirer::unsupported(), fetcher);

        let (first, second) = tokio::join!(view.fetch_weather(Coordinates::new(1.0, 0.0)), async {
            let outcome = view.fetch_weather(Coordinates::new(2.0, 0.0)).await;
            // let the stale request finish after it was superseded
            gate.notify_one();
            outcome
        });

        assert_eq!(first, FetchOutcome::Superseded);
        assert_eq!(second, FetchOutcome::Applied);
        assert_eq!(view.state().snapshot().map(|s| s.name.as_str()), Some("Second"));
    }

    #[tokio::test]
    async fn superseded_success_never_reaches_state() {
        let gate = Arc::new(Notify::new());
        let fetcher = ScriptedFetcher::default()
            .reply(1.0, Ok(snapshot("Stale")))
            .gate(1.0, gate.clone())
            .reply(2.0, Err(FetchError::Status { status: 500, message: "Network error (500)".into() }));
        let view = ViewController::new(LocationAcquirer::unsupported(), fetcher);

        let (first, _) = tokio::join!(view.fetch_weather(Coordinates::new(1.0, 0.0)), async {
            view.fetch_weather(Coordinates::new(2.0, 0.0)).await;
            gate.notify_one();
        });

        assert_eq!(first, FetchOutcome::Superseded);
        assert_eq!(view.state().error(), Some("Network error (500)"));
    }

    #[test]
    fn load_state_accessors() {
        assert!(LoadState::Locating.is_busy());
        assert!(LoadState::Loading.is_busy());
        assert!(!LoadState::Idle.is_busy());
        assert!(!LoadState::Error("x".into()).is_busy());
        assert!(LoadState::Error("x".into()).snapshot().is_none());
        assert!(LoadState::Done(snapshot("A")).error().is_none());
    }
}
