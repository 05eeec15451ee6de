//! Seams shared by the async parts of trip replay: data services, cancellation and time.

use model::{Amenity, LatLong, SearchMode, TripData, TripKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search cancelled")]
    Cancelled,
    #[error("amenity service returned HTTP {0}")]
    Http(u16),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("trip not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Sub-route handed to an amenity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmenityRequest {
    pub mode: SearchMode,
    pub route: Vec<LatLong>,
}

/// Source of raw telemetry and stop records for one trip.
#[async_trait::async_trait]
pub trait TripProvider: Send + Sync {
    async fn load_trip(&self, key: &TripKey) -> Result<TripData, ProviderError>;
}

/// Geospatial search for fuel or rest locations along a sub-route.
///
/// Implementations should return `SearchError::Cancelled` as soon as
/// `cancel` fires; the projector also races the call against the token.
#[async_trait::async_trait]
pub trait AmenitySearch: Send + Sync {
    async fn find(
        &self,
        request: &AmenityRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<Amenity>, SearchError>;
}

#[async_trait::async_trait]
impl<T: AmenitySearch + ?Sized> AmenitySearch for Arc<T> {
    async fn find(
        &self,
        request: &AmenityRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<Amenity>, SearchError> {
        (**self).find(request, cancel).await
    }
}

/// Cloneable one-shot cancellation signal handed to every search call.
pub use tokio_util::sync::CancellationToken as CancelToken;

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Clock backed by tokio's instant, so paused-runtime tests stay deterministic.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: tokio::time::Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: Duration) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    PausedAtStop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackEvent {
    Moved { position: usize },
    StateChanged { from: PlaybackState, to: PlaybackState },
    ReachedEnd { position: usize },
}

pub type PlaybackTx = crossbeam_channel::Sender<PlaybackEvent>;
pub type PlaybackRx = crossbeam_channel::Receiver<PlaybackEvent>;

pub fn channel() -> (PlaybackTx, PlaybackRx) {
    crossbeam_channel::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let shared = clock.clone();
        clock.advance(Duration::from_millis(30));
        shared.advance(Duration::from_millis(12));
        assert_eq!(clock.now(), Duration::from_millis(42));
        clock.set(Duration::ZERO);
        assert_eq!(shared.now(), Duration::ZERO);
    }
}
