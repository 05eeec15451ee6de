use std::sync::Arc;

use serde_json::{json, Value};

use analysis as an;
use model::*;
use playback::{PlaybackDriver, PlaybackScheduler};
use projector::{RangeProjector, SearchOutcome};
use trip_core::{channel, AmenitySearch, PlaybackRx, ProviderError, SystemClock, TripProvider};

use crate::config::AppConfig;

/// A trip after normalization, plus what the metrics need alongside it.
pub struct LoadedTrip {
    pub key: TripKey,
    pub trip: NormalizedTrip,
    pub stops: Vec<StopRecord>,
    pub unit_tank: Option<f64>,
}

impl LoadedTrip {
    pub async fn load<P: TripProvider + ?Sized>(provider: &P, key: TripKey) -> Result<Self, ProviderError> {
        let data = provider.load_trip(&key).await?;
        Ok(Self::from_data(key, data))
    }

    pub fn from_data(key: TripKey, data: TripData) -> Self {
        let trip = an::normalize(&data.events, &data.stops);
        Self { key, trip, stops: data.stops, unit_tank: data.unit_tank }
    }

    pub fn len(&self) -> usize {
        self.trip.drive_points.len()
    }

    pub fn points(&self) -> &[DrivePoint] {
        &self.trip.drive_points
    }

    pub fn overview(&self, position: usize, cfg: &an::ProjectionConfig) -> Value {
        an::position_overview(&self.trip, &self.stops, position, cfg.tank_capacity(self.unit_tank))
    }

    pub fn summary(&self) -> TripSummary {
        an::summarize_trip(&self.trip, &self.stops)
    }

    pub fn profile(&self, cfg: &an::ProjectionConfig) -> Vec<PointProfile> {
        an::route_profile(&self.trip, cfg.tank_capacity(self.unit_tank))
    }
}

/// Live replay of one trip: playback position and range searches share the
/// session, and every change to either goes through it.
pub struct TripSession<S: AmenitySearch> {
    trip: Arc<LoadedTrip>,
    cfg: AppConfig,
    playback: PlaybackDriver<SystemClock>,
    projector: RangeProjector<S>,
}

impl<S: AmenitySearch> TripSession<S> {
    pub fn start(trip: Arc<LoadedTrip>, cfg: AppConfig, search: S) -> (Self, PlaybackRx) {
        let scheduler = PlaybackScheduler::new(
            SystemClock::new(),
            cfg.playback.clone(),
            trip.len(),
            trip.trip.stop_indices.clone(),
        );
        let (tx, rx) = channel();
        let playback = PlaybackDriver::spawn(scheduler, tx);
        let projector = RangeProjector::new(search, cfg.projection.clone());
        log::info!(
            "session for {} @ {}: {} points, {} stops",
            trip.key.tractor_id,
            trip.key.arrival,
            trip.len(),
            trip.trip.stop_indices.len()
        );
        (Self { trip, cfg, playback, projector }, rx)
    }

    pub fn trip(&self) -> &Arc<LoadedTrip> {
        &self.trip
    }

    pub fn playback(&self) -> &PlaybackDriver<SystemClock> {
        &self.playback
    }

    pub fn overview(&self) -> Value {
        let position = self.playback.position();
        json!({
            "trip": self.trip.overview(position, &self.cfg.projection),
            "playback": format!("{:?}", self.playback.state()),
            "search": self.projector.view(),
        })
    }

    pub async fn toggle_fuel_search(&self) -> SearchOutcome {
        let position = self.playback.position();
        self.projector
            .toggle_fuel_search(self.trip.points(), position, self.trip.unit_tank)
            .await
    }

    pub async fn toggle_rest_search(&self) -> SearchOutcome {
        let position = self.playback.position();
        self.projector.toggle_rest_search(self.trip.points(), position).await
    }

    pub fn clear_search(&self) {
        self.projector.clear();
    }

    pub fn shutdown(self) {
        self.projector.clear();
        self.playback.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::{Duration, OffsetDateTime};
    use trip_core::{AmenityRequest, CancelToken, PlaybackState, SearchError};

    #[derive(Default)]
    pub struct CountingSearch {
        pub calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AmenitySearch for CountingSearch {
        async fn find(&self, request: &AmenityRequest, _: &CancelToken) -> Result<Vec<Amenity>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(request
                .route
                .iter()
                .step_by(10)
                .map(|p| Amenity { lat: p.lat, lon: p.long, location_name: None, unit_price: None, traffic_count: None })
                .collect())
        }
    }

    /// 40 drive points a mile apart with one short rest after the tenth.
    pub fn sample_trip() -> LoadedTrip {
        let t0 = OffsetDateTime::from_unix_timestamp(1_719_938_884).unwrap();
        let event = |i: i64, kind: EventKind| RawTelemetryEvent {
            kind,
            timestamp: t0 + Duration::minutes(i),
            latitude: 41.0 + i as f64 * 0.0145,
            longitude: -88.0,
            fuel_fraction: 0.45 - i as f64 * 0.001,
            distance_from_prev: if i == 0 { 0.0 } else { 1609.344 },
        };
        let mut events: Vec<RawTelemetryEvent> = (0..40).map(|i| event(i, EventKind::Drive)).collect();
        events.insert(11, event(10, EventKind::Stop));
        let stop = StopRecord {
            arrival_time: t0 + Duration::minutes(9),
            departure_time: t0 + Duration::minutes(10),
            latitude: 41.145,
            longitude: -88.0,
            stop_type: StopType::ShortRest,
            dwell_seconds: 60.0,
            fuel_fraction_before: 0.44,
            fuel_fraction_after: 0.44,
            miles_from_last_stop: 10.0,
            quantity_purchased: None,
            unit_price: None,
            total_cost: None,
            location_name: None,
            city: "Joliet".into(),
            state: "IL".into(),
        };
        let data = TripData { events, stops: vec![stop], unit_tank: Some(200.0) };
        LoadedTrip::from_data(TripKey { tractor_id: "T-17".into(), arrival: "2024-07-02 16:48:04".into() }, data)
    }

    #[test]
    fn test_loaded_trip_queries() {
        let trip = sample_trip();
        assert_eq!(trip.len(), 41);
        assert_eq!(trip.trip.stop_indices.positions().collect::<Vec<_>>(), vec![11]);
        let overview = trip.overview(11, &an::ProjectionConfig::default());
        assert_eq!(overview["at_stop"], true);
        assert_eq!(overview["stop"]["city"], "Joliet");
        assert_eq!(trip.summary().short_rest_stops, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_searches_from_playback_position() {
        let trip = Arc::new(sample_trip());
        let (session, _rx) = TripSession::start(trip, AppConfig::default(), CountingSearch::default());
        session.playback().seek(50.0);
        assert_eq!(session.playback().position(), 20);

        assert!(matches!(session.toggle_fuel_search().await, SearchOutcome::Found(_)));
        let view = session.overview();
        assert_eq!(view["search"]["active"], "fuel");
        assert_eq!(view["trip"]["position"], 20);

        assert!(matches!(session.toggle_rest_search().await, SearchOutcome::Found(_)));
        assert_eq!(session.overview()["search"]["active"], "rest");
        assert_eq!(session.playback().state(), PlaybackState::Stopped);

        session.clear_search();
        assert!(session.overview()["search"]["projection"].is_null());
        session.shutdown();
    }
}
