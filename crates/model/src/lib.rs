use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const METERS_TO_MILES: f64 = 0.000621371;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Drive,
    #[serde(other)]
    Stop,
}

/// One raw ping as delivered by the trip provider.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RawTelemetryEvent {
    pub kind: EventKind,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub fuel_fraction: f64,
    /// meters
    pub distance_from_prev: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum StopType {
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "end")]
    End,
    #[serde(rename = "fuel")]
    Fuel,
    #[serde(rename = "fuel_ext", alias = "fuel ext")]
    FuelExt,
    #[serde(rename = "docking")]
    Docking,
    #[serde(rename = "overnight rest")]
    OvernightRest,
    #[serde(rename = "short rest")]
    ShortRest,
    #[serde(rename = "warehouse")]
    Warehouse,
    #[serde(other, rename = "other")]
    Other,
}

impl StopType {
    pub fn is_fueling(self) -> bool {
        matches!(self, StopType::Fuel | StopType::FuelExt)
    }

    pub fn is_rest(self) -> bool {
        matches!(self, StopType::OvernightRest | StopType::ShortRest)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StopRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub arrival_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub departure_time: OffsetDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub stop_type: StopType,
    pub dwell_seconds: f64,
    pub fuel_fraction_before: f64,
    pub fuel_fraction_after: f64,
    pub miles_from_last_stop: f64,
    #[serde(default)]
    pub quantity_purchased: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
}

/// Normalized waypoint, either a drive sample or a matched stop.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct DrivePoint {
    pub lat: f64,
    pub long: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub fuel_fraction: f64,
    /// meters
    pub distance_from_prev: f64,
}

impl DrivePoint {
    pub fn lat_long(&self) -> LatLong {
        LatLong { lat: self.lat, long: self.long }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct LatLong {
    pub lat: f64,
    pub long: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct StopIndex {
    /// position in the drive point sequence
    pub point: usize,
    /// position in the stop record list that was matched
    pub record: usize,
}

/// Strictly ascending set of drive point positions that are stops.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct StopIndexSet {
    entries: Vec<StopIndex>,
}

impl StopIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stop; rejected unless `point` is above the last one.
    pub fn push(&mut self, point: usize, record: usize) -> bool {
        if let Some(last) = self.entries.last() {
            if point <= last.point {
                return false;
            }
        }
        self.entries.push(StopIndex { point, record });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StopIndex> {
        self.entries.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|e| e.point)
    }

    pub fn contains(&self, point: usize) -> bool {
        self.record_at(point).is_some()
    }

    pub fn record_at(&self, point: usize) -> Option<usize> {
        self.entries
            .binary_search_by_key(&point, |e| e.point)
            .ok()
            .map(|i| self.entries[i].record)
    }

    /// Smallest stop position strictly greater than `point`.
    pub fn next_after(&self, point: usize) -> Option<usize> {
        let i = self.entries.partition_point(|e| e.point <= point);
        self.entries.get(i).map(|e| e.point)
    }

    /// Largest stop position strictly less than `point`.
    pub fn previous_before(&self, point: usize) -> Option<usize> {
        let i = self.entries.partition_point(|e| e.point < point);
        i.checked_sub(1).map(|k| self.entries[k].point)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct NormalizedTrip {
    #[serde(default)]
    pub drive_points: Vec<DrivePoint>,
    #[serde(default)]
    pub stop_indices: StopIndexSet,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TripMetricsSnapshot {
    pub distance_miles: f64,
    pub elapsed_seconds: i64,
    pub fuel_level: f64,
    pub total_dwell_minutes: f64,
    pub amount_spent: f64,
    pub fuel_purchased: f64,
    pub fuel_consumed: f64,
    /// None when distance or fuel consumed is not positive
    pub mpg: Option<f64>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StopMetricsSnapshot {
    #[serde(with = "time::serde::rfc3339")]
    pub arrival_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub departure_time: OffsetDateTime,
    pub stop_type: StopType,
    pub dwell_minutes: f64,
    pub miles_from_last_stop: f64,
    pub fuel_fraction_before: f64,
    pub fuel_fraction_after: f64,
    pub location_name: Option<String>,
    pub unit_price: Option<f64>,
    pub total_cost: Option<f64>,
    pub quantity: Option<f64>,
    pub city: String,
    pub state: String,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Fuel,
    Rest,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct VisitedPoint {
    pub lat: f64,
    pub long: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

impl From<&DrivePoint> for VisitedPoint {
    fn from(p: &DrivePoint) -> Self {
        Self { lat: p.lat, long: p.long, time: p.time }
    }
}

/// Contiguous forward slice of the route starting at the playback position.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RangeProjection {
    pub mode: SearchMode,
    pub visited_points: Vec<VisitedPoint>,
}

impl RangeProjection {
    pub fn route(&self) -> Vec<LatLong> {
        self.visited_points
            .iter()
            .map(|p| LatLong { lat: p.lat, long: p.long })
            .collect()
    }
}

/// Candidate fuel or rest location returned by an amenity search.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Amenity {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub traffic_count: Option<u32>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct TripKey {
    pub tractor_id: String,
    /// `YYYY-MM-DD HH:MM:SS`, as used by the trip provider
    pub arrival: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct TripData {
    #[serde(default)]
    pub events: Vec<RawTelemetryEvent>,
    #[serde(default)]
    pub stops: Vec<StopRecord>,
    #[serde(default)]
    pub unit_tank: Option<f64>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct TripSummary {
    pub total_stops: u32,
    pub fuel_stops: u32,
    pub short_rest_stops: u32,
    pub overnight_rest_stops: u32,
    pub total_dwell_seconds: f64,
    pub fuel_volume_purchased: f64,
    pub fuel_dollars_spent: f64,
    pub distance_miles: f64,
    pub elapsed_seconds: i64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PointProfile {
    pub index: usize,
    pub speed_mph: f64,
    /// miles per gallon of the ~10 mile segment the point belongs to
    pub mileage: f64,
    pub fuel_burned: Option<f64>,
}
