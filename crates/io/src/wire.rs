//! Decoding of the trip provider's JSON rows into model types.

use anyhow::{anyhow, Result};
use model::*;
use serde::{Deserialize, Deserializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Parses a provider timestamp as UTC.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` with a space or `T` separator and optional
/// fractional seconds, or a full RFC 3339 string with an offset.
pub fn parse_utc(s: &str) -> Result<OffsetDateTime> {
    let s = s.trim();
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(t);
    }
    if let Ok(t) = OffsetDateTime::parse(&s.replacen(' ', "T", 1), &Rfc3339) {
        return Ok(t);
    }
    let naive = format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]");
    PrimitiveDateTime::parse(&s.replacen('T', " ", 1), naive)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| anyhow!("bad timestamp {:?}: {}", s, e))
}

fn utc<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<OffsetDateTime, D::Error> {
    let s = String::deserialize(d)?;
    parse_utc(&s).map_err(serde::de::Error::custom)
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "Dt", deserialize_with = "utc")]
    dt: OffsetDateTime,
    #[serde(rename = "Latitude_gps")]
    latitude: f64,
    #[serde(rename = "Longitude_gps")]
    longitude: f64,
    #[serde(rename = "Tank Level Percent")]
    tank: f64,
    #[serde(default)]
    dist_prev: Option<f64>,
}

impl From<WireEvent> for RawTelemetryEvent {
    fn from(w: WireEvent) -> Self {
        let kind = if w.kind.eq_ignore_ascii_case("drive") { EventKind::Drive } else { EventKind::Stop };
        RawTelemetryEvent {
            kind,
            timestamp: w.dt,
            latitude: w.latitude,
            longitude: w.longitude,
            fuel_fraction: w.tank,
            distance_from_prev: w.dist_prev.filter(|d| d.is_finite()).unwrap_or(0.0),
        }
    }
}

#[derive(Deserialize)]
struct WireStop {
    #[serde(deserialize_with = "utc")]
    arrival_datetime: OffsetDateTime,
    #[serde(deserialize_with = "utc")]
    departure_datetime: OffsetDateTime,
    latitude: f64,
    longitude: f64,
    type_new: StopType,
    #[serde(default)]
    dwell_time: Option<f64>,
    #[serde(default)]
    fuel_tank_percent_before: Option<f64>,
    #[serde(default)]
    fuel_tank_percent_after: Option<f64>,
    #[serde(default)]
    miles_travelled: Option<f64>,
    #[serde(default)]
    quantity: Option<f64>,
    #[serde(default)]
    unit_price: Option<f64>,
    #[serde(default)]
    total_cost: Option<f64>,
    #[serde(default)]
    fuel_location_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl From<WireStop> for StopRecord {
    fn from(w: WireStop) -> Self {
        let dwell = w
            .dwell_time
            .unwrap_or_else(|| (w.departure_datetime - w.arrival_datetime).as_seconds_f64());
        StopRecord {
            arrival_time: w.arrival_datetime,
            departure_time: w.departure_datetime,
            latitude: w.latitude,
            longitude: w.longitude,
            stop_type: w.type_new,
            dwell_seconds: dwell,
            fuel_fraction_before: w.fuel_tank_percent_before.unwrap_or(0.0),
            fuel_fraction_after: w.fuel_tank_percent_after.unwrap_or(0.0),
            miles_from_last_stop: w.miles_travelled.unwrap_or(0.0),
            quantity_purchased: w.quantity,
            unit_price: w.unit_price,
            total_cost: w.total_cost,
            location_name: w.fuel_location_name,
            city: w.city.unwrap_or_default(),
            state: w.state.unwrap_or_default(),
        }
    }
}

pub fn decode_events(json: &str) -> Result<Vec<RawTelemetryEvent>> {
    let rows: Vec<WireEvent> = serde_json::from_str(json)?;
    Ok(rows.into_iter().map(RawTelemetryEvent::from).collect())
}

pub fn decode_stops(json: &str) -> Result<Vec<StopRecord>> {
    let rows: Vec<WireStop> = serde_json::from_str(json)?;
    Ok(rows.into_iter().map(StopRecord::from).collect())
}
