//! In-process amenity search over a local catalog of fuel transactions and
//! mapped places, for running the projector without the HTTP service.

use anyhow::Context;
use geo::{Closest, ClosestPoint, HaversineDistance, Line, Point};
use model::{Amenity, LatLong, SearchMode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use trip_core::*;

/// Two miles, in meters.
pub const CORRIDOR_METERS: f64 = 3218.69;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FuelTransaction {
    pub location_id: i64,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Place {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub highway: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    fn is_rest_area(&self) -> bool {
        self.highway.as_deref() == Some("rest_area")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AmenityCatalog {
    #[serde(default)]
    pub fuel: Vec<FuelTransaction>,
    #[serde(default)]
    pub places: Vec<Place>,
}

impl AmenityCatalog {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse catalog {}", path.display()))
    }
}

pub struct CorridorSearch {
    catalog: AmenityCatalog,
    corridor_m: f64,
}

impl CorridorSearch {
    pub fn new(catalog: AmenityCatalog) -> Self {
        Self { catalog, corridor_m: CORRIDOR_METERS }
    }

    pub fn with_corridor(mut self, meters: f64) -> Self {
        self.corridor_m = meters;
        self
    }

    /// Fuel rows inside the corridor, grouped per location: cheapest price,
    /// number of transactions, mean position.
    pub fn fuel_stops(&self, route: &[LatLong]) -> Vec<Amenity> {
        let mut groups: BTreeMap<(i64, Option<String>), Group> = BTreeMap::new();
        for row in &self.catalog.fuel {
            if !within(route, row.latitude, row.longitude, self.corridor_m) {
                continue;
            }
            let g = groups.entry((row.location_id, row.location_name.clone())).or_default();
            g.count += 1;
            g.lat_sum += row.latitude;
            g.lon_sum += row.longitude;
            if let Some(p) = row.unit_price {
                g.min_price = Some(g.min_price.map_or(p, |m: f64| m.min(p)));
            }
        }
        groups
            .into_iter()
            .map(|((_, name), g)| Amenity {
                lat: g.lat_sum / g.count as f64,
                lon: g.lon_sum / g.count as f64,
                location_name: name,
                unit_price: g.min_price,
                traffic_count: Some(g.count),
            })
            .collect()
    }

    pub fn rest_stops(&self, route: &[LatLong]) -> Vec<Amenity> {
        self.catalog
            .places
            .iter()
            .filter(|p| p.is_rest_area() && within(route, p.latitude, p.longitude, self.corridor_m))
            .map(|p| Amenity {
                lat: p.latitude,
                lon: p.longitude,
                location_name: p.name.clone(),
                unit_price: None,
                traffic_count: None,
            })
            .collect()
    }
}

#[derive(Default)]
struct Group {
    count: u32,
    lat_sum: f64,
    lon_sum: f64,
    min_price: Option<f64>,
}

#[async_trait::async_trait]
impl AmenitySearch for CorridorSearch {
    async fn find(
        &self,
        request: &AmenityRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<Amenity>, SearchError> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let found = match request.mode {
            SearchMode::Fuel => self.fuel_stops(&request.route),
            SearchMode::Rest => self.rest_stops(&request.route),
        };
        log::debug!("corridor search ({:?}) matched {} amenities", request.mode, found.len());
        Ok(found)
    }
}

/// Distance in meters from a point to the route polyline.
///
/// The closest point on each leg is taken in lon/lat space and measured
/// with haversine, which is close enough at a two-mile buffer.
pub fn distance_to_route(route: &[LatLong], lat: f64, lon: f64) -> Option<f64> {
    let p = Point::new(lon, lat);
    let to = |q: &LatLong| Point::new(q.long, q.lat);
    match route {
        [] => None,
        [only] => Some(p.haversine_distance(&to(only))),
        _ => route
            .windows(2)
            .map(|w| {
                let leg = Line::new(to(&w[0]), to(&w[1]));
                match leg.closest_point(&p) {
                    Closest::Intersection(c) | Closest::SinglePoint(c) => p.haversine_distance(&c),
                    Closest::Indeterminate => p.haversine_distance(&to(&w[0])),
                }
            })
            .reduce(f64::min),
    }
}

fn within(route: &[LatLong], lat: f64, lon: f64, corridor_m: f64) -> bool {
    distance_to_route(route, lat, lon).map_or(false, |d| d <= corridor_m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Vec<LatLong> {
        vec![
            LatLong { lat: 41.0, long: -88.0 },
            LatLong { lat: 41.0, long: -87.95 },
            LatLong { lat: 41.0, long: -87.9 },
        ]
    }

    fn fuel(id: i64, name: &str, price: f64, lat: f64, lon: f64) -> FuelTransaction {
        FuelTransaction {
            location_id: id,
            location_name: Some(name.into()),
            unit_price: Some(price),
            latitude: lat,
            longitude: lon,
        }
    }

    fn catalog() -> AmenityCatalog {
        AmenityCatalog {
            fuel: vec![
                fuel(1, "Pilot 412", 3.99, 41.01, -87.95),
                fuel(1, "Pilot 412", 3.79, 41.011, -87.95),
                fuel(2, "Loves 88", 3.59, 41.005, -87.91),
                // about 5.5 km north of the route
                fuel(3, "Far Away", 2.99, 41.05, -87.95),
            ],
            places: vec![
                Place { name: Some("I-80 Rest Area".into()), highway: Some("rest_area".into()), latitude: 40.99, longitude: -87.97 },
                Place { name: Some("Truck Wash".into()), highway: Some("services".into()), latitude: 40.99, longitude: -87.97 },
            ],
        }
    }

    #[test]
    fn test_distance_to_route() {
        let d = distance_to_route(&route(), 41.01, -87.95).unwrap();
        assert!((d - 1112.0).abs() < 5.0, "{}", d);
        // past the end the nearest point is the endpoint
        let d = distance_to_route(&route(), 41.0, -87.85).unwrap();
        assert!(d > 4000.0 && d < 4300.0, "{}", d);
        assert_eq!(distance_to_route(&[], 41.0, -88.0), None);
    }

    #[test]
    fn test_fuel_stops_grouped_per_location() {
        let s = CorridorSearch::new(catalog());
        let found = s.fuel_stops(&route());
        assert_eq!(found.len(), 2);

        let pilot = &found[0];
        assert_eq!(pilot.location_name.as_deref(), Some("Pilot 412"));
        assert_eq!(pilot.unit_price, Some(3.79));
        assert_eq!(pilot.traffic_count, Some(2));
        assert!((pilot.lat - 41.0105).abs() < 1e-9);

        assert_eq!(found[1].location_name.as_deref(), Some("Loves 88"));
        assert_eq!(found[1].traffic_count, Some(1));
    }

    #[test]
    fn test_rest_stops_only_rest_areas() {
        let s = CorridorSearch::new(catalog());
        let found = s.rest_stops(&route());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location_name.as_deref(), Some("I-80 Rest Area"));
    }

    #[test]
    fn test_narrow_corridor_excludes_more() {
        let s = CorridorSearch::new(catalog()).with_corridor(800.0);
        let found = s.fuel_stops(&route());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location_name.as_deref(), Some("Loves 88"));
    }

    #[test]
    fn test_catalog_json() {
        let c: AmenityCatalog = serde_json::from_str(
            r#"{"fuel": [{"location_id": 9, "location_name": "TA 7", "unit_price": 4.1,
                          "latitude": 41.0, "longitude": -88.0, "quantity": 80}]}"#,
        )
        .unwrap();
        assert_eq!(c.fuel.len(), 1);
        assert!(c.places.is_empty());
    }

    #[tokio::test]
    async fn test_find_dispatches_by_mode() {
        let s = CorridorSearch::new(catalog());
        let req = AmenityRequest { mode: SearchMode::Rest, route: route() };
        let found = s.find(&req, &CancelToken::new()).await.unwrap();
        assert_eq!(found.len(), 1);

        let empty = AmenityRequest { mode: SearchMode::Fuel, route: Vec::new() };
        assert!(s.find(&empty, &CancelToken::new()).await.unwrap().is_empty());

        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(s.find(&req, &token).await, Err(SearchError::Cancelled)));
    }
}
