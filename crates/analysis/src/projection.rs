use model::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectionConfig {
    /// miles per gallon assumed for the forward simulation
    pub fuel_economy: f64,
    /// gallons, used when the vehicle's tank size is unknown
    pub default_tank_capacity: f64,
    /// fuel search only offered below this fraction
    pub fuel_search_threshold: f64,
    /// simulation stops once the projected fraction drops below this
    pub fuel_reserve_fraction: f64,
    pub assumed_speed_mph: f64,
    pub max_driving_hours: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fuel_economy: 7.0,
            default_tank_capacity: 150.0,
            fuel_search_threshold: 0.50,
            fuel_reserve_fraction: 0.15,
            assumed_speed_mph: 55.0,
            max_driving_hours: 4.0,
        }
    }
}

impl ProjectionConfig {
    pub fn tank_capacity(&self, unit_tank: Option<f64>) -> f64 {
        unit_tank
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(self.default_tank_capacity)
    }

    pub fn rest_budget_miles(&self) -> f64 {
        self.assumed_speed_mph * self.max_driving_hours
    }
}

pub fn fuel_search_eligible(points: &[DrivePoint], position: usize, cfg: &ProjectionConfig) -> bool {
    points
        .get(position)
        .map_or(false, |p| p.fuel_fraction < cfg.fuel_search_threshold)
}

/// Points reachable from `position` before the tank hits reserve.
///
/// `None` when the trip is empty, `position` is out of range or the tank is
/// not low enough to warrant a search.
pub fn project_fuel_range(
    points: &[DrivePoint],
    position: usize,
    unit_tank: Option<f64>,
    cfg: &ProjectionConfig,
) -> Option<RangeProjection> {
    if !fuel_search_eligible(points, position, cfg) {
        return None;
    }
    let tank = cfg.tank_capacity(unit_tank);
    let mut remaining = points[position].fuel_fraction;
    let mut visited = vec![VisitedPoint::from(&points[position])];

    for p in &points[position + 1..] {
        let miles = p.distance_from_prev * METERS_TO_MILES;
        remaining -= (miles / cfg.fuel_economy) / tank;
        visited.push(VisitedPoint::from(p));
        if remaining < cfg.fuel_reserve_fraction {
            break;
        }
    }

    Some(RangeProjection { mode: SearchMode::Fuel, visited_points: visited })
}

/// Points reachable from `position` within one legal driving stint.
pub fn project_rest_range(
    points: &[DrivePoint],
    position: usize,
    cfg: &ProjectionConfig,
) -> Option<RangeProjection> {
    let start = points.get(position)?;
    let budget = cfg.rest_budget_miles();
    let mut travelled = 0.0_f64;
    let mut visited = vec![VisitedPoint::from(start)];

    for p in &points[position + 1..] {
        travelled += p.distance_from_prev * METERS_TO_MILES;
        visited.push(VisitedPoint::from(p));
        if travelled >= budget {
            break;
        }
    }

    Some(RangeProjection { mode: SearchMode::Rest, visited_points: visited })
}
