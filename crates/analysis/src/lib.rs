use model::*;
use serde_json::{json, Value};

mod metrics;
mod normalize;
mod profile;
mod projection;

pub use metrics::{compute_metrics, miles_per_gallon, stop_metrics};
pub use normalize::normalize;
pub use profile::{route_profile, speed_mph, summarize_trip};
pub use projection::{
    fuel_search_eligible, project_fuel_range, project_rest_range, ProjectionConfig,
};

/// Trip and stop metrics at `position`, shaped for the presentation layer.
/// `metrics.mpg` is null where mileage is not applicable.
pub fn position_overview(
    trip: &NormalizedTrip,
    stops: &[StopRecord],
    position: usize,
    tank_capacity: f64,
) -> Value {
    let metrics = compute_metrics(&trip.drive_points, stops, &trip.stop_indices, position, tank_capacity);
    let stop = stop_metrics(stops, &trip.stop_indices, position);
    json!({
        "position": position,
        "at_stop": stop.is_some(),
        "metrics": metrics,
        "stop": stop,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_position_overview_reports_na_mpg_at_start() {
        let events = vec![drive_event(0, 0.9, 0.0), drive_event(60, 0.89, 1000.0)];
        let trip = normalize(&events, &[]);
        let overview = position_overview(&trip, &[], 0, 150.0);
        assert!(overview["metrics"]["mpg"].is_null());
        assert!(overview.get("miles_per_gallon").is_none());
        assert_eq!(overview["at_stop"], false);
        assert!(overview["metrics"]["distance_miles"].is_number());
    }

    #[test]
    fn test_position_overview_on_empty_trip() {
        let overview = position_overview(&NormalizedTrip::default(), &[], 3, 150.0);
        assert!(overview["metrics"].is_null());
        assert!(overview["stop"].is_null());
    }
}
