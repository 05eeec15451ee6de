use model::*;

/// Cumulative trip metrics at `position` (clamped to the last point).
///
/// Fuel consumed is netted per refuel: every fueling stop closes the segment
/// opened by the previous one (or the trip start) using the stop's
/// before-fill fraction, and the open tail is closed against the current point.
/// Returns `None` for an empty trip.
pub fn compute_metrics(
    points: &[DrivePoint],
    stops: &[StopRecord],
    stop_indices: &StopIndexSet,
    position: usize,
    tank_capacity: f64,
) -> Option<TripMetricsSnapshot> {
    let last = points.len().checked_sub(1)?;
    let position = position.min(last);
    let current = &points[position];

    let mut distance_miles = 0.0_f64;
    let mut total_dwell_minutes = 0.0_f64;
    let mut fuel_purchased = 0.0_f64;
    let mut amount_spent = 0.0_f64;
    let mut fuel_consumed = 0.0_f64;
    let mut last_fuel = 0usize;

    for i in 0..position {
        let next = i + 1;
        distance_miles += points[next].distance_from_prev * METERS_TO_MILES;

        let Some(stop) = stop_indices.record_at(next).and_then(|r| stops.get(r)) else {
            continue;
        };
        total_dwell_minutes += stop.dwell_seconds / 60.0;
        fuel_purchased += stop.quantity_purchased.unwrap_or(0.0);
        amount_spent += stop.total_cost.unwrap_or(0.0);
        if stop.stop_type.is_fueling() {
            fuel_consumed += (points[last_fuel].fuel_fraction - stop.fuel_fraction_before) * tank_capacity;
            last_fuel = next;
        }
    }
    fuel_consumed += (points[last_fuel].fuel_fraction - current.fuel_fraction) * tank_capacity;

    Some(TripMetricsSnapshot {
        distance_miles,
        elapsed_seconds: (current.time - points[0].time).whole_seconds(),
        fuel_level: current.fuel_fraction,
        total_dwell_minutes,
        amount_spent,
        fuel_purchased,
        fuel_consumed,
        mpg: miles_per_gallon(distance_miles, fuel_consumed),
    })
}

/// None when either side is not positive.
pub fn miles_per_gallon(distance_miles: f64, fuel_consumed: f64) -> Option<f64> {
    if distance_miles > 0.0 && fuel_consumed > 0.0 {
        Some(distance_miles / fuel_consumed)
    } else {
        None
    }
}

/// Detail of the stop sitting at `position`, if any.
pub fn stop_metrics(
    stops: &[StopRecord],
    stop_indices: &StopIndexSet,
    position: usize,
) -> Option<StopMetricsSnapshot> {
    let stop = stops.get(stop_indices.record_at(position)?)?;
    Some(StopMetricsSnapshot {
        arrival_time: stop.arrival_time,
        departure_time: stop.departure_time,
        stop_type: stop.stop_type,
        dwell_minutes: stop.dwell_seconds / 60.0,
        miles_from_last_stop: if position == 0 { 0.0 } else { stop.miles_from_last_stop },
        fuel_fraction_before: stop.fuel_fraction_before,
        fuel_fraction_after: stop.fuel_fraction_after,
        location_name: stop.location_name.clone(),
        unit_price: stop.unit_price,
        total_cost: stop.total_cost,
        quantity: stop.quantity_purchased,
        city: stop.city.clone(),
        state: stop.state.clone(),
    })
}
