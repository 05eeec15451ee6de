use model::*;

const MPS_TO_MPH: f64 = 2.23694;
const SEGMENT_MILES: f64 = 10.0;
const FUEL_SMOOTHING: usize = 5;

/// Whole-trip totals over the stop records and the normalized route.
pub fn summarize_trip(trip: &NormalizedTrip, stops: &[StopRecord]) -> TripSummary {
    let mut s = TripSummary::default();
    for stop in stops {
        s.total_stops += 1;
        match stop.stop_type {
            t if t.is_fueling() => s.fuel_stops += 1,
            StopType::ShortRest => s.short_rest_stops += 1,
            t if t.is_rest() => s.overnight_rest_stops += 1,
            _ => {}
        }
        s.total_dwell_seconds += stop.dwell_seconds;
        s.fuel_volume_purchased += stop.quantity_purchased.unwrap_or(0.0);
        s.fuel_dollars_spent += stop.total_cost.unwrap_or(0.0);
    }

    let points = &trip.drive_points;
    s.distance_miles = points.iter().skip(1).map(|p| p.distance_from_prev).sum::<f64>() * METERS_TO_MILES;
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        s.elapsed_seconds = (last.time - first.time).whole_seconds();
    }
    s
}

/// Speed and segment mileage for every drive (non-stop) point.
///
/// Drive points are grouped into consecutive ~10 mile segments. A segment's
/// fuel burn compares the mean of its first five fuel readings against the
/// mean of its last five.
pub fn route_profile(trip: &NormalizedTrip, tank_capacity: f64) -> Vec<PointProfile> {
    let points = &trip.drive_points;
    let mut out = Vec::with_capacity(points.len());
    let mut segment: Vec<usize> = Vec::new();
    let mut segment_miles = 0.0_f64;

    let drive: Vec<usize> = (0..points.len()).filter(|i| !trip.stop_indices.contains(*i)).collect();
    for (k, &i) in drive.iter().enumerate() {
        segment.push(i);
        segment_miles += points[i].distance_from_prev * METERS_TO_MILES;
        if segment_miles >= SEGMENT_MILES || k == drive.len() - 1 {
            close_segment(points, &segment, segment_miles, tank_capacity, &mut out);
            segment.clear();
            segment_miles = 0.0;
        }
    }
    out
}

fn close_segment(
    points: &[DrivePoint],
    segment: &[usize],
    segment_miles: f64,
    tank_capacity: f64,
    out: &mut Vec<PointProfile>,
) {
    let fuel: Vec<f64> = segment.iter().map(|&i| points[i].fuel_fraction).collect();
    let (start, end) = if fuel.len() < FUEL_SMOOTHING {
        (fuel[0], fuel[fuel.len() - 1])
    } else {
        (mean(&fuel[..FUEL_SMOOTHING]), mean(&fuel[fuel.len() - FUEL_SMOOTHING..]))
    };
    let burned = (tank_capacity > 0.0).then(|| (start - end) * tank_capacity);
    let mileage = match burned {
        Some(b) if b > 0.0 => segment_miles / b,
        _ => 0.0,
    };

    for &i in segment {
        let share = if segment_miles > 0.0 {
            points[i].distance_from_prev * METERS_TO_MILES / segment_miles
        } else {
            0.0
        };
        out.push(PointProfile {
            index: i,
            speed_mph: speed_mph(points, i),
            mileage,
            fuel_burned: burned.map(|b| b * share),
        });
    }
}

/// Speed over the leg ending at point `i`; 0 for the first point or a
/// non-advancing clock.
pub fn speed_mph(points: &[DrivePoint], i: usize) -> f64 {
    if i == 0 || i >= points.len() {
        return 0.0;
    }
    let dt = (points[i].time - points[i - 1].time).as_seconds_f64();
    if dt <= 0.0 {
        return 0.0;
    }
    points[i].distance_from_prev / dt * MPS_TO_MPH
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / (v.len() as f64)
}
