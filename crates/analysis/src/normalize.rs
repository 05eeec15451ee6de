use model::*;

/// Turns raw pings into the ordered waypoint sequence used for playback.
///
/// Drive pings map 1:1 onto drive points. A stop ping becomes a waypoint only
/// when a stop record departs at exactly its timestamp; otherwise its distance
/// is carried into the next waypoint emitted.
pub fn normalize(events: &[RawTelemetryEvent], stops: &[StopRecord]) -> NormalizedTrip {
    let mut drive_points = Vec::with_capacity(events.len());
    let mut stop_indices = StopIndexSet::new();
    let mut carried = 0.0_f64;
    let mut unmatched = 0usize;

    for ev in events {
        match ev.kind {
            EventKind::Drive => {
                drive_points.push(DrivePoint {
                    lat: ev.latitude,
                    long: ev.longitude,
                    time: ev.timestamp,
                    fuel_fraction: ev.fuel_fraction,
                    distance_from_prev: ev.distance_from_prev + carried,
                });
                carried = 0.0;
            }
            EventKind::Stop => {
                carried += ev.distance_from_prev;
                let Some(record) = stops.iter().position(|s| s.departure_time == ev.timestamp) else {
                    unmatched += 1;
                    continue;
                };
                let stop = &stops[record];
                drive_points.push(DrivePoint {
                    lat: stop.latitude,
                    long: stop.longitude,
                    time: ev.timestamp,
                    fuel_fraction: stop.fuel_fraction_after,
                    distance_from_prev: carried,
                });
                carried = 0.0;
                stop_indices.push(drive_points.len() - 1, record);
            }
        }
    }

    // trailing stop pings after the last waypoint
    if carried != 0.0 {
        if let Some(last) = drive_points.last_mut() {
            last.distance_from_prev += carried;
        }
    }

    log::debug!(
        "normalized {} events into {} points ({} stops, {} unmatched stop pings)",
        events.len(),
        drive_points.len(),
        stop_indices.len(),
        unmatched
    );

    NormalizedTrip { drive_points, stop_indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_events_give_empty_trip() {
        let trip = normalize(&[], &[stop_record(0, 60, StopType::Fuel)]);
        assert!(trip.drive_points.is_empty());
        assert!(trip.stop_indices.is_empty());
    }

    #[test]
    fn test_drive_and_matched_stop_points() {
        let events = vec![
            drive_event(0, 0.9, 0.0),
            drive_event(60, 0.88, 1000.0),
            stop_event(120, 200.0),
            stop_event(180, 0.0),
            drive_event(240, 0.95, 500.0),
        ];
        let stops = vec![stop_record(120, 180, StopType::Fuel)];
        let trip = normalize(&events, &stops);

        // 3 drive events + 1 matched stop ping
        assert_eq!(trip.drive_points.len(), 4);
        assert_eq!(trip.stop_indices.positions().collect::<Vec<_>>(), vec![2]);
        let stop_point = &trip.drive_points[2];
        assert_eq!(stop_point.lat, stops[0].latitude);
        assert_eq!(stop_point.long, stops[0].longitude);
        assert_eq!(stop_point.fuel_fraction, stops[0].fuel_fraction_after);
        // the unmatched arrival ping's distance lands on the stop point
        assert_relative_eq!(stop_point.distance_from_prev, 200.0);
    }

    #[test]
    fn test_unmatched_distance_folds_into_next_drive_point() {
        let events = vec![
            drive_event(0, 0.9, 0.0),
            stop_event(60, 300.0),
            drive_event(120, 0.88, 700.0),
        ];
        let trip = normalize(&events, &[]);
        assert_eq!(trip.drive_points.len(), 2);
        assert!(trip.stop_indices.is_empty());
        assert_relative_eq!(trip.drive_points[1].distance_from_prev, 1000.0);
    }

    #[test]
    fn test_distance_is_conserved() {
        let events = vec![
            drive_event(0, 0.9, 12.0),
            drive_event(60, 0.88, 1000.0),
            stop_event(120, 250.0),
            stop_event(180, 40.0),
            drive_event(240, 0.86, 800.0),
            stop_event(300, 90.0),
            stop_event(360, 10.0),
        ];
        let stops = vec![
            stop_record(100, 180, StopType::ShortRest),
            stop_record(290, 360, StopType::End),
        ];
        let trip = normalize(&events, &stops);

        let input: f64 = events.iter().map(|e| e.distance_from_prev).sum();
        let output: f64 = trip.drive_points.iter().map(|p| p.distance_from_prev).sum();
        assert_relative_eq!(input, output);
        assert_eq!(trip.drive_points.len(), 3 + 2);

        let positions: Vec<usize> = trip.stop_indices.positions().collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        for entry in trip.stop_indices.iter() {
            let p = &trip.drive_points[entry.point];
            assert!(stops.iter().any(|s| s.latitude == p.lat && s.longitude == p.long));
        }
    }
}
