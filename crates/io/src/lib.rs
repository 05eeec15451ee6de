use anyhow::{Context, Result};
use model::*;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::{fs::File, path::Path};
use time::format_description::well_known::Rfc3339;

mod provider;
mod wire;

pub use provider::JsonTripProvider;
pub use wire::{decode_events, decode_stops, parse_utc};

/// One drive point per line, in route order.
pub fn export_ndjson(points: &[DrivePoint], path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = std::io::BufWriter::new(f);
    for p in points {
        let s = serde_json::to_string(p)?;
        writeln!(w, "{}", s)?;
    }
    w.flush()?;
    Ok(())
}

pub fn import_ndjson(path: &Path) -> Result<Vec<DrivePoint>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = std::io::BufReader::new(f);
    let mut points = vec![];
    for line in rdr.lines() {
        let s = line?;
        if s.trim().is_empty() {
            continue;
        }
        points.push(serde_json::from_str(&s)?);
    }
    Ok(points)
}

#[derive(Serialize)]
struct ProfileRow {
    index: usize,
    time: String,
    lat: f64,
    long: f64,
    fuel_fraction: f64,
    speed_mph: f64,
    mileage: f64,
    fuel_burned: Option<f64>,
}

/// Writes the per-point profile joined with the point it describes.
pub fn export_profile_csv(points: &[DrivePoint], profile: &[PointProfile], path: &Path) -> Result<()> {
    let w = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    write_profile(w, points, profile)
}

fn write_profile<W: Write>(mut w: csv::Writer<W>, points: &[DrivePoint], profile: &[PointProfile]) -> Result<()> {
    for pp in profile {
        let Some(p) = points.get(pp.index) else {
            log::warn!("profile index {} outside route of {} points", pp.index, points.len());
            continue;
        };
        w.serialize(ProfileRow {
            index: pp.index,
            time: p.time.format(&Rfc3339)?,
            lat: p.lat,
            long: p.long,
            fuel_fraction: p.fuel_fraction,
            speed_mph: pp.speed_mph,
            mileage: pp.mileage,
            fuel_burned: pp.fuel_burned,
        })?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn points() -> Vec<DrivePoint> {
        let t0 = OffsetDateTime::from_unix_timestamp(1_719_938_884).unwrap();
        (0..3)
            .map(|i| DrivePoint {
                lat: 41.0 + i as f64 * 0.01,
                long: -88.0,
                time: t0 + time::Duration::minutes(i),
                fuel_fraction: 0.6,
                distance_from_prev: if i == 0 { 0.0 } else { 1112.0 },
            })
            .collect()
    }

    #[test]
    fn test_ndjson_one_point_per_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("route.ndjson");
        export_ndjson(&points(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().contains("\"time\":\"2024-07-02T16:48:04Z\""));
        assert_eq!(import_ndjson(&path).unwrap(), points());
    }

    #[test]
    fn test_profile_csv_rows() {
        let profile = vec![
            PointProfile { index: 1, speed_mph: 41.5, mileage: 6.2, fuel_burned: Some(0.4) },
            PointProfile { index: 2, speed_mph: 41.5, mileage: 6.2, fuel_burned: None },
            PointProfile { index: 7, speed_mph: 0.0, mileage: 0.0, fuel_burned: None },
        ];
        let mut buf = Vec::new();
        write_profile(csv::Writer::from_writer(&mut buf), &points(), &profile).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "index,time,lat,long,fuel_fraction,speed_mph,mileage,fuel_burned");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,2024-07-02T16:49:04Z,"));
        assert!(lines[1].ends_with(",-88.0,0.6,41.5,6.2,0.4"));
        assert!(lines[2].ends_with(",6.2,"));
    }
}
