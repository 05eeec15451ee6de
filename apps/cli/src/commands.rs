use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use serde_json::json;

use amenity_corridor::{AmenityCatalog, CorridorSearch};
use amenity_http::HttpAmenitySearch;
use analysis as an;
use model::*;
use trip_core::{AmenitySearch, PlaybackEvent, PlaybackRx, PlaybackState};

use crate::config::AppConfig;
use crate::session::{LoadedTrip, TripSession};

#[derive(Debug, Clone, Args)]
pub struct TripArgs {
    /// Tractor identifier
    #[arg(long)]
    pub tractor: String,

    /// Trip arrival time, `YYYY-MM-DD HH:MM:SS`
    #[arg(long)]
    pub arrival: String,
}

impl TripArgs {
    pub fn key(&self) -> TripKey {
        TripKey { tractor_id: self.tractor.clone(), arrival: self.arrival.clone() }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Fuel,
    Rest,
}

fn print_json(v: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

pub async fn metrics(trip: &LoadedTrip, cfg: &AppConfig, position: usize) -> Result<()> {
    if position >= trip.len() {
        log::warn!("position {} past the end of a {}-point trip", position, trip.len());
    }
    print_json(&trip.overview(position, &cfg.projection))
}

pub async fn summary(trip: &LoadedTrip) -> Result<()> {
    print_json(&trip.summary())
}

pub async fn profile(trip: &LoadedTrip, cfg: &AppConfig, out: Option<&Path>) -> Result<()> {
    let profile = trip.profile(&cfg.projection);
    match out {
        Some(path) => {
            iox::export_profile_csv(trip.points(), &profile, path)?;
            log::info!("wrote {} profile rows to {}", profile.len(), path.display());
            Ok(())
        }
        None => print_json(&profile),
    }
}

pub async fn export(trip: &LoadedTrip, out: &Path) -> Result<()> {
    iox::export_ndjson(trip.points(), out)?;
    log::info!("wrote {} drive points to {}", trip.len(), out.display());
    Ok(())
}

/// Plays the trip in real time, printing stop arrivals as they happen.
pub async fn replay(trip: Arc<LoadedTrip>, cfg: AppConfig, from_percent: f64, every: usize) -> Result<()> {
    if trip.len() < 2 {
        bail!("trip has {} points, nothing to replay", trip.len());
    }
    let projection = cfg.projection.clone();
    let (session, rx) = TripSession::start(trip.clone(), cfg, CorridorSearch::new(AmenityCatalog::default()));
    session.playback().seek(from_percent);

    let printer = tokio::task::spawn_blocking(move || pump(rx, &trip, &projection, every.max(1)));
    session.playback().play();
    if session.playback().state() != PlaybackState::Playing {
        log::info!("already at the end of the trip");
        session.shutdown();
        return Ok(());
    }

    let last = printer.await.context("replay printer")??;
    log::info!("replay finished at position {}", last);
    session.shutdown();
    Ok(())
}

fn pump(rx: PlaybackRx, trip: &LoadedTrip, cfg: &an::ProjectionConfig, every: usize) -> Result<usize> {
    let mut last = 0;
    for ev in rx.iter() {
        match ev {
            PlaybackEvent::Moved { position } => {
                last = position;
                if position % every == 0 {
                    let p = &trip.points()[position];
                    println!("{}", json!({ "position": position, "lat": p.lat, "long": p.long }));
                }
            }
            PlaybackEvent::StateChanged { to: PlaybackState::PausedAtStop, .. } => {
                println!("{}", serde_json::to_string(&trip.overview(last, cfg))?);
            }
            PlaybackEvent::StateChanged { .. } => {}
            PlaybackEvent::ReachedEnd { position } => {
                println!("{}", serde_json::to_string(&trip.overview(position, cfg))?);
                return Ok(position);
            }
        }
    }
    Ok(last)
}

/// Range projection from a point along the trip, optionally with candidates.
pub async fn project(
    trip: Arc<LoadedTrip>,
    cfg: AppConfig,
    mode: ModeArg,
    at_percent: f64,
    catalog: Option<PathBuf>,
    no_search: bool,
) -> Result<()> {
    if no_search {
        let position = percent_to_position(trip.len(), at_percent);
        let projection = match mode {
            ModeArg::Fuel => an::project_fuel_range(trip.points(), position, trip.unit_tank, &cfg.projection),
            ModeArg::Rest => an::project_rest_range(trip.points(), position, &cfg.projection),
        };
        return print_json(&json!({ "position": position, "projection": projection }));
    }
    match catalog {
        Some(path) => {
            let search = CorridorSearch::new(AmenityCatalog::from_path(&path)?);
            run_projection(trip, cfg, search, mode, at_percent).await
        }
        None => {
            let search = HttpAmenitySearch::new(cfg.amenity_service.clone())?;
            run_projection(trip, cfg, search, mode, at_percent).await
        }
    }
}

async fn run_projection<S: AmenitySearch>(
    trip: Arc<LoadedTrip>,
    cfg: AppConfig,
    search: S,
    mode: ModeArg,
    at_percent: f64,
) -> Result<()> {
    let (session, _rx) = TripSession::start(trip, cfg, search);
    session.playback().seek(at_percent);
    let outcome = match mode {
        ModeArg::Fuel => session.toggle_fuel_search().await,
        ModeArg::Rest => session.toggle_rest_search().await,
    };
    log::info!("search outcome: {:?}", outcome);
    let view = session.overview();
    session.shutdown();
    print_json(&json!({ "outcome": format!("{:?}", outcome), "session": view }))
}

fn percent_to_position(len: usize, percent: f64) -> usize {
    if len == 0 {
        return 0;
    }
    let pct = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
    (pct / 100.0 * (len - 1) as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::sample_trip;
    use trip_core::channel;

    #[test]
    fn test_percent_to_position() {
        assert_eq!(percent_to_position(0, 50.0), 0);
        assert_eq!(percent_to_position(41, 50.0), 20);
        assert_eq!(percent_to_position(41, 250.0), 40);
        assert_eq!(percent_to_position(41, f64::NAN), 0);
    }

    #[test]
    fn test_pump_stops_at_end() {
        let trip = sample_trip();
        let (tx, rx) = channel();
        tx.send(PlaybackEvent::Moved { position: 10 }).unwrap();
        tx.send(PlaybackEvent::Moved { position: 11 }).unwrap();
        tx.send(PlaybackEvent::StateChanged { from: PlaybackState::Playing, to: PlaybackState::PausedAtStop })
            .unwrap();
        tx.send(PlaybackEvent::ReachedEnd { position: 40 }).unwrap();
        tx.send(PlaybackEvent::Moved { position: 3 }).unwrap();
        let last = pump(rx, &trip, &an::ProjectionConfig::default(), 10).unwrap();
        assert_eq!(last, 40);
    }

    #[test]
    fn test_pump_ends_when_driver_goes_away() {
        let trip = sample_trip();
        let (tx, rx) = channel();
        tx.send(PlaybackEvent::Moved { position: 5 }).unwrap();
        drop(tx);
        assert_eq!(pump(rx, &trip, &an::ProjectionConfig::default(), 1).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_export_writes_route() {
        let trip = sample_trip();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("route.ndjson");
        export(&trip, &out).await.unwrap();
        assert_eq!(iox::import_ndjson(&out).unwrap().len(), trip.len());
    }
}
