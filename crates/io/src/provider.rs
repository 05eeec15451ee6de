use crate::wire::{decode_events, decode_stops};
use anyhow::Context;
use model::{TripData, TripKey};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use trip_core::{ProviderError, TripProvider};

/// Trips laid out on disk as `<root>/<tractor_id>/<arrival>/`, each holding
/// `events.json`, `stops.json` and optionally `trip.json`.
pub struct JsonTripProvider {
    root: PathBuf,
}

#[derive(Deserialize, Default)]
struct TripMeta {
    #[serde(default)]
    unit_tank: Option<f64>,
}

impl JsonTripProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn trip_dir(&self, key: &TripKey) -> PathBuf {
        self.root.join(&key.tractor_id).join(&key.arrival)
    }
}

async fn read(path: &Path) -> Result<String, ProviderError> {
    Ok(tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?)
}

#[async_trait::async_trait]
impl TripProvider for JsonTripProvider {
    async fn load_trip(&self, key: &TripKey) -> Result<TripData, ProviderError> {
        let dir = self.trip_dir(key);
        if !dir.is_dir() {
            return Err(ProviderError::NotFound(format!("{} @ {}", key.tractor_id, key.arrival)));
        }

        let events = decode_events(&read(&dir.join("events.json")).await?)
            .with_context(|| format!("decode events in {}", dir.display()))?;
        let stops = decode_stops(&read(&dir.join("stops.json")).await?)
            .with_context(|| format!("decode stops in {}", dir.display()))?;

        let meta_path = dir.join("trip.json");
        let meta = if meta_path.is_file() {
            serde_json::from_str::<TripMeta>(&read(&meta_path).await?)
                .with_context(|| format!("decode {}", meta_path.display()))?
        } else {
            TripMeta::default()
        };

        log::info!(
            "loaded trip {} @ {}: {} events, {} stops",
            key.tractor_id,
            key.arrival,
            events.len(),
            stops.len()
        );
        Ok(TripData { events, stops, unit_tank: meta.unit_tank })
    }
}
