use amenity_http::AmenityServiceConfig;
use analysis::ProjectionConfig;
use anyhow::Context;
use playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// root of the `<tractor_id>/<arrival>/` trip directories
    pub data_root: Option<PathBuf>,
    pub playback: PlaybackConfig,
    pub projection: ProjectionConfig,
    pub amenity_service: AmenityServiceConfig,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let cfg = serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(cfg)
    }
}
