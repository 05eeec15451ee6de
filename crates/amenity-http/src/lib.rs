use anyhow::Context;
use model::{Amenity, LatLong, SearchMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trip_core::*;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmenityServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AmenityServiceConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8000".into(), timeout_secs: 30 }
    }
}

/// Client for the `findFuelStops` / `findRestStops` endpoints.
pub struct HttpAmenitySearch {
    cfg: AmenityServiceConfig,
    client: reqwest::Client,
}

impl HttpAmenitySearch {
    pub fn new(cfg: AmenityServiceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self { cfg, client })
    }

    fn endpoint(&self, mode: SearchMode) -> String {
        let path = match mode {
            SearchMode::Fuel => "api/findFuelStops",
            SearchMode::Rest => "api/findRestStops",
        };
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, request: &AmenityRequest) -> Result<Vec<Amenity>, SearchError> {
        let url = self.endpoint(request.mode);
        log::debug!("POST {} with {} route points", url, request.route.len());
        let resp = self
            .client
            .post(&url)
            .json(&request_body(request))
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;

        let status = resp.status();
        // the service answers 404 when nothing lies along the route
        if status == reqwest::StatusCode::NOT_FOUND {
            log::debug!("{} found nothing along the route", url);
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(SearchError::Http(status.as_u16()));
        }
        let rows: Vec<AmenityRow> = resp.json().await.context("decode amenity rows")?;
        Ok(rows.into_iter().map(Amenity::from).collect())
    }
}

#[async_trait::async_trait]
impl AmenitySearch for HttpAmenitySearch {
    async fn find(
        &self,
        request: &AmenityRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<Amenity>, SearchError> {
        if request.route.is_empty() {
            return Ok(Vec::new());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SearchError::Cancelled),
            r = self.post(request) => r,
        }
    }
}

#[derive(Serialize)]
struct WirePoint {
    lat: f64,
    long: f64,
}

impl From<&LatLong> for WirePoint {
    fn from(p: &LatLong) -> Self {
        Self { lat: p.lat, long: p.long }
    }
}

fn request_body(request: &AmenityRequest) -> serde_json::Value {
    let points: Vec<WirePoint> = request.route.iter().map(WirePoint::from).collect();
    match request.mode {
        SearchMode::Fuel => serde_json::json!({ "subRoute": points }),
        SearchMode::Rest => serde_json::json!({ "routeSegment": points }),
    }
}

/// Row shape shared by both endpoints; rest areas use `name`, fuel uses `location_name`.
#[derive(Deserialize)]
struct AmenityRow {
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "lon")]
    longitude: f64,
    #[serde(default, alias = "name")]
    location_name: Option<String>,
    #[serde(default)]
    unit_price: Option<f64>,
    #[serde(default)]
    traffic_count: Option<u32>,
}

impl From<AmenityRow> for Amenity {
    fn from(r: AmenityRow) -> Self {
        Amenity {
            lat: r.latitude,
            lon: r.longitude,
            location_name: r.location_name,
            unit_price: r.unit_price,
            traffic_count: r.traffic_count,
        }
    }
}
