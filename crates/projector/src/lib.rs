//! Forward range projections handed to an amenity search.
//!
//! Fuel and rest searches are mutually exclusive and single-flight: starting
//! either one cancels whatever request is outstanding, and a response is only
//! applied if its request is still the current one.

use analysis::{project_fuel_range, project_rest_range, ProjectionConfig};
use futures::future::{self, Either};
use model::*;
use parking_lot::Mutex;
use serde::Serialize;
use trip_core::{AmenityRequest, AmenitySearch, CancelToken, SearchError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(usize),
    /// the active mode was toggled off
    Cleared,
    /// fuel search requested with a tank that is not low enough
    Ineligible,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProjectorView {
    pub active: Option<SearchMode>,
    pub projection: Option<RangeProjection>,
    pub candidates: Vec<Amenity>,
    pub loading: bool,
}

struct Pending {
    id: Uuid,
    token: CancelToken,
}

#[derive(Default)]
struct ProjectorState {
    active: Option<SearchMode>,
    projection: Option<RangeProjection>,
    candidates: Vec<Amenity>,
    pending: Option<Pending>,
}

impl ProjectorState {
    fn reset(&mut self) {
        if let Some(p) = self.pending.take() {
            log::debug!("cancelling search {}", p.id);
            p.token.cancel();
        }
        self.active = None;
        self.projection = None;
        self.candidates.clear();
    }
}

pub struct RangeProjector<S: AmenitySearch> {
    search: S,
    cfg: ProjectionConfig,
    state: Mutex<ProjectorState>,
}

impl<S: AmenitySearch> RangeProjector<S> {
    pub fn new(search: S, cfg: ProjectionConfig) -> Self {
        Self { search, cfg, state: Mutex::new(ProjectorState::default()) }
    }

    pub fn view(&self) -> ProjectorView {
        let st = self.state.lock();
        ProjectorView {
            active: st.active,
            projection: st.projection.clone(),
            candidates: st.candidates.clone(),
            loading: st.pending.is_some(),
        }
    }

    /// Drops the projection and candidates, cancelling any outstanding request.
    pub fn clear(&self) {
        self.state.lock().reset();
    }

    pub async fn toggle_fuel_search(
        &self,
        points: &[DrivePoint],
        position: usize,
        unit_tank: Option<f64>,
    ) -> SearchOutcome {
        self.toggle(SearchMode::Fuel, || project_fuel_range(points, position, unit_tank, &self.cfg))
            .await
    }

    pub async fn toggle_rest_search(&self, points: &[DrivePoint], position: usize) -> SearchOutcome {
        self.toggle(SearchMode::Rest, || project_rest_range(points, position, &self.cfg))
            .await
    }

    async fn toggle(
        &self,
        mode: SearchMode,
        project: impl FnOnce() -> Option<RangeProjection>,
    ) -> SearchOutcome {
        let (id, token, request) = {
            let mut st = self.state.lock();
            if st.active == Some(mode) {
                st.reset();
                return SearchOutcome::Cleared;
            }
            // an ineligible search leaves the other mode's results in place
            let Some(projection) = project() else {
                log::debug!("{:?} search not available at this position", mode);
                return SearchOutcome::Ineligible;
            };
            st.reset();
            let request = AmenityRequest { mode, route: projection.route() };
            let id = Uuid::new_v4();
            let token = CancelToken::new();
            st.active = Some(mode);
            st.projection = Some(projection);
            st.pending = Some(Pending { id, token: token.clone() });
            (id, token, request)
        };

        log::info!("{:?} search {} over {} points", mode, id, request.route.len());
        let result = {
            let find = self.search.find(&request, &token);
            let cancelled = token.cancelled();
            futures::pin_mut!(find, cancelled);
            match future::select(find, cancelled).await {
                Either::Left((r, _)) => r,
                Either::Right(_) => Err(SearchError::Cancelled),
            }
        };

        let mut st = self.state.lock();
        let current = st.pending.as_ref().map_or(false, |p| p.id == id);
        if !current || token.is_cancelled() {
            log::debug!("search {} superseded", id);
            return SearchOutcome::Cancelled;
        }
        st.pending = None;
        match result {
            Ok(candidates) => {
                let n = candidates.len();
                st.candidates = candidates;
                SearchOutcome::Found(n)
            }
            Err(SearchError::Cancelled) => SearchOutcome::Cancelled,
            Err(e) => {
                log::warn!("amenity search {} failed: {}", id, e);
                SearchOutcome::Failed(e.to_string())
            }
        }
    }
}
