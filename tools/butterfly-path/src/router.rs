//! Request-level entry point
//!
//! A [`Router`] owns the shared, read-only pieces (tile store, search
//! configuration, costing factory). Every request gets its own tile reader,
//! costing instance and algorithm state, so requests can run in parallel.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::{EngineConfig, SearchConfig};
use crate::cost::{create_costing, DynamicCost, TravelMode};
use crate::error::RouteError;
use crate::graph_id::GraphId;
use crate::search::{create_algorithm, Algorithm, Observer, PathLocation, PathResult};
use crate::store::{DirectoryTileStore, GraphReader, TileStore};

pub type CostingFactory = Arc<dyn Fn(TravelMode) -> Arc<dyn DynamicCost> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: PathLocation,
    pub destination: PathLocation,
    /// Falls back to the configured mode
    #[serde(default)]
    pub mode: Option<TravelMode>,
    #[serde(default)]
    pub algorithm: Option<Algorithm>,
}

impl RouteRequest {
    pub fn new(origin: PathLocation, destination: PathLocation) -> Self {
        Self {
            origin,
            destination,
            mode: None,
            algorithm: None,
        }
    }

    pub fn with_mode(mut self, mode: TravelMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }
}

pub struct Router {
    store: Arc<dyn TileStore>,
    config: SearchConfig,
    costing: CostingFactory,
}

impl Router {
    pub fn new(store: Arc<dyn TileStore>, config: SearchConfig) -> Self {
        Self {
            store,
            config,
            costing: Arc::new(create_costing),
        }
    }

    /// Router over the configured tile directory
    pub fn from_config(config: &EngineConfig) -> Self {
        let store = DirectoryTileStore::new(&config.store.tile_dir, config.store.cache_capacity);
        Self::new(Arc::new(store), config.search.clone())
    }

    /// Replaces the per-mode costing policies
    pub fn with_costing(mut self, costing: CostingFactory) -> Self {
        self.costing = costing;
        self
    }

    pub fn store(&self) -> &dyn TileStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Endpoint at `percent_along` of `edge`
    pub fn locate(&self, edge: GraphId, percent_along: f32) -> Result<PathLocation, RouteError> {
        let mut reader = GraphReader::new(self.store.as_ref());
        PathLocation::on_edge(&mut reader, edge, percent_along)
    }

    pub fn route(&self, request: &RouteRequest) -> Result<PathResult, RouteError> {
        self.run(request, None)
    }

    /// Like [`Router::route`], reporting every label event to `observer`
    pub fn route_observed(
        &self,
        request: &RouteRequest,
        observer: Observer,
    ) -> Result<PathResult, RouteError> {
        self.run(request, Some(observer))
    }

    /// Independent requests in parallel; results keep the request order
    pub fn route_many(&self, requests: &[RouteRequest]) -> Vec<Result<PathResult, RouteError>> {
        requests.par_iter().map(|request| self.route(request)).collect()
    }

    fn run(&self, request: &RouteRequest, observer: Option<Observer>) -> Result<PathResult, RouteError> {
        let mode = request.mode.unwrap_or(self.config.mode);
        let algorithm = request.algorithm.unwrap_or(self.config.algorithm);
        let costing = (self.costing)(mode);
        let mut search = create_algorithm(algorithm, self.config.options());
        if let Some(observer) = observer {
            search.set_observer(observer);
        }
        let mut reader = GraphReader::new(self.store.as_ref());
        let result = search.get_best_path(
            &request.origin,
            &request.destination,
            &mut reader,
            costing.as_ref(),
        );
        match &result {
            Ok(path) => debug!(
                %mode,
                %algorithm,
                edges = path.segments.len(),
                cost = path.cost.cost,
                tiles = reader.tiles_seen(),
                "route"
            ),
            Err(e) => debug!(%mode, %algorithm, error = %e, tiles = reader.tiles_seen(), "route failed"),
        }
        result
    }
}
