//! butterfly-path: shortest-path search over a hierarchical, tiled road graph
//!
//! The graph is cut into immutable tiles per hierarchy level, addressed by
//! packed [`GraphId`]s and served by a [`TileStore`]. Searches (Dijkstra,
//! A*, bidirectional A*) run over directed edges with a pluggable
//! [`DynamicCost`] policy and keep all bookkeeping per invocation, so any
//! number of searches can share one store.

pub mod builder;
pub mod cli;
pub mod config;
pub mod cost;
pub mod error;
pub mod formats;
pub mod geo;
pub mod graph_id;
pub mod hierarchy;
pub mod logging;
pub mod router;
pub mod search;
pub mod store;
pub mod tile;

pub use config::{ConfigError, EngineConfig};
pub use cost::{create_costing, Cost, DynamicCost, ModeCost, TravelMode};
pub use error::{RouteError, StoreError};
pub use graph_id::{GraphId, GraphIdError};
pub use hierarchy::TileHierarchy;
pub use router::{RouteRequest, Router};
pub use search::{
    create_algorithm, AStar, Algorithm, Bidirectional, PathAlgorithm, PathEdge, PathLocation,
    PathResult, PathSegment, SearchOptions,
};
pub use store::{DirectoryTileStore, GraphReader, MemoryTileStore, TileStore};
pub use tile::GraphTile;
