//! Error types for butterfly-path
//!
//! Missing tiles and refused moves are not errors: the search prunes them.
//! What surfaces here is either a store fault (the graph data cannot be
//! trusted) or a search outcome the caller has to act on.

use std::time::Duration;
use thiserror::Error;

use crate::graph_id::{GraphId, GraphIdError};
use crate::tile::LookupError;

/// Store faults distinct from "tile not found"
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt tile {tile}: {reason}")]
    Corrupt { tile: GraphId, reason: String },

    #[error("cannot decode tile body: {0}")]
    Decode(#[from] bincode::Error),

    #[error("invalid graph id: {0}")]
    InvalidGraphId(#[from] GraphIdError),
}

impl StoreError {
    pub fn corrupt(tile: GraphId, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            tile: tile.tile_base(),
            reason: reason.into(),
        }
    }
}

impl From<LookupError> for StoreError {
    fn from(err: LookupError) -> Self {
        let tile = match &err {
            LookupError::MismatchedBase { tile, .. } => *tile,
            LookupError::OutOfBounds { tile, .. } => *tile,
        };
        StoreError::corrupt(tile, err.to_string())
    }
}

/// Why a search produced no path
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no path between origin and destination")]
    NoPath,

    #[error("search budget exhausted after {expansions} expansions ({elapsed:?})")]
    Timeout { expansions: u64, elapsed: Duration },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("tile store failure: {0}")]
    Store(#[from] StoreError),
}

impl From<LookupError> for RouteError {
    fn from(err: LookupError) -> Self {
        RouteError::Store(err.into())
    }
}

impl RouteError {
    /// Caller may retry with relaxed input (wider snapping radius, bigger budget)
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouteError::NoPath | RouteError::Timeout { .. })
    }
}

/// Convenience result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
