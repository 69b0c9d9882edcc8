use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::trace;

use super::TileStore;
use crate::error::Result;
use crate::graph_id::GraphId;
use crate::tile::{DirectedEdge, GraphTile};

/// Per-search view of a [`TileStore`].
///
/// Remembers every tile (and every miss) seen during one search so the shared
/// store is asked at most once per tile.
pub struct GraphReader<'a> {
    store: &'a dyn TileStore,
    tiles: FxHashMap<GraphId, Option<Arc<GraphTile>>>,
}

impl<'a> GraphReader<'a> {
    pub fn new(store: &'a dyn TileStore) -> Self {
        Self {
            store,
            tiles: FxHashMap::default(),
        }
    }

    /// Tile containing `id`, `None` if the store has no such tile
    pub fn tile(&mut self, id: GraphId) -> Result<Option<Arc<GraphTile>>> {
        let base = id.tile_base();
        if let Some(tile) = self.tiles.get(&base) {
            return Ok(tile.clone());
        }
        let tile = self.store.fetch(base)?;
        if tile.is_none() {
            trace!(tile = %base, "missing tile, pruning");
        }
        self.tiles.insert(base, tile.clone());
        Ok(tile)
    }

    /// Id of the edge running opposite to `edge`, together with its tile.
    ///
    /// `tile` must be the tile holding `edge`. The opposing edge starts at
    /// `edge.end_node`, so it lives in the end node's tile.
    pub fn opposing_edge(
        &mut self,
        tile: &Arc<GraphTile>,
        edge: &DirectedEdge,
    ) -> Result<Option<(GraphId, Arc<GraphTile>)>> {
        let end_tile = if edge.end_node.same_tile(tile.id()) {
            Arc::clone(tile)
        } else {
            match self.tile(edge.end_node)? {
                Some(t) => t,
                None => return Ok(None),
            }
        };
        let opp_id = end_tile.edge_id_at(edge.end_node, edge.opp_local_idx)?;
        Ok(Some((opp_id, end_tile)))
    }

    /// Start junction of `edge`: the end node of its opposing edge
    pub fn begin_node(
        &mut self,
        tile: &Arc<GraphTile>,
        edge: &DirectedEdge,
    ) -> Result<Option<GraphId>> {
        match self.opposing_edge(tile, edge)? {
            Some((opp_id, opp_tile)) => Ok(Some(opp_tile.edge(opp_id)?.end_node)),
            None => Ok(None),
        }
    }

    pub fn tiles_seen(&self) -> usize {
        self.tiles.len()
    }
}
