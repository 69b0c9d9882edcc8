use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::TileStore;
use crate::error::Result;
use crate::graph_id::GraphId;
use crate::tile::GraphTile;

/// Tiles held entirely in memory; used for in-process graphs and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryTileStore {
    tiles: FxHashMap<GraphId, Arc<GraphTile>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any tile with the same base id
    pub fn insert(&mut self, tile: GraphTile) -> Option<Arc<GraphTile>> {
        self.tiles.insert(tile.id().tile_base(), Arc::new(tile))
    }

    pub fn remove(&mut self, base: GraphId) -> Option<Arc<GraphTile>> {
        self.tiles.remove(&base.tile_base())
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tile ids in ascending order
    pub fn tile_ids(&self) -> Vec<GraphId> {
        let mut ids: Vec<GraphId> = self.tiles.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Arc<GraphTile>> {
        self.tiles.values()
    }
}

impl FromIterator<GraphTile> for MemoryTileStore {
    fn from_iter<I: IntoIterator<Item = GraphTile>>(iter: I) -> Self {
        let mut store = Self::new();
        for tile in iter {
            store.insert(tile);
        }
        store
    }
}

impl TileStore for MemoryTileStore {
    fn fetch(&self, id: GraphId) -> Result<Option<Arc<GraphTile>>> {
        Ok(self.tiles.get(&id.tile_base()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileHeader;

    fn empty_tile(level: u8, tile: u32) -> GraphTile {
        GraphTile {
            header: TileHeader {
                graph_id: GraphId::tile_id(level, tile).unwrap(),
                node_count: 0,
                edge_count: 0,
                transition_count: 0,
                edge_info_count: 0,
            },
            nodes: vec![],
            edges: vec![],
            transitions: vec![],
            edge_info: vec![],
        }
    }

    #[test]
    fn test_fetch_by_any_id_in_tile() {
        let store: MemoryTileStore = vec![empty_tile(2, 5), empty_tile(0, 1)].into_iter().collect();
        assert_eq!(store.len(), 2);
        let hit = store.fetch(GraphId::new(2, 5, 99).unwrap()).unwrap();
        assert_eq!(hit.unwrap().id(), GraphId::tile_id(2, 5).unwrap());
        assert!(store.fetch(GraphId::tile_id(2, 6).unwrap()).unwrap().is_none());
        assert_eq!(
            store.tile_ids(),
            vec![GraphId::tile_id(0, 1).unwrap(), GraphId::tile_id(2, 5).unwrap()]
        );
    }

    #[test]
    fn test_remove() {
        let mut store = MemoryTileStore::new();
        store.insert(empty_tile(1, 1));
        assert!(store.remove(GraphId::new(1, 1, 3).unwrap()).is_some());
        assert!(store.is_empty());
    }
}
