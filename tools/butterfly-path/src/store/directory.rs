use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::TileStore;
use crate::error::Result;
use crate::formats::TileFile;
use crate::graph_id::GraphId;
use crate::tile::GraphTile;

/// Tiles loaded on demand from `<root>/<level>/<tile>.gph`.
///
/// Decoded tiles are kept in a bounded cache; the oldest entry is evicted
/// first. Readers never hold the lock while decoding.
pub struct DirectoryTileStore {
    root: PathBuf,
    capacity: usize,
    cache: RwLock<TileCache>,
    hits: AtomicU64,
    loads: AtomicU64,
}

#[derive(Default)]
struct TileCache {
    tiles: FxHashMap<GraphId, Arc<GraphTile>>,
    order: VecDeque<GraphId>,
}

impl TileCache {
    fn insert(&mut self, base: GraphId, tile: Arc<GraphTile>, capacity: usize) {
        if capacity == 0 || self.tiles.contains_key(&base) {
            return;
        }
        while self.tiles.len() >= capacity {
            match self.order.pop_front() {
                Some(old) => {
                    self.tiles.remove(&old);
                }
                None => break,
            }
        }
        self.tiles.insert(base, tile);
        self.order.push_back(base);
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: usize,
    pub hits: u64,
    pub loads: u64,
}

impl DirectoryTileStore {
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity,
            cache: RwLock::new(TileCache::default()),
            hits: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached: self.cache.read().tiles.len(),
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        let mut cache = self.cache.write();
        cache.tiles.clear();
        cache.order.clear();
    }
}

impl TileStore for DirectoryTileStore {
    fn fetch(&self, id: GraphId) -> Result<Option<Arc<GraphTile>>> {
        let base = id.tile_base();
        if let Some(tile) = self.cache.read().tiles.get(&base) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(Arc::clone(tile)));
        }

        let tile = match TileFile::read(&self.root, base) {
            Ok(Some(tile)) => Arc::new(tile),
            Ok(None) => {
                debug!(tile = %base, "tile not present");
                return Ok(None);
            }
            Err(err) => {
                warn!(tile = %base, error = %err, "tile load failed");
                return Err(err);
            }
        };
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.cache
            .write()
            .insert(base, Arc::clone(&tile), self.capacity);
        Ok(Some(tile))
    }
}
