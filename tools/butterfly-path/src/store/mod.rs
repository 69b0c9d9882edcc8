//! Tile stores
//!
//! A [`TileStore`] hands out immutable, shared tiles by base id. `Ok(None)` means
//! the tile does not exist and is a normal pruning signal for the search;
//! `Err` means the store cannot be trusted and aborts the search.

mod directory;
mod memory;
mod reader;

pub use directory::{CacheStats, DirectoryTileStore};
pub use memory::MemoryTileStore;
pub use reader::GraphReader;

use std::sync::Arc;

use crate::error::Result;
use crate::graph_id::GraphId;
use crate::tile::GraphTile;

pub trait TileStore: Send + Sync {
    /// Fetch the tile containing `id` (the local index is ignored)
    fn fetch(&self, id: GraphId) -> Result<Option<Arc<GraphTile>>>;
}

impl<T: TileStore + ?Sized> TileStore for Arc<T> {
    fn fetch(&self, id: GraphId) -> Result<Option<Arc<GraphTile>>> {
        (**self).fetch(id)
    }
}
