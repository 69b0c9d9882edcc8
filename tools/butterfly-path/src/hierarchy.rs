//! Tile hierarchy: detail levels and their geographic tiling
//!
//! Levels are ordered coarsest-first: level 0 only carries the most important
//! roads and uses the largest tiles. Every level tiles the whole world with a
//! regular lat/lon grid; a tile id is `row * columns + column`.

use serde::{Deserialize, Serialize};

use crate::graph_id::GraphId;
use crate::tile::RoadClass;

/// Geographic bounds of a tile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl TileBounds {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Regular world grid used by one hierarchy level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tiles {
    /// Tile size in degrees (square tiles)
    pub tile_size: f64,
    pub columns: u32,
    pub rows: u32,
}

impl Tiles {
    pub fn new(tile_size: f64) -> Self {
        let columns = (360.0 / tile_size).ceil() as u32;
        let rows = (180.0 / tile_size).ceil() as u32;
        Self {
            tile_size,
            columns,
            rows,
        }
    }

    /// Convert coordinates to tile id
    pub fn tile_id(&self, lat: f64, lon: f64) -> Option<u32> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }

        let col = ((lon + 180.0) / self.tile_size) as u32;
        let row = ((lat + 90.0) / self.tile_size) as u32;

        // Clamp the max edges onto the last row/column
        let col = col.min(self.columns - 1);
        let row = row.min(self.rows - 1);

        Some(row * self.columns + col)
    }

    pub fn row_col(&self, tile: u32) -> (u32, u32) {
        (tile / self.columns, tile % self.columns)
    }

    pub fn tile_count(&self) -> u64 {
        self.columns as u64 * self.rows as u64
    }

    /// Get bounds for a specific tile
    pub fn bounds(&self, tile: u32) -> TileBounds {
        let (row, col) = self.row_col(tile);
        let min_lon = -180.0 + col as f64 * self.tile_size;
        let min_lat = -90.0 + row as f64 * self.tile_size;
        TileBounds::new(
            min_lat,
            min_lon,
            (min_lat + self.tile_size).min(90.0),
            (min_lon + self.tile_size).min(180.0),
        )
    }

    /// Get all adjacent tiles (up to 8 neighbors). Longitude wraps, latitude does not.
    pub fn adjacent_tiles(&self, tile: u32) -> Vec<u32> {
        let (row, col) = self.row_col(tile);
        let mut neighbors = Vec::with_capacity(8);

        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let r = row as i64 + dr;
                if r < 0 || r >= self.rows as i64 {
                    continue;
                }
                let c = (col as i64 + dc).rem_euclid(self.columns as i64);
                let id = r as u32 * self.columns + c as u32;
                if id != tile && !neighbors.contains(&id) {
                    neighbors.push(id);
                }
            }
        }

        neighbors
    }
}

/// One level of the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLevel {
    pub level: u8,
    pub name: String,
    /// Least important road class carried on this level
    pub min_class: RoadClass,
    pub tiles: Tiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileHierarchy {
    levels: Vec<TileLevel>,
}

impl TileHierarchy {
    pub const HIGHWAY: u8 = 0;
    pub const ARTERIAL: u8 = 1;
    pub const LOCAL: u8 = 2;
    pub const TRANSIT: u8 = 3;

    /// Highway 4°, arterial 1°, local 0.25°, transit 0.25°
    pub fn standard() -> Self {
        Self {
            levels: vec![
                TileLevel {
                    level: Self::HIGHWAY,
                    name: "highway".to_string(),
                    min_class: RoadClass::Primary,
                    tiles: Tiles::new(4.0),
                },
                TileLevel {
                    level: Self::ARTERIAL,
                    name: "arterial".to_string(),
                    min_class: RoadClass::Tertiary,
                    tiles: Tiles::new(1.0),
                },
                TileLevel {
                    level: Self::LOCAL,
                    name: "local".to_string(),
                    min_class: RoadClass::ServiceOther,
                    tiles: Tiles::new(0.25),
                },
                TileLevel {
                    level: Self::TRANSIT,
                    name: "transit".to_string(),
                    min_class: RoadClass::ServiceOther,
                    tiles: Tiles::new(0.25),
                },
            ],
        }
    }

    pub fn levels(&self) -> &[TileLevel] {
        &self.levels
    }

    pub fn level(&self, level: u8) -> Option<&TileLevel> {
        self.levels.iter().find(|l| l.level == level)
    }

    /// Coarsest level whose importance threshold admits `class`.
    /// The transit level is never chosen for roads.
    pub fn level_for_class(&self, class: RoadClass) -> u8 {
        self.levels
            .iter()
            .filter(|l| l.level != Self::TRANSIT)
            .find(|l| class <= l.min_class)
            .map(|l| l.level)
            .unwrap_or(Self::LOCAL)
    }

    /// Base tile id holding a location on a level
    pub fn tile_for(&self, level: u8, lat: f64, lon: f64) -> Option<GraphId> {
        let tile = self.level(level)?.tiles.tile_id(lat, lon)?;
        GraphId::tile_id(level, tile).ok()
    }

    pub fn bounds(&self, base: GraphId) -> Option<TileBounds> {
        self.level(base.level()).map(|l| l.tiles.bounds(base.tile()))
    }

    /// Transitions only connect neighbouring road levels
    pub fn adjacent_levels(&self, a: u8, b: u8) -> bool {
        a.abs_diff(b) == 1 && self.level(a).is_some() && self.level(b).is_some()
    }
}

impl Default for TileHierarchy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_levels_coarsen_upwards() {
        let h = TileHierarchy::standard();
        let sizes: Vec<f64> = h.levels().iter().map(|l| l.tiles.tile_size).collect();
        assert_eq!(sizes, vec![4.0, 1.0, 0.25, 0.25]);
        assert_eq!(h.level(1).unwrap().name, "arterial");
        assert!(h.level(7).is_none());
    }

    #[test]
    fn test_tile_id_roundtrip_bounds() {
        let tiles = Tiles::new(0.25);
        // Brussels
        let id = tiles.tile_id(50.8503, 4.3517).unwrap();
        let bounds = tiles.bounds(id);
        assert!(bounds.contains(50.8503, 4.3517));
        assert!(bounds.min_lat < bounds.max_lat);
        assert!((bounds.max_lon - bounds.min_lon - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_tile_id_edges() {
        let tiles = Tiles::new(1.0);
        assert_eq!(tiles.tile_id(-90.0, -180.0), Some(0));
        let last = tiles.tile_id(90.0, 180.0).unwrap();
        assert_eq!(last as u64, tiles.tile_count() - 1);
        assert_eq!(tiles.tile_id(91.0, 0.0), None);
    }

    #[test]
    fn test_brussels_antwerp_in_different_local_tiles() {
        let h = TileHierarchy::standard();
        let brussels = h.tile_for(TileHierarchy::LOCAL, 50.8503, 4.3517).unwrap();
        let antwerp = h.tile_for(TileHierarchy::LOCAL, 51.2194, 4.4025).unwrap();
        assert_ne!(brussels, antwerp);
        // ... but share a highway tile
        let hb = h.tile_for(TileHierarchy::HIGHWAY, 50.8503, 4.3517).unwrap();
        let ha = h.tile_for(TileHierarchy::HIGHWAY, 51.2194, 4.4025).unwrap();
        assert_eq!(hb, ha);
        assert_eq!(hb.index(), 0);
    }

    #[test]
    fn test_adjacent_tiles() {
        let tiles = Tiles::new(1.0);
        let tile = tiles.tile_id(10.5, 10.5).unwrap();
        let neighbors = tiles.adjacent_tiles(tile);
        assert_eq!(neighbors.len(), 8);

        // Bottom row has no southern neighbours
        let south = tiles.tile_id(-89.5, 10.5).unwrap();
        assert_eq!(tiles.adjacent_tiles(south).len(), 5);

        // Longitude wraps around the antimeridian
        let west = tiles.tile_id(0.5, -179.5).unwrap();
        let east = tiles.tile_id(0.5, 179.5).unwrap();
        assert!(tiles.adjacent_tiles(west).contains(&east));
    }

    #[test]
    fn test_level_for_class() {
        let h = TileHierarchy::standard();
        assert_eq!(h.level_for_class(RoadClass::Motorway), 0);
        assert_eq!(h.level_for_class(RoadClass::Primary), 0);
        assert_eq!(h.level_for_class(RoadClass::Secondary), 1);
        assert_eq!(h.level_for_class(RoadClass::Residential), 2);
    }

    #[test]
    fn test_adjacent_levels() {
        let h = TileHierarchy::standard();
        assert!(h.adjacent_levels(0, 1));
        assert!(h.adjacent_levels(2, 1));
        assert!(!h.adjacent_levels(0, 2));
        assert!(!h.adjacent_levels(1, 1));
        assert!(!h.adjacent_levels(3, 4));
    }
}
