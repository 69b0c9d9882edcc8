//! On-disk tile format

pub mod crc;
pub mod tile_file;

pub use tile_file::{TileFile, TILE_EXTENSION};
