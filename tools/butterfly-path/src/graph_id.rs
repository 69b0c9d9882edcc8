//! Universal graph addressing
//!
//! A [`GraphId`] packs `{level, tile, index}` into one `u64`:
//!
//! ```text
//!  63            36 35                         4 3     0
//! +----------------+----------------------------+-------+
//! |  index (28 b)  |        tile (32 b)         | level |
//! +----------------+----------------------------+-------+
//! ```
//!
//! The index is only meaningful relative to its `(level, tile)` pair.
//! Junctions, directed edges and whole tiles ("base" ids, index zeroed) are all
//! addressed this way. Equality is bitwise.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const LEVEL_BITS: u32 = 4;
const TILE_BITS: u32 = 32;
const INDEX_BITS: u32 = 28;

const LEVEL_SHIFT: u32 = 0;
const TILE_SHIFT: u32 = LEVEL_BITS;
const INDEX_SHIFT: u32 = LEVEL_BITS + TILE_BITS;

const LEVEL_MASK: u64 = (1 << LEVEL_BITS) - 1;
const TILE_MASK: u64 = (1 << TILE_BITS) - 1;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Highest addressable hierarchy level.
pub const MAX_LEVEL: u8 = LEVEL_MASK as u8;

/// Highest usable local index. All-ones is reserved for [`GraphId::INVALID`].
pub const MAX_INDEX: u32 = (INDEX_MASK - 1) as u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphIdError {
    #[error("level {0} exceeds the maximum of {MAX_LEVEL}")]
    Level(u32),
    #[error("index {0} exceeds the maximum of {MAX_INDEX}")]
    Index(u64),
    #[error("cannot parse graph id '{0}' (expected level/tile/index)")]
    Parse(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(u64);

impl GraphId {
    pub const INVALID: GraphId = GraphId(u64::MAX);

    pub fn new(level: u8, tile: u32, index: u32) -> Result<Self, GraphIdError> {
        if level > MAX_LEVEL {
            return Err(GraphIdError::Level(level as u32));
        }
        if index > MAX_INDEX {
            return Err(GraphIdError::Index(index as u64));
        }
        Ok(Self::pack(level, tile, index))
    }

    /// Base id naming a whole tile.
    pub fn tile_id(level: u8, tile: u32) -> Result<Self, GraphIdError> {
        Self::new(level, tile, 0)
    }

    #[inline(always)]
    const fn pack(level: u8, tile: u32, index: u32) -> Self {
        GraphId(
            ((level as u64 & LEVEL_MASK) << LEVEL_SHIFT)
                | ((tile as u64 & TILE_MASK) << TILE_SHIFT)
                | ((index as u64 & INDEX_MASK) << INDEX_SHIFT),
        )
    }

    pub const fn from_raw(value: u64) -> Self {
        GraphId(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub const fn level(self) -> u8 {
        ((self.0 >> LEVEL_SHIFT) & LEVEL_MASK) as u8
    }

    #[inline(always)]
    pub const fn tile(self) -> u32 {
        ((self.0 >> TILE_SHIFT) & TILE_MASK) as u32
    }

    #[inline(always)]
    pub const fn index(self) -> u32 {
        ((self.0 >> INDEX_SHIFT) & INDEX_MASK) as u32
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }

    /// Strip the local index, leaving the id of the enclosing tile.
    #[inline(always)]
    pub const fn tile_base(self) -> Self {
        GraphId(self.0 & !(INDEX_MASK << INDEX_SHIFT))
    }

    /// Same tile, different local index.
    pub fn with_index(self, index: u32) -> Result<Self, GraphIdError> {
        Self::new(self.level(), self.tile(), index)
    }

    /// Index taken from a trusted array position; bits beyond the index width are dropped.
    #[inline(always)]
    pub(crate) const fn with_index_unchecked(self, index: u32) -> Self {
        GraphId(self.tile_base().0 | ((index as u64 & INDEX_MASK) << INDEX_SHIFT))
    }

    pub fn same_tile(self, other: GraphId) -> bool {
        self.tile_base() == other.tile_base()
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}/{}/{}", self.level(), self.tile(), self.index())
        } else {
            write!(f, "invalid")
        }
    }
}

impl fmt::Debug for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphId({self})")
    }
}

impl FromStr for GraphId {
    type Err = GraphIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || GraphIdError::Parse(s.to_string());
        let mut parts = s.trim().split('/');
        let (Some(level), Some(tile), Some(index), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(parse_err());
        };
        let level: u32 = level.parse().map_err(|_| parse_err())?;
        let tile: u32 = tile.parse().map_err(|_| parse_err())?;
        let index: u64 = index.parse().map_err(|_| parse_err())?;
        if level > MAX_LEVEL as u32 {
            return Err(GraphIdError::Level(level));
        }
        if index > MAX_INDEX as u64 {
            return Err(GraphIdError::Index(index));
        }
        Self::new(level as u8, tile, index as u32)
    }
}
