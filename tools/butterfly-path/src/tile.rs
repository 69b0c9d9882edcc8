//! Graph tile: the immutable, independently loadable unit of the road graph
//!
//! A tile holds the junctions (`NodeInfo`) and directed edges of one
//! `(level, tile)` pair. A node's outgoing edges occupy the contiguous range
//! `edge_index .. edge_index + edge_count` of the tile's edge array, and its
//! level transitions the range `transition_index .. transition_index + transition_count`.
//! Name and shape are stored once per physical road in `EdgeInfo` and shared
//! by both directed edges.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph_id::GraphId;

/// Access bits shared by nodes and edges
pub mod access {
    pub const AUTO: u16 = 1 << 0;
    pub const BICYCLE: u16 = 1 << 1;
    pub const PEDESTRIAN: u16 = 1 << 2;
    pub const BUS: u16 = 1 << 3;
    pub const ALL: u16 = AUTO | BICYCLE | PEDESTRIAN | BUS;
}

/// Edge feature flags
pub mod flags {
    pub const TOLL: u8 = 1 << 0;
    pub const TUNNEL: u8 = 1 << 1;
    pub const BRIDGE: u8 = 1 << 2;
    pub const ROUNDABOUT: u8 = 1 << 3;
    pub const FERRY: u8 = 1 << 4;
}

/// Road importance, most important first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoadClass {
    Motorway = 0,
    Trunk = 1,
    Primary = 2,
    Secondary = 3,
    Tertiary = 4,
    Unclassified = 5,
    Residential = 6,
    ServiceOther = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Use {
    Road,
    Ramp,
    LivingStreet,
    Cycleway,
    Footway,
    Track,
    Ferry,
    Rail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Surface {
    Paved,
    Compacted,
    Gravel,
    Dirt,
    Impassable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileHeader {
    /// Base id of this tile (index 0)
    pub graph_id: GraphId,
    pub node_count: u32,
    pub edge_count: u32,
    pub transition_count: u32,
    pub edge_info_count: u32,
}

/// Junction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub lat: f64,
    pub lon: f64,
    /// First outgoing edge within the tile
    pub edge_index: u32,
    pub edge_count: u32,
    /// First level transition within the tile
    pub transition_index: u32,
    pub transition_count: u32,
    pub access: u16,
    pub traffic_signal: bool,
}

impl NodeInfo {
    /// `None` when the stored index and count overflow
    pub fn edge_range(&self) -> Option<std::ops::Range<u32>> {
        let end = self.edge_index.checked_add(self.edge_count)?;
        Some(self.edge_index..end)
    }

    pub fn transition_range(&self) -> Option<std::ops::Range<u32>> {
        let end = self.transition_index.checked_add(self.transition_count)?;
        Some(self.transition_index..end)
    }
}

/// Same-location link to this junction's representation on an adjacent level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTransition {
    pub end_node: GraphId,
    /// Towards a coarser level (smaller level number)
    pub up: bool,
}

/// One-way traversable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectedEdge {
    pub end_node: GraphId,
    pub length_m: f32,
    /// Access allowed along this direction
    pub forward_access: u16,
    /// Access allowed along the opposing direction
    pub reverse_access: u16,
    pub class: RoadClass,
    pub road_use: Use,
    pub surface: Surface,
    /// Posted or inferred speed; 0 lets the costing pick a class default
    pub speed_kph: u8,
    pub flags: u8,
    /// Index of this edge among its start node's outgoing edges
    pub local_edge_idx: u8,
    /// Index of the opposing edge among the end node's outgoing edges
    pub opp_local_idx: u8,
    /// Simple turn restrictions: bit `i` forbids continuing onto the end
    /// node's outgoing edge with `local_edge_idx == i`
    pub restrictions: u8,
    pub edge_info_offset: u32,
}

impl DirectedEdge {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn is_toll(&self) -> bool {
        self.has_flag(flags::TOLL)
    }

    pub fn is_tunnel(&self) -> bool {
        self.has_flag(flags::TUNNEL)
    }

    pub fn is_bridge(&self) -> bool {
        self.has_flag(flags::BRIDGE)
    }

    pub fn is_roundabout(&self) -> bool {
        self.has_flag(flags::ROUNDABOUT)
    }

    /// Whether turning from this edge onto the end node's `local_idx`-th edge is forbidden
    pub fn restricts(&self, local_idx: u8) -> bool {
        local_idx < 8 && self.restrictions & (1 << local_idx) != 0
    }
}

/// Shared bidirectional metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeInfo {
    pub name: Option<String>,
    /// (lat, lon) polyline in the forward direction of the first stored edge
    pub shape: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{id} does not belong to tile {tile}")]
    MismatchedBase { id: GraphId, tile: GraphId },
    #[error("{kind} index {index} out of bounds ({count} in tile {tile})")]
    OutOfBounds {
        kind: &'static str,
        index: u32,
        count: u32,
        tile: GraphId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTile {
    pub header: TileHeader,
    pub nodes: Vec<NodeInfo>,
    pub edges: Vec<DirectedEdge>,
    pub transitions: Vec<NodeTransition>,
    pub edge_info: Vec<EdgeInfo>,
}

impl GraphTile {
    pub fn id(&self) -> GraphId {
        self.header.graph_id
    }

    fn check_base(&self, id: GraphId) -> Result<(), LookupError> {
        if id.tile_base() != self.header.graph_id {
            return Err(LookupError::MismatchedBase {
                id,
                tile: self.header.graph_id,
            });
        }
        Ok(())
    }

    fn bounded<'a, T>(
        &self,
        items: &'a [T],
        kind: &'static str,
        index: u32,
    ) -> Result<&'a T, LookupError> {
        items.get(index as usize).ok_or(LookupError::OutOfBounds {
            kind,
            index,
            count: items.len() as u32,
            tile: self.header.graph_id,
        })
    }

    pub fn node(&self, id: GraphId) -> Result<&NodeInfo, LookupError> {
        self.check_base(id)?;
        self.bounded(&self.nodes, "node", id.index())
    }

    pub fn edge(&self, id: GraphId) -> Result<&DirectedEdge, LookupError> {
        self.check_base(id)?;
        self.bounded(&self.edges, "edge", id.index())
    }

    pub fn edge_info(&self, edge: &DirectedEdge) -> Result<&EdgeInfo, LookupError> {
        self.bounded(&self.edge_info, "edge info", edge.edge_info_offset)
    }

    /// Outgoing edges of a node, paired with their graph ids
    pub fn outgoing_edges<'a>(
        &'a self,
        node: &NodeInfo,
    ) -> Result<impl Iterator<Item = (GraphId, &'a DirectedEdge)> + 'a, LookupError> {
        let out_of_bounds = |index: u32| LookupError::OutOfBounds {
            kind: "edge",
            index,
            count: self.edges.len() as u32,
            tile: self.header.graph_id,
        };
        let range = node.edge_range().ok_or(out_of_bounds(u32::MAX))?;
        if range.end as usize > self.edges.len() {
            return Err(out_of_bounds(range.end.saturating_sub(1)));
        }
        let base = self.header.graph_id;
        Ok(range.map(move |i| (base.with_index_unchecked(i), &self.edges[i as usize])))
    }

    pub fn node_transitions(&self, node: &NodeInfo) -> Result<&[NodeTransition], LookupError> {
        let out_of_bounds = |index: u32| LookupError::OutOfBounds {
            kind: "transition",
            index,
            count: self.transitions.len() as u32,
            tile: self.header.graph_id,
        };
        let range = node.transition_range().ok_or(out_of_bounds(u32::MAX))?;
        self.transitions
            .get(range.start as usize..range.end as usize)
            .ok_or(out_of_bounds(range.end.saturating_sub(1)))
    }

    /// Id of the edge at `local_idx` among the node's outgoing edges, if the node is in this tile
    pub fn edge_id_at(&self, node_id: GraphId, local_idx: u8) -> Result<GraphId, LookupError> {
        let node = self.node(node_id)?;
        if local_idx as u32 >= node.edge_count {
            return Err(LookupError::OutOfBounds {
                kind: "local edge",
                index: local_idx as u32,
                count: node.edge_count,
                tile: self.header.graph_id,
            });
        }
        let index = node.edge_index + local_idx as u32;
        self.bounded(&self.edges, "edge", index)?;
        Ok(self.header.graph_id.with_index_unchecked(index))
    }

    /// Checks the header counts against the arrays and every internal range.
    pub fn validate(&self) -> Result<(), LookupError> {
        let counts = [
            ("node", self.header.node_count, self.nodes.len()),
            ("edge", self.header.edge_count, self.edges.len()),
            ("transition", self.header.transition_count, self.transitions.len()),
            ("edge info", self.header.edge_info_count, self.edge_info.len()),
        ];
        for (kind, declared, actual) in counts {
            if declared as usize != actual {
                return Err(LookupError::OutOfBounds {
                    kind,
                    index: declared,
                    count: actual as u32,
                    tile: self.header.graph_id,
                });
            }
        }
        for node in &self.nodes {
            self.outgoing_edges(node)?;
            self.node_transitions(node)?;
        }
        for edge in &self.edges {
            self.edge_info(edge)?;
        }
        Ok(())
    }
}
