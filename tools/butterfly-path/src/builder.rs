//! Graph assembly
//!
//! [`GraphBuilder`] collects junctions, roads, level transitions and turn
//! restrictions and lays them out into tiles: one tile per `(level, grid cell)`,
//! each node's outgoing edges contiguous, every directed edge paired with its
//! opposing edge through `opp_local_idx`. One-way roads still get an opposing
//! edge, with no access, so reverse expansion can always find it.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::formats::TileFile;
use crate::geo::haversine_distance;
use crate::graph_id::GraphId;
use crate::hierarchy::TileHierarchy;
use crate::store::MemoryTileStore;
use crate::tile::{
    access, DirectedEdge, EdgeInfo, GraphTile, NodeInfo, NodeTransition, RoadClass, Surface,
    TileHeader, Use,
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("node {node} at ({lat}, {lon}) has no tile on level {level}")]
    NoTile {
        node: usize,
        level: u8,
        lat: f64,
        lon: f64,
    },
    #[error("road {road} joins level {from} to level {to}")]
    CrossLevelRoad { road: usize, from: u8, to: u8 },
    #[error("transition between nodes {a} and {b} does not join adjacent levels")]
    BadTransition { a: usize, b: usize },
    #[error("node {node} has {count} outgoing edges (max 255)")]
    TooManyEdges { node: usize, count: usize },
    #[error("restriction from edge {from} onto edge {to}: {reason}")]
    BadRestriction {
        from: usize,
        to: usize,
        reason: &'static str,
    },
    #[error("tile {0} exceeds the index range")]
    TileTooLarge(GraphId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeHandle(usize);

/// Attributes of a road added with [`GraphBuilder::add_road`]
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub class: RoadClass,
    pub road_use: Use,
    pub surface: Surface,
    pub speed_kph: u8,
    /// Defaults to the great-circle distance between the end points
    pub length_m: Option<f32>,
    pub flags: u8,
    pub access: u16,
    /// Only the forward direction is traversable
    pub oneway: bool,
    pub name: Option<String>,
}

impl Default for EdgeSpec {
    fn default() -> Self {
        Self {
            class: RoadClass::Residential,
            road_use: Use::Road,
            surface: Surface::Paved,
            speed_kph: 0,
            length_m: None,
            flags: 0,
            access: access::ALL,
            oneway: false,
            name: None,
        }
    }
}

impl EdgeSpec {
    pub fn with_length(mut self, length_m: f32) -> Self {
        self.length_m = Some(length_m);
        self
    }

    pub fn with_class(mut self, class: RoadClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_speed(mut self, speed_kph: u8) -> Self {
        self.speed_kph = speed_kph;
        self
    }

    pub fn with_access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn oneway(mut self) -> Self {
        self.oneway = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

struct PendingNode {
    level: u8,
    lat: f64,
    lon: f64,
    /// Tile the node falls in, if the level covers its position
    tile: Option<GraphId>,
    id: GraphId,
    access: u16,
    traffic_signal: bool,
    /// Outgoing edges in insertion order; position == local_edge_idx
    out: Vec<usize>,
    transitions: Vec<NodeTransition>,
}

struct PendingEdge {
    from: usize,
    to: usize,
    road: usize,
    opposing: usize,
    forward: bool,
    restrictions: u8,
}

struct Road {
    spec: EdgeSpec,
    length_m: f32,
}

#[derive(Default)]
pub struct GraphBuilder {
    hierarchy: TileHierarchy,
    nodes: Vec<PendingNode>,
    edges: Vec<PendingEdge>,
    roads: Vec<Road>,
    /// Next free node index per tile
    tile_fill: FxHashMap<GraphId, u32>,
    transition_pairs: Vec<(usize, usize)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::with_hierarchy(TileHierarchy::standard())
    }

    pub fn with_hierarchy(hierarchy: TileHierarchy) -> Self {
        Self {
            hierarchy,
            ..Default::default()
        }
    }

    pub fn hierarchy(&self) -> &TileHierarchy {
        &self.hierarchy
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn add_node(&mut self, level: u8, lat: f64, lon: f64) -> NodeHandle {
        let tile = self.hierarchy.tile_for(level, lat, lon);
        let id = match tile {
            Some(base) => {
                let fill = self.tile_fill.entry(base).or_insert(0);
                let id = base.with_index(*fill).unwrap_or(GraphId::INVALID);
                *fill = fill.saturating_add(1);
                id
            }
            None => GraphId::INVALID,
        };
        self.nodes.push(PendingNode {
            level,
            lat,
            lon,
            tile,
            id,
            access: access::ALL,
            traffic_signal: false,
            out: Vec::new(),
            transitions: Vec::new(),
        });
        NodeHandle(self.nodes.len() - 1)
    }

    pub fn set_traffic_signal(&mut self, node: NodeHandle) {
        self.nodes[node.0].traffic_signal = true;
    }

    pub fn set_node_access(&mut self, node: NodeHandle, access: u16) {
        self.nodes[node.0].access = access;
    }

    /// Adds both directed edges of a road; returns `(a → b, b → a)`
    pub fn add_road(&mut self, a: NodeHandle, b: NodeHandle, spec: EdgeSpec) -> (EdgeHandle, EdgeHandle) {
        let (na, nb) = (&self.nodes[a.0], &self.nodes[b.0]);
        let length_m = spec
            .length_m
            .unwrap_or_else(|| haversine_distance(na.lat, na.lon, nb.lat, nb.lon) as f32);
        let road = self.roads.len();
        self.roads.push(Road { spec, length_m });

        let fwd = self.edges.len();
        let back = fwd + 1;
        self.edges.push(PendingEdge {
            from: a.0,
            to: b.0,
            road,
            opposing: back,
            forward: true,
            restrictions: 0,
        });
        self.edges.push(PendingEdge {
            from: b.0,
            to: a.0,
            road,
            opposing: fwd,
            forward: false,
            restrictions: 0,
        });
        self.nodes[a.0].out.push(fwd);
        self.nodes[b.0].out.push(back);
        (EdgeHandle(fwd), EdgeHandle(back))
    }

    /// Links the same junction on two adjacent levels (both directions)
    pub fn add_transition(&mut self, a: NodeHandle, b: NodeHandle) {
        self.transition_pairs.push((a.0, b.0));
        let (la, lb) = (self.nodes[a.0].level, self.nodes[b.0].level);
        let (ida, idb) = (self.nodes[a.0].id, self.nodes[b.0].id);
        self.nodes[a.0].transitions.push(NodeTransition {
            end_node: idb,
            up: lb < la,
        });
        self.nodes[b.0].transitions.push(NodeTransition {
            end_node: ida,
            up: la < lb,
        });
    }

    /// Forbids continuing from `from` onto `to` at their shared junction
    pub fn restrict_turn(&mut self, from: EdgeHandle, to: EdgeHandle) -> Result<(), BuildError> {
        let bad = |reason| BuildError::BadRestriction {
            from: from.0,
            to: to.0,
            reason,
        };
        let junction = self.edges[from.0].to;
        if self.edges[to.0].from != junction {
            return Err(bad("edges do not meet"));
        }
        let local = self.nodes[junction]
            .out
            .iter()
            .position(|&e| e == to.0)
            .ok_or(bad("edges do not meet"))?;
        if local >= 8 {
            return Err(bad("target edge index beyond the restriction mask"));
        }
        self.edges[from.0].restrictions |= 1 << local;
        Ok(())
    }

    pub fn node_id(&self, node: NodeHandle) -> GraphId {
        self.nodes[node.0].id
    }

    pub fn edge_id(&self, edge: EdgeHandle) -> GraphId {
        let e = &self.edges[edge.0];
        let start = &self.nodes[e.from];
        let local = start.out.iter().position(|&x| x == edge.0).unwrap_or(0);
        let tile = start.id.tile_base();
        let before: usize = self
            .nodes
            .iter()
            .filter(|n| n.id.tile_base() == tile && n.id.index() < start.id.index())
            .map(|n| n.out.len())
            .sum();
        tile.with_index_unchecked((before + local) as u32)
    }

    fn check(&self) -> Result<(), BuildError> {
        for (i, node) in self.nodes.iter().enumerate() {
            if !node.id.is_valid() {
                if let Some(base) = node.tile {
                    return Err(BuildError::TileTooLarge(base));
                }
                return Err(BuildError::NoTile {
                    node: i,
                    level: node.level,
                    lat: node.lat,
                    lon: node.lon,
                });
            }
            if node.out.len() > u8::MAX as usize {
                return Err(BuildError::TooManyEdges {
                    node: i,
                    count: node.out.len(),
                });
            }
        }
        for edge in self.edges.iter().filter(|e| e.forward) {
            let (from, to) = (self.nodes[edge.from].level, self.nodes[edge.to].level);
            if from != to {
                return Err(BuildError::CrossLevelRoad {
                    road: edge.road,
                    from,
                    to,
                });
            }
        }
        for &(a, b) in &self.transition_pairs {
            if !self
                .hierarchy
                .adjacent_levels(self.nodes[a].level, self.nodes[b].level)
            {
                return Err(BuildError::BadTransition { a, b });
            }
        }
        Ok(())
    }

    /// Lays the graph out into tiles, ordered by base id
    pub fn build(&self) -> Result<Vec<GraphTile>, BuildError> {
        self.check()?;

        let mut by_tile: FxHashMap<GraphId, Vec<usize>> = FxHashMap::default();
        for (i, node) in self.nodes.iter().enumerate() {
            by_tile.entry(node.id.tile_base()).or_default().push(i);
        }
        let mut bases: Vec<GraphId> = by_tile.keys().copied().collect();
        bases.sort();

        let mut tiles = Vec::with_capacity(bases.len());
        for base in bases {
            let mut members = by_tile.remove(&base).unwrap_or_default();
            members.sort_by_key(|&n| self.nodes[n].id.index());
            tiles.push(self.build_tile(base, &members)?);
        }
        info!(
            tiles = tiles.len(),
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            "graph laid out"
        );
        Ok(tiles)
    }

    fn build_tile(&self, base: GraphId, members: &[usize]) -> Result<GraphTile, BuildError> {
        let mut nodes = Vec::with_capacity(members.len());
        let mut edges = Vec::new();
        let mut transitions = Vec::new();
        let mut edge_info = Vec::new();
        let mut info_offsets: FxHashMap<usize, u32> = FxHashMap::default();

        for &n in members {
            let node = &self.nodes[n];
            nodes.push(NodeInfo {
                lat: node.lat,
                lon: node.lon,
                edge_index: edges.len() as u32,
                edge_count: node.out.len() as u32,
                transition_index: transitions.len() as u32,
                transition_count: node.transitions.len() as u32,
                access: node.access,
                traffic_signal: node.traffic_signal,
            });
            transitions.extend_from_slice(&node.transitions);

            for (local, &e) in node.out.iter().enumerate() {
                let edge = &self.edges[e];
                let road = &self.roads[edge.road];
                let opposing = &self.edges[edge.opposing];
                let end = &self.nodes[edge.to];
                let opp_local = end.out.iter().position(|&x| x == edge.opposing).unwrap_or(0);

                let offset = *info_offsets.entry(edge.road).or_insert_with(|| {
                    let (a, b) = if edge.forward {
                        (node, end)
                    } else {
                        (end, node)
                    };
                    edge_info.push(EdgeInfo {
                        name: road.spec.name.clone(),
                        shape: vec![(a.lat, a.lon), (b.lat, b.lon)],
                    });
                    (edge_info.len() - 1) as u32
                });

                let own_access = |e: &PendingEdge| {
                    if e.forward || !road.spec.oneway {
                        road.spec.access
                    } else {
                        0
                    }
                };

                edges.push(DirectedEdge {
                    end_node: end.id,
                    length_m: road.length_m,
                    forward_access: own_access(edge),
                    reverse_access: own_access(opposing),
                    class: road.spec.class,
                    road_use: road.spec.road_use,
                    surface: road.spec.surface,
                    speed_kph: road.spec.speed_kph,
                    flags: road.spec.flags,
                    local_edge_idx: local as u8,
                    opp_local_idx: opp_local as u8,
                    restrictions: edge.restrictions,
                    edge_info_offset: offset,
                });
            }
        }

        if edges.len() > crate::graph_id::MAX_INDEX as usize {
            return Err(BuildError::TileTooLarge(base));
        }

        let tile = GraphTile {
            header: TileHeader {
                graph_id: base,
                node_count: nodes.len() as u32,
                edge_count: edges.len() as u32,
                transition_count: transitions.len() as u32,
                edge_info_count: edge_info.len() as u32,
            },
            nodes,
            edges,
            transitions,
            edge_info,
        };
        debug!(tile = %base, nodes = tile.header.node_count, edges = tile.header.edge_count, "tile built");
        Ok(tile)
    }

    pub fn build_memory(&self) -> Result<MemoryTileStore, BuildError> {
        Ok(self.build()?.into_iter().collect())
    }

    /// Writes every tile under `root`; returns the written paths
    pub fn write_dir(&self, root: &Path) -> Result<Vec<PathBuf>, BuildError> {
        let mut paths = Vec::new();
        for tile in self.build()? {
            paths.push(TileFile::write(root, &tile)?);
        }
        Ok(paths)
    }
}

/// Parameters of [`synthetic_grid`]
#[derive(Debug, Clone)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub origin: (f64, f64),
    /// Distance between neighbouring junctions in degrees
    pub spacing_deg: f64,
    /// Every `arterial_stride`-th row and column is also an arterial road
    pub arterial_stride: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            rows: 20,
            cols: 20,
            origin: (50.80, 4.30),
            spacing_deg: 0.01,
            arterial_stride: 5,
        }
    }
}

/// Two-level street grid: residential roads on the local level, plus a
/// coarser arterial grid on the arterial level linked by transitions
pub fn synthetic_grid(grid: &GridSpec) -> (GraphBuilder, Vec<NodeHandle>) {
    let mut b = GraphBuilder::new();
    let local_level = TileHierarchy::LOCAL;
    let arterial_level = TileHierarchy::ARTERIAL;
    let stride = grid.arterial_stride.max(1);
    let pos = |r: usize, c: usize| {
        (
            grid.origin.0 + r as f64 * grid.spacing_deg,
            grid.origin.1 + c as f64 * grid.spacing_deg,
        )
    };

    let mut local = Vec::with_capacity(grid.rows * grid.cols);
    for r in 0..grid.rows {
        for c in 0..grid.cols {
            let (lat, lon) = pos(r, c);
            local.push(b.add_node(local_level, lat, lon));
        }
    }
    let at = |r: usize, c: usize| r * grid.cols + c;
    for r in 0..grid.rows {
        for c in 0..grid.cols {
            if c + 1 < grid.cols {
                b.add_road(local[at(r, c)], local[at(r, c + 1)], EdgeSpec::default());
            }
            if r + 1 < grid.rows {
                b.add_road(local[at(r, c)], local[at(r + 1, c)], EdgeSpec::default());
            }
        }
    }

    let mut arterial: FxHashMap<(usize, usize), NodeHandle> = FxHashMap::default();
    for r in (0..grid.rows).step_by(stride) {
        for c in (0..grid.cols).step_by(stride) {
            let (lat, lon) = pos(r, c);
            let node = b.add_node(arterial_level, lat, lon);
            b.add_transition(local[at(r, c)], node);
            arterial.insert((r, c), node);
        }
    }
    let spec = EdgeSpec::default().with_class(RoadClass::Secondary);
    for (&(r, c), &node) in &arterial {
        if let Some(&east) = arterial.get(&(r, c + stride)) {
            b.add_road(node, east, spec.clone());
        }
        if let Some(&north) = arterial.get(&(r + stride, c)) {
            b.add_road(node, north, spec.clone());
        }
    }

    (b, local)
}
