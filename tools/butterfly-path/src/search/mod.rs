//! Shortest-path search over the tiled graph
//!
//! Labels cover directed edges. A search seeds its frontier from the
//! origin candidates, pops labels in cost (or cost plus heuristic) order and
//! expands the junction each label reaches: its outgoing edges and its level
//! transitions. [`AStar`] runs one direction; [`Bidirectional`] interleaves a
//! forward and a reverse search and stops once neither frontier can improve
//! on the best meeting found.

mod astar;
mod bidirectional;
mod expand;
mod frontier;
mod heuristic;
mod labels;
mod limits;
mod location;

pub use astar::AStar;
pub use bidirectional::Bidirectional;
pub use frontier::{new_frontier, BucketQueue, Frontier, FrontierKind, HeapQueue};
pub use heuristic::Heuristic;
pub use labels::{EdgeLabel, LabelKind, LabelSet, Status, NO_LABEL, NO_LOCAL};
pub use limits::{HierarchyLimits, SearchLimits};
pub use location::{PathEdge, PathLocation, Side};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cost::{Cost, DynamicCost};
use crate::error::RouteError;
use crate::graph_id::GraphId;
use crate::store::GraphReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// First label for an edge (or a seed) entered the frontier
    Reached,
    /// A frontier label got cheaper
    Relaxed,
    /// Label popped; its cost is final
    Settled,
}

/// What an [`Observer`] sees of the search
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpansionEvent {
    pub kind: EventKind,
    pub direction: Direction,
    /// Edge of the label, or the junction reached for transitions
    pub id: GraphId,
    pub transition: bool,
    /// Seeds cover part of an edge and may be reached more than once
    pub seed: bool,
    pub cost: Cost,
}

pub type Observer = Box<dyn FnMut(&ExpansionEvent) + Send>;

/// One edge of a result path, with the traversed fraction of it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub edge_id: GraphId,
    pub begin_pct: f32,
    pub end_pct: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    pub segments: Vec<PathSegment>,
    /// Travel cost between the snapped endpoints, snapping scores excluded
    pub cost: Cost,
    pub expansions: u64,
    pub algorithm: &'static str,
}

impl PathResult {
    pub fn edge_ids(&self) -> Vec<GraphId> {
        self.segments.iter().map(|s| s.edge_id).collect()
    }
}

/// Tuning shared by every algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub limits: SearchLimits,
    /// Indexed by level; missing levels are unlimited
    pub hierarchy: Vec<HierarchyLimits>,
    pub frontier: FrontierKind,
    /// Cost width of one bucket
    pub bucket_size: f32,
    pub bucket_count: usize,
    /// Label capacity kept across searches
    pub max_reserved_labels: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limits: SearchLimits::unlimited(),
            hierarchy: Vec::new(),
            frontier: FrontierKind::Bucket,
            bucket_size: 1.0,
            bucket_count: 20_000,
            max_reserved_labels: 1_000_000,
        }
    }
}

impl SearchOptions {
    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_frontier(mut self, frontier: FrontierKind) -> Self {
        self.frontier = frontier;
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: Vec<HierarchyLimits>) -> Self {
        self.hierarchy = hierarchy;
        self
    }
}

pub trait PathAlgorithm: Send {
    fn name(&self) -> &'static str;

    /// Cheapest path from any origin candidate to any destination candidate
    fn get_best_path(
        &mut self,
        origin: &PathLocation,
        destination: &PathLocation,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
    ) -> Result<PathResult, RouteError>;

    /// Drop per-search state
    fn clear(&mut self);

    fn set_observer(&mut self, observer: Observer);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Dijkstra,
    #[serde(rename = "astar")]
    AStar,
    #[default]
    Bidirectional,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Dijkstra => "dijkstra",
            Algorithm::AStar => "astar",
            Algorithm::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dijkstra" => Ok(Algorithm::Dijkstra),
            "astar" | "a*" => Ok(Algorithm::AStar),
            "bidirectional" | "bidir" => Ok(Algorithm::Bidirectional),
            other => Err(format!(
                "unknown algorithm '{other}' (dijkstra, astar, bidirectional)"
            )),
        }
    }
}

pub fn create_algorithm(algorithm: Algorithm, options: SearchOptions) -> Box<dyn PathAlgorithm> {
    match algorithm {
        Algorithm::Dijkstra => Box::new(AStar::dijkstra(options)),
        Algorithm::AStar => Box::new(AStar::astar(options)),
        Algorithm::Bidirectional => Box::new(Bidirectional::new(options)),
    }
}

/// Segments for a chain of edges; the first starts at `begin_pct`, the last
/// ends at `end_pct`
pub(crate) fn segments_for(edges: &[GraphId], begin_pct: f32, end_pct: f32) -> Vec<PathSegment> {
    let last = edges.len().saturating_sub(1);
    edges
        .iter()
        .enumerate()
        .map(|(i, &edge_id)| PathSegment {
            edge_id,
            begin_pct: if i == 0 { begin_pct } else { 0.0 },
            end_pct: if i == last { end_pct } else { 1.0 },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("A*".parse::<Algorithm>().unwrap(), Algorithm::AStar);
        assert_eq!("bidir".parse::<Algorithm>().unwrap(), Algorithm::Bidirectional);
        assert!("bfs".parse::<Algorithm>().is_err());
        assert_eq!(serde_json::to_string(&Algorithm::AStar).unwrap(), "\"astar\"");
        let parsed: Algorithm = serde_json::from_str("\"dijkstra\"").unwrap();
        assert_eq!(parsed, Algorithm::Dijkstra);
    }

    #[test]
    fn test_factory_names() {
        for alg in [Algorithm::Dijkstra, Algorithm::AStar, Algorithm::Bidirectional] {
            assert_eq!(create_algorithm(alg, SearchOptions::default()).name(), alg.name());
        }
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn test_searches_move_across_threads() {
        assert_send::<AStar>();
        assert_send::<Bidirectional>();
        assert_send::<Box<dyn Frontier>>();
        let search = create_algorithm(Algorithm::Bidirectional, SearchOptions::default());
        let name = std::thread::spawn(move || search.name()).join().unwrap();
        assert_eq!(name, Algorithm::Bidirectional.name());
    }

    #[test]
    fn test_segments_for() {
        let a = GraphId::new(2, 1, 0).unwrap();
        let b = GraphId::new(2, 1, 1).unwrap();
        let segs = segments_for(&[a, b], 0.3, 0.6);
        assert_eq!(segs[0], PathSegment { edge_id: a, begin_pct: 0.3, end_pct: 1.0 });
        assert_eq!(segs[1], PathSegment { edge_id: b, begin_pct: 0.0, end_pct: 0.6 });

        let single = segments_for(&[a], 0.2, 0.7);
        assert_eq!(single, vec![PathSegment { edge_id: a, begin_pct: 0.2, end_pct: 0.7 }]);
    }
}
