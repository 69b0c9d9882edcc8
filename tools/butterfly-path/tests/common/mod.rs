//! Shared fixtures for the integration tests

#![allow(dead_code)]

use butterfly_path::cost::{Cost, DynamicCost, TravelMode};
use butterfly_path::search::{EdgeLabel, PathEdge, PathLocation};
use butterfly_path::tile::{access, DirectedEdge, GraphTile, NodeInfo};
use butterfly_path::GraphId;

/// Costs an edge by its stored length and nothing else: no turn penalties,
/// no speeds. Makes expected costs easy to work out by hand.
#[derive(Debug, Clone, Default)]
pub struct LengthCost {
    pub denied: Vec<GraphId>,
    pub heuristic_factor: f32,
    pub level_change: f32,
}

impl LengthCost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(mut self, edge: GraphId) -> Self {
        self.denied.push(edge);
        self
    }

    pub fn with_heuristic(mut self, factor: f32) -> Self {
        self.heuristic_factor = factor;
        self
    }

    pub fn with_level_change(mut self, cost: f32) -> Self {
        self.level_change = cost;
        self
    }

    fn open(&self, edge: &DirectedEdge, edge_id: GraphId) -> bool {
        edge.forward_access & access::AUTO != 0 && !self.denied.contains(&edge_id)
    }
}

impl DynamicCost for LengthCost {
    fn mode(&self) -> TravelMode {
        TravelMode::Car
    }

    fn allowed(&self, edge: &DirectedEdge, _pred: &EdgeLabel, _tile: &GraphTile, edge_id: GraphId) -> bool {
        self.open(edge, edge_id)
    }

    fn allowed_reverse(
        &self,
        _edge: &DirectedEdge,
        _pred: &EdgeLabel,
        opp_edge: &DirectedEdge,
        _tile: &GraphTile,
        _edge_id: GraphId,
        opp_edge_id: GraphId,
    ) -> bool {
        self.open(opp_edge, opp_edge_id)
    }

    fn edge_cost(&self, edge: &DirectedEdge, _tile: &GraphTile) -> Cost {
        Cost::new(edge.length_m, edge.length_m)
    }

    fn transition_cost(&self, _pred: &EdgeLabel, _node: &NodeInfo, _edge: &DirectedEdge) -> Cost {
        Cost::ZERO
    }

    fn transition_cost_reverse(&self, _incoming: &DirectedEdge, _node: &NodeInfo, _succ: &EdgeLabel) -> Cost {
        Cost::ZERO
    }

    fn level_transition_cost(&self) -> Cost {
        Cost::new(self.level_change, self.level_change)
    }

    fn a_star_cost_factor(&self) -> f32 {
        self.heuristic_factor
    }
}

/// Single-candidate location at `pct` of `edge`, placed at `(lat, lon)`
pub fn at(lat: f64, lon: f64, edge: GraphId, pct: f32) -> PathLocation {
    PathLocation::new(lat, lon).with_edge(PathEdge::new(edge, pct))
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() <= 1e-3 * expected.abs().max(1.0),
        "expected cost {expected}, got {actual}"
    );
}
