//! Travel cost policies
//!
//! A [`DynamicCost`] decides whether a move is legal and what it costs. The
//! search asks it about every candidate; it never mutates graph or search
//! state. Costs must be non-negative and `a_star_cost_factor` times the
//! straight-line distance must never exceed the real remaining cost.

mod mode_cost;
mod turn_penalty;

pub use mode_cost::ModeCost;
pub use turn_penalty::TurnPenalties;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;
use std::sync::Arc;

use crate::graph_id::GraphId;
use crate::search::EdgeLabel;
use crate::tile::{access, DirectedEdge, GraphTile, NodeInfo};

/// Scalar cost plus elapsed seconds. The two diverge when a policy expresses
/// preference (e.g. avoiding busy roads) rather than pure duration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cost {
    pub cost: f32,
    pub secs: f32,
}

impl Cost {
    pub const ZERO: Cost = Cost {
        cost: 0.0,
        secs: 0.0,
    };

    pub const fn new(cost: f32, secs: f32) -> Self {
        Self { cost, secs }
    }

    /// Pure time cost
    pub const fn secs(secs: f32) -> Self {
        Self { cost: secs, secs }
    }

    pub fn is_non_negative(&self) -> bool {
        self.cost >= 0.0 && self.secs >= 0.0
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost::new(self.cost + rhs.cost, self.secs + rhs.secs)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        self.cost += rhs.cost;
        self.secs += rhs.secs;
    }
}

impl Sub for Cost {
    type Output = Cost;

    fn sub(self, rhs: Cost) -> Cost {
        Cost::new(self.cost - rhs.cost, self.secs - rhs.secs)
    }
}

/// Partial traversal: `edge_cost * 0.25` is the cost of a quarter of the edge
impl Mul<f32> for Cost {
    type Output = Cost;

    fn mul(self, factor: f32) -> Cost {
        Cost::new(self.cost * factor, self.secs * factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Car,
    Bike,
    Foot,
}

impl TravelMode {
    pub fn all() -> &'static [TravelMode] {
        &[TravelMode::Car, TravelMode::Bike, TravelMode::Foot]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TravelMode::Car => "car",
            TravelMode::Bike => "bike",
            TravelMode::Foot => "foot",
        }
    }

    /// Access bit this mode needs on edges and nodes
    pub fn access_mask(&self) -> u16 {
        match self {
            TravelMode::Car => access::AUTO,
            TravelMode::Bike => access::BICYCLE,
            TravelMode::Foot => access::PEDESTRIAN,
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TravelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "car" | "auto" => Ok(TravelMode::Car),
            "bike" | "bicycle" => Ok(TravelMode::Bike),
            "foot" | "pedestrian" => Ok(TravelMode::Foot),
            other => Err(format!("unknown travel mode '{other}' (car, bike, foot)")),
        }
    }
}

pub trait DynamicCost: Send + Sync {
    fn mode(&self) -> TravelMode;

    /// Forward legality of taking `edge` after `pred`
    fn allowed(&self, edge: &DirectedEdge, pred: &EdgeLabel, tile: &GraphTile, edge_id: GraphId)
        -> bool;

    /// Legality of `opp_edge` followed by `pred`, seen from the reverse search.
    ///
    /// `edge` is the outgoing edge of the junction being expanded; `opp_edge`
    /// is the real edge entering that junction, the one actually traversed.
    fn allowed_reverse(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        opp_edge: &DirectedEdge,
        tile: &GraphTile,
        edge_id: GraphId,
        opp_edge_id: GraphId,
    ) -> bool;

    /// Junction passability
    fn allowed_node(&self, node: &NodeInfo) -> bool {
        node.access & self.mode().access_mask() != 0
    }

    fn edge_cost(&self, edge: &DirectedEdge, tile: &GraphTile) -> Cost;

    /// Maneuver from the edge of `pred` onto `edge` at `node`
    fn transition_cost(&self, pred: &EdgeLabel, node: &NodeInfo, edge: &DirectedEdge) -> Cost;

    /// Maneuver from `incoming` onto the edge of `succ` at `node`; must equal
    /// what `transition_cost` charges for the same pair
    fn transition_cost_reverse(
        &self,
        incoming: &DirectedEdge,
        node: &NodeInfo,
        succ: &EdgeLabel,
    ) -> Cost;

    /// Cost of moving between levels at one junction
    fn level_transition_cost(&self) -> Cost {
        Cost::ZERO
    }

    /// Cost per meter of straight-line distance used by the A* heuristic
    fn a_star_cost_factor(&self) -> f32;
}

/// Reference policy for `mode`
pub fn create_costing(mode: TravelMode) -> Arc<dyn DynamicCost> {
    Arc::new(ModeCost::new(mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_arithmetic() {
        let a = Cost::new(10.0, 8.0);
        let b = Cost::secs(5.0);
        assert_eq!(a + b, Cost::new(15.0, 13.0));
        assert_eq!((a + b) - b, a);
        assert_eq!(a * 0.5, Cost::new(5.0, 4.0));
        let mut c = Cost::ZERO;
        c += a;
        assert_eq!(c, a);
        assert!(!(Cost::ZERO - a).is_non_negative());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Car".parse::<TravelMode>().unwrap(), TravelMode::Car);
        assert_eq!("pedestrian".parse::<TravelMode>().unwrap(), TravelMode::Foot);
        assert!("boat".parse::<TravelMode>().is_err());
        assert_eq!(TravelMode::Bike.to_string(), "bike");
        let json = serde_json::to_string(&TravelMode::Foot).unwrap();
        assert_eq!(json, "\"foot\"");
    }

    #[test]
    fn test_factory() {
        for &mode in TravelMode::all() {
            let costing = create_costing(mode);
            assert_eq!(costing.mode(), mode);
            assert!(costing.a_star_cost_factor() > 0.0);
        }
    }
}
