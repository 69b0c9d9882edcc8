//! Reference cost policy for car, bike and foot
//!
//! Speeds follow the routing profiles: a class default unless the edge has a
//! posted speed (cars only), scaled down on poor surfaces. Cost is travel time
//! times a per-road preference; maneuvers add flat penalties.

use super::{Cost, DynamicCost, TravelMode, TurnPenalties};
use crate::graph_id::GraphId;
use crate::search::EdgeLabel;
use crate::tile::{DirectedEdge, GraphTile, NodeInfo, RoadClass, Surface, Use};

/// Posted speeds above this are treated as this
const MAX_CAR_SPEED_KPH: f32 = 140.0;
const MAX_BIKE_SPEED_KPH: f32 = 20.0;
const MAX_FOOT_SPEED_KPH: f32 = 5.0;

#[derive(Debug, Clone)]
pub struct ModeCost {
    mode: TravelMode,
    penalties: TurnPenalties,
}

impl ModeCost {
    pub fn new(mode: TravelMode) -> Self {
        Self::with_penalties(mode, TurnPenalties::for_mode(mode))
    }

    pub fn with_penalties(mode: TravelMode, penalties: TurnPenalties) -> Self {
        Self { mode, penalties }
    }

    pub fn penalties(&self) -> &TurnPenalties {
        &self.penalties
    }

    fn car_speed(edge: &DirectedEdge) -> Option<f32> {
        let class_speed = match edge.class {
            RoadClass::Motorway => 110.0,
            RoadClass::Trunk => 90.0,
            RoadClass::Primary => 70.0,
            RoadClass::Secondary => 60.0,
            RoadClass::Tertiary => 50.0,
            RoadClass::Unclassified => 50.0,
            RoadClass::Residential => 30.0,
            RoadClass::ServiceOther => 20.0,
        };
        let speed = match edge.road_use {
            Use::Road => class_speed,
            // Links run at roughly half their road's speed
            Use::Ramp => class_speed * 0.55,
            Use::LivingStreet => 10.0,
            Use::Ferry => 20.0,
            Use::Cycleway | Use::Footway | Use::Track | Use::Rail => return None,
        };
        if edge.speed_kph > 0 && edge.road_use != Use::Ferry {
            return Some((edge.speed_kph as f32).min(MAX_CAR_SPEED_KPH));
        }
        Some(speed)
    }

    fn bike_speed(edge: &DirectedEdge) -> Option<f32> {
        match edge.road_use {
            Use::Cycleway => Some(20.0),
            Use::Footway => Some(15.0),
            Use::LivingStreet => Some(15.0),
            Use::Track => Some(12.0),
            Use::Ferry => Some(15.0),
            Use::Rail => None,
            Use::Road | Use::Ramp => match edge.class {
                RoadClass::Motorway | RoadClass::Trunk => None,
                RoadClass::ServiceOther => Some(15.0),
                _ => Some(18.0),
            },
        }
    }

    fn foot_speed(edge: &DirectedEdge) -> Option<f32> {
        match edge.road_use {
            Use::Footway | Use::LivingStreet | Use::Ferry => Some(5.0),
            Use::Cycleway => Some(4.5),
            Use::Track => Some(4.0),
            Use::Rail => None,
            Use::Road | Use::Ramp => match edge.class {
                RoadClass::Motorway | RoadClass::Trunk => None,
                RoadClass::Unclassified | RoadClass::Residential => Some(5.0),
                _ => Some(4.5),
            },
        }
    }

    /// Effective speed in km/h; `None` when the mode cannot use the edge at all
    pub fn speed_kph(&self, edge: &DirectedEdge) -> Option<f32> {
        let base = match self.mode {
            TravelMode::Car => Self::car_speed(edge)?,
            TravelMode::Bike => Self::bike_speed(edge)?,
            TravelMode::Foot => Self::foot_speed(edge)?,
        };
        let factor = match (self.mode, edge.surface) {
            (_, Surface::Impassable) => return None,
            (_, Surface::Paved) => 1.0,
            (TravelMode::Car, Surface::Compacted) => 0.9,
            (TravelMode::Car, Surface::Gravel) => 0.75,
            (TravelMode::Car, Surface::Dirt) => 0.6,
            (_, Surface::Compacted) => 0.9,
            (_, Surface::Gravel) => 0.8,
            (_, Surface::Dirt) => 0.7,
        };
        Some(base * factor)
    }

    /// Cost per second on this edge
    fn preference(&self, edge: &DirectedEdge) -> f32 {
        match self.mode {
            TravelMode::Car if edge.road_use == Use::Ferry => 1.2,
            TravelMode::Car => 1.0,
            TravelMode::Bike => match (edge.road_use, edge.class) {
                (Use::Cycleway, _) => 0.9,
                (Use::Road, RoadClass::Primary | RoadClass::Secondary) => 1.3,
                _ => 1.0,
            },
            TravelMode::Foot => 1.0,
        }
    }

    fn min_preference(&self) -> f32 {
        match self.mode {
            TravelMode::Bike => 0.9,
            TravelMode::Car | TravelMode::Foot => 1.0,
        }
    }

    fn max_speed_kph(&self) -> f32 {
        match self.mode {
            TravelMode::Car => MAX_CAR_SPEED_KPH,
            TravelMode::Bike => MAX_BIKE_SPEED_KPH,
            TravelMode::Foot => MAX_FOOT_SPEED_KPH,
        }
    }

    fn usable(&self, edge: &DirectedEdge) -> bool {
        edge.forward_access & self.mode.access_mask() != 0 && self.speed_kph(edge).is_some()
    }

    fn obeys_restrictions(&self) -> bool {
        self.mode != TravelMode::Foot
    }
}

impl DynamicCost for ModeCost {
    fn mode(&self) -> TravelMode {
        self.mode
    }

    fn allowed(
        &self,
        edge: &DirectedEdge,
        pred: &EdgeLabel,
        _tile: &GraphTile,
        _edge_id: GraphId,
    ) -> bool {
        if !self.usable(edge) {
            return false;
        }
        !(self.obeys_restrictions() && pred.restricts(edge.local_edge_idx))
    }

    fn allowed_reverse(
        &self,
        _edge: &DirectedEdge,
        pred: &EdgeLabel,
        opp_edge: &DirectedEdge,
        _tile: &GraphTile,
        _edge_id: GraphId,
        _opp_edge_id: GraphId,
    ) -> bool {
        if !self.usable(opp_edge) {
            return false;
        }
        !(self.obeys_restrictions()
            && !pred.is_transition()
            && opp_edge.restricts(pred.local_edge_idx))
    }

    fn edge_cost(&self, edge: &DirectedEdge, _tile: &GraphTile) -> Cost {
        let kph = self.speed_kph(edge).unwrap_or(1.0).max(1.0);
        let secs = edge.length_m / (kph / 3.6);
        Cost::new(secs * self.preference(edge), secs)
    }

    /// Maneuvers across a level transition are free
    fn transition_cost(&self, pred: &EdgeLabel, node: &NodeInfo, edge: &DirectedEdge) -> Cost {
        if pred.is_transition() {
            return Cost::ZERO;
        }
        let u_turn = pred.opp_local_idx == edge.local_edge_idx;
        Cost::secs(self.penalties.penalty(node, u_turn))
    }

    fn transition_cost_reverse(
        &self,
        incoming: &DirectedEdge,
        node: &NodeInfo,
        succ: &EdgeLabel,
    ) -> Cost {
        if succ.is_transition() {
            return Cost::ZERO;
        }
        let u_turn = incoming.opp_local_idx == succ.local_edge_idx;
        Cost::secs(self.penalties.penalty(node, u_turn))
    }

    fn a_star_cost_factor(&self) -> f32 {
        self.min_preference() / (self.max_speed_kph() / 3.6)
    }
}
