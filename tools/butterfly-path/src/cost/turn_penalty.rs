//! Flat maneuver penalties per travel mode
//!
//! No turn-angle model: a maneuver pays for a U-turn, for a traffic signal
//! and for crossing a complex intersection, each a fixed number of seconds.

use serde::{Deserialize, Serialize};

use super::TravelMode;
use crate::tile::NodeInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPenalties {
    /// Reversing onto the opposing edge
    pub u_turn_secs: f32,
    pub signal_secs: f32,
    /// Charged at junctions with at least `min_degree_for_crossing` edges
    pub crossing_secs: f32,
    pub min_degree_for_crossing: u32,
}

impl TurnPenalties {
    pub fn car() -> Self {
        Self {
            u_turn_secs: 20.0,
            signal_secs: 8.0,
            crossing_secs: 0.0,
            min_degree_for_crossing: 3,
        }
    }

    pub fn bike() -> Self {
        Self {
            u_turn_secs: 5.0,
            signal_secs: 5.0,
            crossing_secs: 0.0,
            min_degree_for_crossing: 3,
        }
    }

    /// Walking back is free; crossings and pedestrian lights are not
    pub fn foot() -> Self {
        Self {
            u_turn_secs: 0.0,
            signal_secs: 4.0,
            crossing_secs: 2.0,
            min_degree_for_crossing: 4,
        }
    }

    pub fn for_mode(mode: TravelMode) -> Self {
        match mode {
            TravelMode::Car => Self::car(),
            TravelMode::Bike => Self::bike(),
            TravelMode::Foot => Self::foot(),
        }
    }

    /// Seconds spent maneuvering through `node`
    pub fn penalty(&self, node: &NodeInfo, u_turn: bool) -> f32 {
        let mut secs = 0.0;
        if u_turn {
            secs += self.u_turn_secs;
        }
        if node.traffic_signal {
            secs += self.signal_secs;
        }
        if node.edge_count >= self.min_degree_for_crossing {
            secs += self.crossing_secs;
        }
        secs
    }
}
