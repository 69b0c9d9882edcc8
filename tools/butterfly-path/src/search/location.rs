//! Snapped endpoints handed to the search

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::geo::interpolate;
use crate::graph_id::GraphId;
use crate::store::GraphReader;

/// Side of the road the snapped point lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Either,
    Left,
    Right,
}

/// One candidate edge for an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathEdge {
    pub id: GraphId,
    /// Position along the edge in `[0, 1]`
    pub percent_along: f32,
    #[serde(default)]
    pub side: Side,
    /// Snapping penalty added to the cost of paths using this candidate
    #[serde(default)]
    pub score: f32,
}

impl PathEdge {
    pub fn new(id: GraphId, percent_along: f32) -> Self {
        Self {
            id,
            percent_along,
            side: Side::Either,
            score: 0.0,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }
}

/// A snapped origin or destination: the input point plus its candidate edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathLocation {
    pub lat: f64,
    pub lon: f64,
    pub edges: Vec<PathEdge>,
}

impl PathLocation {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            edges: Vec::new(),
        }
    }

    pub fn with_edge(mut self, edge: PathEdge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn find(&self, id: GraphId) -> Option<&PathEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Location at `percent_along` of one edge, positioned between its junctions
    pub fn on_edge(
        reader: &mut GraphReader,
        id: GraphId,
        percent_along: f32,
    ) -> Result<PathLocation, RouteError> {
        let missing = || RouteError::InvalidInput(format!("edge {id} is not in the graph"));
        let tile = reader.tile(id)?.ok_or_else(missing)?;
        let edge = tile.edge(id).map_err(|_| missing())?;
        let end_tile = reader.tile(edge.end_node)?.ok_or_else(missing)?;
        let end = end_tile.node(edge.end_node)?;
        let start_id = reader.begin_node(&tile, edge)?.ok_or_else(missing)?;
        let start_tile = reader.tile(start_id)?.ok_or_else(missing)?;
        let start = start_tile.node(start_id)?;
        let (lat, lon) = interpolate(
            (start.lat, start.lon),
            (end.lat, end.lon),
            percent_along as f64,
        );
        Ok(PathLocation::new(lat, lon).with_edge(PathEdge::new(id, percent_along)))
    }

    pub fn validate(&self, what: &str) -> Result<(), RouteError> {
        if self.edges.is_empty() {
            return Err(RouteError::InvalidInput(format!(
                "{what} has no candidate edges"
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return Err(RouteError::InvalidInput(format!(
                "{what} position ({}, {}) is out of range",
                self.lat, self.lon
            )));
        }
        for edge in &self.edges {
            if !edge.id.is_valid() {
                return Err(RouteError::InvalidInput(format!(
                    "{what} candidate has an invalid edge id"
                )));
            }
            if !(0.0..=1.0).contains(&edge.percent_along) {
                return Err(RouteError::InvalidInput(format!(
                    "{what} candidate {} has position {} outside [0, 1]",
                    edge.id, edge.percent_along
                )));
            }
            if !edge.score.is_finite() || edge.score < 0.0 {
                return Err(RouteError::InvalidInput(format!(
                    "{what} candidate {} has score {}",
                    edge.id, edge.score
                )));
            }
        }
        Ok(())
    }
}
