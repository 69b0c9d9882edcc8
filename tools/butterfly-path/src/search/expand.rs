//! One search direction: labels, frontier and junction expansion
//!
//! Forward labels cover an edge and end at its end junction. Reverse labels
//! cover the edge actually traversed too, but end at its start junction, so
//! the reverse search walks edges backwards while checking legality and turn
//! costs in travel order.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::trace;

use super::frontier::{new_frontier, Frontier};
use super::heuristic::Heuristic;
use super::labels::{EdgeLabel, LabelKind, LabelSet, Status, NO_LABEL};
use super::limits::HierarchyState;
use super::location::PathLocation;
use super::{Direction, EventKind, ExpansionEvent, Observer, SearchOptions};
use crate::cost::{Cost, DynamicCost};
use crate::error::RouteError;
use crate::graph_id::GraphId;
use crate::store::GraphReader;
use crate::tile::{GraphTile, NodeInfo};

/// Where a candidate sits on its edge, and what snapping to it costs
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Anchor {
    pub percent: f32,
    pub score: f32,
}

pub(crate) type Destinations = FxHashMap<GraphId, Anchor>;

pub(crate) fn destinations(location: &PathLocation) -> Destinations {
    let mut map = Destinations::default();
    for edge in &location.edges {
        let candidate = Anchor {
            percent: edge.percent_along,
            score: edge.score,
        };
        // keep the cheaper score when an edge is listed twice
        map.entry(edge.id)
            .and_modify(|d| {
                if candidate.score < d.score {
                    *d = candidate
                }
            })
            .or_insert(candidate);
    }
    map
}

pub(crate) fn notify(observer: &mut Option<Observer>, event: ExpansionEvent) {
    if let Some(observer) = observer.as_mut() {
        observer(&event);
    }
}

pub(crate) struct DirectionState {
    pub direction: Direction,
    pub labels: LabelSet,
    pub frontier: Box<dyn Frontier>,
    pub heuristic: Heuristic,
    pub hierarchy: HierarchyState,
    /// Seed label per candidate edge
    pub seeds: FxHashMap<GraphId, u32>,
    /// Candidate each seed label was made from
    pub anchors: FxHashMap<u32, Anchor>,
    /// Edge labels created or relaxed since the last drain
    pub touched: Vec<u32>,
}

impl DirectionState {
    pub fn new(
        direction: Direction,
        options: &SearchOptions,
        heuristic: Heuristic,
        endpoints: Vec<(f64, f64)>,
    ) -> Self {
        Self {
            direction,
            labels: LabelSet::new(options.max_reserved_labels),
            frontier: new_frontier(options.frontier, options.bucket_size, options.bucket_count),
            heuristic,
            hierarchy: HierarchyState::new(&options.hierarchy, endpoints),
            seeds: FxHashMap::default(),
            anchors: FxHashMap::default(),
            touched: Vec::new(),
        }
    }

    /// Empties the state for a new search, keeping allocations
    pub fn reset(&mut self, options: &SearchOptions, heuristic: Heuristic, endpoints: Vec<(f64, f64)>) {
        self.labels.clear();
        self.frontier.clear();
        self.heuristic = heuristic;
        self.hierarchy = HierarchyState::new(&options.hierarchy, endpoints);
        self.seeds.clear();
        self.anchors.clear();
        self.touched.clear();
    }

    fn event(&self, kind: EventKind, idx: u32) -> ExpansionEvent {
        let label = self.labels.get(idx);
        ExpansionEvent {
            kind,
            direction: self.direction,
            id: if label.is_transition() {
                label.end_node
            } else {
                label.edge_id
            },
            transition: label.is_transition(),
            seed: label.predecessor == NO_LABEL,
            cost: label.cost,
        }
    }

    /// Best label this direction holds for `edge_id`, seeds included
    pub fn edge_labels(&self, edge_id: GraphId) -> impl Iterator<Item = u32> + '_ {
        self.labels
            .edge_status(edge_id)
            .map(Status::label)
            .into_iter()
            .chain(self.seeds.get(&edge_id).copied())
    }

    /// Heuristic at a junction; `None` when its tile is missing
    fn node_estimate(
        &self,
        reader: &mut GraphReader,
        tile: &Arc<GraphTile>,
        node_id: GraphId,
    ) -> Result<Option<f32>, RouteError> {
        if self.heuristic.is_zero() {
            return Ok(Some(0.0));
        }
        let node_tile = if node_id.same_tile(tile.id()) {
            Arc::clone(tile)
        } else {
            match reader.tile(node_id)? {
                Some(t) => t,
                None => return Ok(None),
            }
        };
        let node = node_tile.node(node_id)?;
        Ok(Some(self.heuristic.estimate(node.lat, node.lon)))
    }

    fn push_seed(&mut self, label: EdgeLabel, anchor: Anchor, observer: &mut Option<Observer>) {
        let edge_id = label.edge_id;
        let key = label.sortcost;
        let idx = self.labels.create_seed(label);
        self.frontier.push(idx, key, false);
        self.anchors.insert(idx, anchor);
        // the meeting check wants full-remainder seeds only, the cheapest per edge
        let label = self.labels.get(idx);
        let replace = !(label.origin && label.destination)
            && self
                .seeds
                .get(&edge_id)
                .map_or(true, |&old| self.labels.get(old).cost.cost > label.cost.cost);
        if replace {
            self.seeds.insert(edge_id, idx);
        }
        self.touched.push(idx);
        notify(observer, self.event(EventKind::Reached, idx));
    }

    /// Seeds the forward frontier with the remainder of every origin edge.
    ///
    /// An origin edge that also carries a destination candidate further along
    /// gets a second seed covering just the stretch between the two.
    pub fn seed_origin(
        &mut self,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
        origin: &PathLocation,
        destinations: Option<&Destinations>,
        observer: &mut Option<Observer>,
    ) -> Result<usize, RouteError> {
        let mut seeded = 0;
        for candidate in &origin.edges {
            let Some(tile) = reader.tile(candidate.id)? else {
                trace!(edge = %candidate.id, "origin tile missing");
                continue;
            };
            let edge = tile.edge(candidate.id).map_err(|_| {
                RouteError::InvalidInput(format!("origin edge {} is not in the graph", candidate.id))
            })?;
            if !costing.allowed(edge, &EdgeLabel::none(), &tile, candidate.id) {
                trace!(edge = %candidate.id, "origin edge not allowed");
                continue;
            }
            let full = costing.edge_cost(edge, &tile);
            let pct = candidate.percent_along;
            if let Some(dest) = destinations
                .and_then(|d| d.get(&candidate.id))
                .filter(|d| d.percent >= pct)
            {
                let cost = full * (dest.percent - pct) + Cost::new(candidate.score + dest.score, 0.0);
                let label = EdgeLabel::edge(candidate.id, edge, edge.end_node, NO_LABEL, cost, cost.cost, full)
                    .with_origin()
                    .with_destination();
                let anchor = Anchor {
                    percent: pct,
                    score: candidate.score + dest.score,
                };
                self.push_seed(label, anchor, observer);
            }
            let cost = full * (1.0 - pct) + Cost::new(candidate.score, 0.0);
            let h = self.node_estimate(reader, &tile, edge.end_node)?.unwrap_or(0.0);
            let label = EdgeLabel::edge(candidate.id, edge, edge.end_node, NO_LABEL, cost, cost.cost + h, full)
                .with_origin();
            let anchor = Anchor {
                percent: pct,
                score: candidate.score,
            };
            self.push_seed(label, anchor, observer);
            seeded += 1;
        }
        Ok(seeded)
    }

    /// Seeds the reverse frontier with the leading part of every destination
    /// edge, ending at the edge's start junction
    pub fn seed_destination(
        &mut self,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
        destination: &PathLocation,
        observer: &mut Option<Observer>,
    ) -> Result<usize, RouteError> {
        let mut seeded = 0;
        for candidate in &destination.edges {
            let Some(tile) = reader.tile(candidate.id)? else {
                trace!(edge = %candidate.id, "destination tile missing");
                continue;
            };
            let edge = tile.edge(candidate.id).map_err(|_| {
                RouteError::InvalidInput(format!(
                    "destination edge {} is not in the graph",
                    candidate.id
                ))
            })?;
            if !costing.allowed(edge, &EdgeLabel::none(), &tile, candidate.id) {
                trace!(edge = %candidate.id, "destination edge not allowed");
                continue;
            }
            let begin = reader.begin_node(&tile, edge)?.unwrap_or(GraphId::INVALID);
            let full = costing.edge_cost(edge, &tile);
            let cost = full * candidate.percent_along + Cost::new(candidate.score, 0.0);
            let h = if begin.is_valid() {
                self.node_estimate(reader, &tile, begin)?.unwrap_or(0.0)
            } else {
                0.0
            };
            let label = EdgeLabel::edge(candidate.id, edge, begin, NO_LABEL, cost, cost.cost + h, full)
                .with_destination();
            let anchor = Anchor {
                percent: candidate.percent_along,
                score: candidate.score,
            };
            self.push_seed(label, anchor, observer);
            seeded += 1;
        }
        Ok(seeded)
    }

    /// Marks a popped label final
    pub fn settle(&mut self, idx: u32, observer: &mut Option<Observer>) {
        let label = self.labels.get(idx);
        if label.is_transition() && label.end_node.level() < label.transition_from.level() {
            self.hierarchy.record_up_transition(label.transition_from.level());
        }
        self.labels.settle(idx);
        notify(observer, self.event(EventKind::Settled, idx));
    }

    /// Files a candidate: new label, cheaper replacement, or nothing when the
    /// existing label is settled or at least as cheap
    fn add_or_relax(&mut self, candidate: EdgeLabel, observer: &mut Option<Observer>) {
        let (kind, key) = match candidate.kind {
            LabelKind::Edge => (LabelKind::Edge, candidate.edge_id),
            LabelKind::Transition => (LabelKind::Transition, candidate.end_node),
        };
        let sortcost = candidate.sortcost;
        let transition = candidate.is_transition();
        let (idx, event) = match self.labels.status(kind, key) {
            Some(Status::Settled(_)) => return,
            Some(Status::Frontier(idx)) => {
                if candidate.cost.cost >= self.labels.get(idx).cost.cost {
                    return;
                }
                self.labels.relax(idx, candidate);
                self.frontier.decrease(idx, sortcost, transition);
                (idx, EventKind::Relaxed)
            }
            None => {
                let idx = self.labels.create(candidate);
                self.frontier.push(idx, sortcost, transition);
                (idx, EventKind::Reached)
            }
        };
        if !transition {
            self.touched.push(idx);
        }
        notify(observer, self.event(event, idx));
    }

    /// Loads the junction a label ends at; `None` prunes the label
    fn junction(
        &self,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
        node_id: GraphId,
    ) -> Result<Option<Arc<GraphTile>>, RouteError> {
        if !node_id.is_valid() {
            return Ok(None);
        }
        let Some(tile) = reader.tile(node_id)? else {
            return Ok(None);
        };
        if !costing.allowed_node(tile.node(node_id)?) {
            trace!(node = %node_id, "junction not passable");
            return Ok(None);
        }
        Ok(Some(tile))
    }

    fn expand_transitions(
        &mut self,
        costing: &dyn DynamicCost,
        idx: u32,
        pred: &EdgeLabel,
        tile: &GraphTile,
        node: &NodeInfo,
        observer: &mut Option<Observer>,
    ) -> Result<(), RouteError> {
        for transition in tile.node_transitions(node)? {
            if pred.is_transition() && transition.end_node == pred.transition_from {
                continue;
            }
            if !transition.up
                && self
                    .hierarchy
                    .stop_expanding(transition.end_node.level(), node.lat, node.lon)
            {
                trace!(node = %transition.end_node, "level closed, not descending");
                continue;
            }
            let cost = pred.cost + costing.level_transition_cost();
            let h = self.heuristic.estimate(node.lat, node.lon);
            let label = EdgeLabel::transition(pred.end_node, transition.end_node, idx, cost, cost.cost + h);
            self.add_or_relax(label, observer);
        }
        Ok(())
    }

    /// Expands the end junction of forward label `idx`
    pub fn expand_forward(
        &mut self,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
        idx: u32,
        destinations: Option<&Destinations>,
        observer: &mut Option<Observer>,
    ) -> Result<(), RouteError> {
        let pred = self.labels.get(idx).clone();
        let node_id = pred.end_node;
        let Some(tile) = self.junction(reader, costing, node_id)? else {
            return Ok(());
        };
        let node = tile.node(node_id)?;
        self.expand_transitions(costing, idx, &pred, &tile, node, observer)?;
        if self.hierarchy.stop_expanding(node_id.level(), node.lat, node.lon) {
            trace!(node = %node_id, "level closed");
            return Ok(());
        }

        for (edge_id, edge) in tile.outgoing_edges(node)? {
            if self.labels.edge_status(edge_id).is_some_and(Status::is_settled) {
                continue;
            }
            if !costing.allowed(edge, &pred, &tile, edge_id) {
                trace!(edge = %edge_id, "edge not allowed");
                continue;
            }
            let full = costing.edge_cost(edge, &tile);
            let turn = costing.transition_cost(&pred, node, edge);
            debug_assert!(
                full.is_non_negative() && turn.is_non_negative(),
                "negative cost on {edge_id}"
            );
            let candidate = match destinations.and_then(|d| d.get(&edge_id)) {
                Some(dest) => {
                    let cost = pred.cost + turn + full * dest.percent + Cost::new(dest.score, 0.0);
                    EdgeLabel::edge(edge_id, edge, edge.end_node, idx, cost, cost.cost, full)
                        .with_destination()
                }
                None => {
                    let cost = pred.cost + turn + full;
                    let Some(h) = self.node_estimate(reader, &tile, edge.end_node)? else {
                        continue;
                    };
                    EdgeLabel::edge(edge_id, edge, edge.end_node, idx, cost, cost.cost + h, full)
                }
            };
            self.add_or_relax(candidate, observer);
        }
        Ok(())
    }

    /// Expands the start junction of reverse label `idx`: every edge entering
    /// that junction becomes a candidate
    pub fn expand_reverse(
        &mut self,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
        idx: u32,
        observer: &mut Option<Observer>,
    ) -> Result<(), RouteError> {
        let pred = self.labels.get(idx).clone();
        let node_id = pred.end_node;
        let Some(tile) = self.junction(reader, costing, node_id)? else {
            return Ok(());
        };
        let node = tile.node(node_id)?;
        self.expand_transitions(costing, idx, &pred, &tile, node, observer)?;
        if self.hierarchy.stop_expanding(node_id.level(), node.lat, node.lon) {
            trace!(node = %node_id, "level closed");
            return Ok(());
        }

        for (out_id, out_edge) in tile.outgoing_edges(node)? {
            let Some((in_id, in_tile)) = reader.opposing_edge(&tile, out_edge)? else {
                continue;
            };
            if self.labels.edge_status(in_id).is_some_and(Status::is_settled) {
                continue;
            }
            let in_edge = in_tile.edge(in_id)?;
            if !costing.allowed_reverse(out_edge, &pred, in_edge, &tile, out_id, in_id) {
                trace!(edge = %in_id, "edge not allowed in reverse");
                continue;
            }
            let full = costing.edge_cost(in_edge, &in_tile);
            let turn = costing.transition_cost_reverse(in_edge, node, &pred);
            debug_assert!(
                full.is_non_negative() && turn.is_non_negative(),
                "negative cost on {in_id}"
            );
            let cost = pred.cost + turn + full;
            let start = out_edge.end_node;
            let Some(h) = self.node_estimate(reader, &in_tile, start)? else {
                continue;
            };
            let candidate = EdgeLabel::edge(in_id, in_edge, start, idx, cost, cost.cost + h, full);
            self.add_or_relax(candidate, observer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EdgeSpec, GraphBuilder};
    use crate::cost::{create_costing, TravelMode};
    use crate::search::location::PathEdge;

    /// A - B - C; returns edge ids [AB, BA, BC, CB] and node ids [A, B, C]
    fn line() -> (GraphBuilder, Vec<GraphId>, Vec<GraphId>) {
        let mut b = GraphBuilder::new();
        let n: Vec<_> = (0..3).map(|i| b.add_node(2, 50.0, 4.0 + i as f64 * 0.01)).collect();
        let (ab, ba) = b.add_road(n[0], n[1], EdgeSpec::default());
        let (bc, cb) = b.add_road(n[1], n[2], EdgeSpec::default());
        let ids = [ab, ba, bc, cb].iter().map(|&h| b.edge_id(h)).collect();
        let nodes = n.iter().map(|&h| b.node_id(h)).collect();
        (b, ids, nodes)
    }

    #[test]
    fn test_forward_expansion_creates_labels() {
        let (b, ids, _) = line();
        let store = b.build_memory().unwrap();
        let mut reader = GraphReader::new(&store);
        let costing = create_costing(TravelMode::Car);
        let mut state = DirectionState::new(
            Direction::Forward,
            &SearchOptions::default(),
            Heuristic::zero(),
            Vec::new(),
        );
        let origin = PathLocation::new(50.0, 4.0).with_edge(PathEdge::new(ids[0], 0.0));
        let mut observer = None;
        assert_eq!(
            state.seed_origin(&mut reader, costing.as_ref(), &origin, None, &mut observer).unwrap(),
            1
        );
        let seed = state.frontier.pop().unwrap();
        assert!(state.labels.get(seed).origin);
        state.settle(seed, &mut observer);
        state
            .expand_forward(&mut reader, costing.as_ref(), seed, None, &mut observer)
            .unwrap();

        // both B->A (u-turn) and B->C were reached
        assert!(state.labels.edge_status(ids[1]).is_some());
        let bc = state.labels.edge_status(ids[2]).unwrap();
        assert_eq!(bc, Status::Frontier(bc.label()));
        let label = state.labels.get(bc.label());
        assert_eq!(label.predecessor, seed);
        assert!(label.cost.cost > state.labels.get(seed).cost.cost);
        assert!(state.labels.get(state.labels.edge_status(ids[1]).unwrap().label()).cost.cost > label.cost.cost);
    }

    #[test]
    fn test_reverse_expansion_walks_backwards() {
        let (b, ids, nodes) = line();
        let store = b.build_memory().unwrap();
        let mut reader = GraphReader::new(&store);
        let costing = create_costing(TravelMode::Car);
        let mut state = DirectionState::new(
            Direction::Reverse,
            &SearchOptions::default(),
            Heuristic::zero(),
            Vec::new(),
        );
        let dest = PathLocation::new(50.0, 4.02).with_edge(PathEdge::new(ids[2], 1.0));
        let mut observer = None;
        state.seed_destination(&mut reader, costing.as_ref(), &dest, &mut observer).unwrap();
        let seed = state.frontier.pop().unwrap();
        let seed_label = state.labels.get(seed).clone();
        assert!(seed_label.destination);
        assert_eq!(seed_label.end_node, nodes[1]);

        state.settle(seed, &mut observer);
        state.expand_reverse(&mut reader, costing.as_ref(), seed, &mut observer).unwrap();
        // A->B enters B and is the only real predecessor besides the u-turn C->B
        let ab = state.labels.edge_status(ids[0]).unwrap().label();
        assert_eq!(state.labels.get(ab).end_node, nodes[0]);
        assert_eq!(state.labels.get(ab).predecessor, seed);
    }

    #[test]
    fn test_destinations_keep_cheapest() {
        let id = GraphId::new(2, 1, 1).unwrap();
        let loc = PathLocation::new(0.0, 0.0)
            .with_edge(PathEdge::new(id, 0.5).with_score(3.0))
            .with_edge(PathEdge::new(id, 0.7).with_score(1.0));
        let d = destinations(&loc);
        assert_eq!(d.len(), 1);
        assert_eq!(d[&id].percent, 0.7);
    }
}
