//! Search labels and per-edge visitation status
//!
//! Labels live in an append-only vector and refer to their predecessor by
//! index. Relaxing a label overwrites it in place, so predecessor chains
//! never dangle. Status is looked up by edge id (real edges) or by junction id
//! (level transitions), in separate maps.

use rustc_hash::FxHashMap;

use crate::cost::Cost;
use crate::graph_id::GraphId;
use crate::tile::DirectedEdge;

pub const NO_LABEL: u32 = u32::MAX;

/// Local edge index meaning "no edge"; nodes carry at most 255 edges
pub const NO_LOCAL: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Edge,
    /// Hop between the same junction's ids on adjacent levels
    Transition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLabel {
    pub kind: LabelKind,
    /// Edge this label covers; `INVALID` for transitions
    pub edge_id: GraphId,
    /// Junction reached: the edge's end (forward), its start (reverse), or
    /// the junction on the new level (transition)
    pub end_node: GraphId,
    pub predecessor: u32,
    /// Cumulative cost including this edge
    pub cost: Cost,
    /// `cost` plus heuristic; the frontier key
    pub sortcost: f32,
    /// Full traversal cost of the edge alone
    pub edge_cost: Cost,
    pub local_edge_idx: u8,
    pub opp_local_idx: u8,
    pub restrictions: u8,
    /// Seed created from an origin candidate
    pub origin: bool,
    /// Ends on a destination candidate
    pub destination: bool,
    /// Junction a transition label came from
    pub transition_from: GraphId,
}

impl EdgeLabel {
    pub fn edge(
        edge_id: GraphId,
        edge: &DirectedEdge,
        end_node: GraphId,
        predecessor: u32,
        cost: Cost,
        sortcost: f32,
        edge_cost: Cost,
    ) -> Self {
        Self {
            kind: LabelKind::Edge,
            edge_id,
            end_node,
            predecessor,
            cost,
            sortcost,
            edge_cost,
            local_edge_idx: edge.local_edge_idx,
            opp_local_idx: edge.opp_local_idx,
            restrictions: edge.restrictions,
            origin: false,
            destination: false,
            transition_from: GraphId::INVALID,
        }
    }

    pub fn transition(
        from: GraphId,
        to: GraphId,
        predecessor: u32,
        cost: Cost,
        sortcost: f32,
    ) -> Self {
        Self {
            kind: LabelKind::Transition,
            edge_id: GraphId::INVALID,
            end_node: to,
            predecessor,
            cost,
            sortcost,
            edge_cost: Cost::ZERO,
            local_edge_idx: NO_LOCAL,
            opp_local_idx: NO_LOCAL,
            restrictions: 0,
            origin: false,
            destination: false,
            transition_from: from,
        }
    }

    /// Context for legality checks on seeds, which have no predecessor
    pub fn none() -> Self {
        Self {
            kind: LabelKind::Edge,
            edge_id: GraphId::INVALID,
            end_node: GraphId::INVALID,
            predecessor: NO_LABEL,
            cost: Cost::ZERO,
            sortcost: 0.0,
            edge_cost: Cost::ZERO,
            local_edge_idx: NO_LOCAL,
            opp_local_idx: NO_LOCAL,
            restrictions: 0,
            origin: false,
            destination: false,
            transition_from: GraphId::INVALID,
        }
    }

    pub fn with_origin(mut self) -> Self {
        self.origin = true;
        self
    }

    pub fn with_destination(mut self) -> Self {
        self.destination = true;
        self
    }

    pub fn is_transition(&self) -> bool {
        self.kind == LabelKind::Transition
    }

    /// Whether this label's edge forbids continuing onto local edge `local_idx`
    pub fn restricts(&self, local_idx: u8) -> bool {
        self.kind == LabelKind::Edge && local_idx < 8 && self.restrictions & (1 << local_idx) != 0
    }

    fn key(&self) -> (LabelKind, GraphId) {
        match self.kind {
            LabelKind::Edge => (LabelKind::Edge, self.edge_id),
            LabelKind::Transition => (LabelKind::Transition, self.end_node),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Frontier(u32),
    Settled(u32),
}

impl Status {
    pub fn label(self) -> u32 {
        match self {
            Status::Frontier(idx) | Status::Settled(idx) => idx,
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Status::Settled(_))
    }
}

#[derive(Debug, Default)]
pub struct LabelSet {
    labels: Vec<EdgeLabel>,
    edges: FxHashMap<GraphId, Status>,
    transitions: FxHashMap<GraphId, Status>,
    max_reserved: usize,
}

impl LabelSet {
    pub fn new(max_reserved: usize) -> Self {
        Self {
            labels: Vec::with_capacity(max_reserved.min(4096)),
            max_reserved,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, idx: u32) -> &EdgeLabel {
        &self.labels[idx as usize]
    }

    fn status_map(&mut self, kind: LabelKind) -> &mut FxHashMap<GraphId, Status> {
        match kind {
            LabelKind::Edge => &mut self.edges,
            LabelKind::Transition => &mut self.transitions,
        }
    }

    /// Appends a label and marks its edge (or transition junction) as in the frontier
    pub fn create(&mut self, label: EdgeLabel) -> u32 {
        let idx = self.labels.len() as u32;
        let (kind, id) = label.key();
        debug_assert!(
            !self.status_map(kind).contains_key(&id),
            "label created twice for {id}"
        );
        self.status_map(kind).insert(id, Status::Frontier(idx));
        self.labels.push(label);
        idx
    }

    /// Appends a seed label; seeds cover only part of their edge and take
    /// no part in edge status
    pub fn create_seed(&mut self, label: EdgeLabel) -> u32 {
        let idx = self.labels.len() as u32;
        self.labels.push(label);
        idx
    }

    /// Replaces a frontier label with a strictly cheaper one
    pub fn relax(&mut self, idx: u32, candidate: EdgeLabel) {
        let current = &self.labels[idx as usize];
        debug_assert_eq!(current.key(), candidate.key());
        debug_assert!(
            candidate.cost.cost < current.cost.cost,
            "relaxation must lower the cost ({} -> {})",
            current.cost.cost,
            candidate.cost.cost
        );
        debug_assert_eq!(
            self.status(current.kind, current.key().1),
            Some(Status::Frontier(idx))
        );
        self.labels[idx as usize] = candidate;
    }

    /// Frontier to settled; the label's cost is final from here on
    pub fn settle(&mut self, idx: u32) {
        let (kind, id) = self.labels[idx as usize].key();
        if let Some(status) = self.status_map(kind).get_mut(&id) {
            if status.label() == idx {
                *status = Status::Settled(idx);
            }
        }
    }

    pub fn status(&self, kind: LabelKind, id: GraphId) -> Option<Status> {
        match kind {
            LabelKind::Edge => self.edges.get(&id).copied(),
            LabelKind::Transition => self.transitions.get(&id).copied(),
        }
    }

    pub fn edge_status(&self, edge_id: GraphId) -> Option<Status> {
        self.edges.get(&edge_id).copied()
    }

    pub fn transition_status(&self, node: GraphId) -> Option<Status> {
        self.transitions.get(&node).copied()
    }

    /// Label indices from the root to `idx`, transitions skipped
    pub fn edge_chain(&self, idx: u32) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut current = idx;
        while current != NO_LABEL {
            let label = &self.labels[current as usize];
            if !label.is_transition() {
                chain.push(current);
            }
            current = label.predecessor;
        }
        chain.reverse();
        chain
    }

    /// Root label of the chain ending at `idx`
    pub fn root(&self, idx: u32) -> u32 {
        let mut current = idx;
        loop {
            let pred = self.labels[current as usize].predecessor;
            if pred == NO_LABEL {
                return current;
            }
            current = pred;
        }
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        if self.labels.capacity() > self.max_reserved {
            self.labels.shrink_to(self.max_reserved);
        }
        self.edges.clear();
        self.transitions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{access, RoadClass, Surface, Use};

    fn edge() -> DirectedEdge {
        DirectedEdge {
            end_node: GraphId::new(2, 1, 1).unwrap(),
            length_m: 10.0,
            forward_access: access::ALL,
            reverse_access: access::ALL,
            class: RoadClass::Residential,
            road_use: Use::Road,
            surface: Surface::Paved,
            speed_kph: 0,
            flags: 0,
            local_edge_idx: 2,
            opp_local_idx: 0,
            restrictions: 0b10,
            edge_info_offset: 0,
        }
    }

    fn label(index: u32, pred: u32, cost: f32) -> EdgeLabel {
        let e = edge();
        EdgeLabel::edge(
            GraphId::new(2, 1, index).unwrap(),
            &e,
            e.end_node,
            pred,
            Cost::secs(cost),
            cost,
            Cost::secs(1.0),
        )
    }

    #[test]
    fn test_create_relax_settle() {
        let mut set = LabelSet::new(16);
        let a = set.create(label(1, NO_LABEL, 5.0));
        let id = set.get(a).edge_id;
        assert_eq!(set.edge_status(id), Some(Status::Frontier(a)));

        set.relax(a, label(1, NO_LABEL, 3.0));
        assert_eq!(set.get(a).cost.cost, 3.0);

        set.settle(a);
        assert_eq!(set.edge_status(id), Some(Status::Settled(a)));
        assert!(set.edge_status(id).unwrap().is_settled());
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_relax_must_decrease() {
        let mut set = LabelSet::new(16);
        let a = set.create(label(1, NO_LABEL, 5.0));
        set.relax(a, label(1, NO_LABEL, 6.0));
    }

    #[test]
    fn test_seed_has_no_status() {
        let mut set = LabelSet::new(16);
        let s = set.create_seed(label(4, NO_LABEL, 1.0).with_origin());
        assert!(set.get(s).origin);
        assert_eq!(set.edge_status(set.get(s).edge_id), None);
        // the full edge can still be labelled separately
        let full = set.create(label(4, s, 9.0));
        assert_eq!(set.edge_status(set.get(full).edge_id), Some(Status::Frontier(full)));
    }

    #[test]
    fn test_transitions_keyed_by_node() {
        let mut set = LabelSet::new(16);
        let a = set.create(label(1, NO_LABEL, 1.0));
        let to = GraphId::new(1, 3, 7).unwrap();
        let t = set.create(EdgeLabel::transition(
            set.get(a).end_node,
            to,
            a,
            Cost::secs(1.0),
            1.0,
        ));
        assert_eq!(set.transition_status(to), Some(Status::Frontier(t)));
        assert_eq!(set.edge_status(to), None);
        let b = set.create(label(2, t, 2.0));
        // transitions are skipped in the chain
        assert_eq!(set.edge_chain(b), vec![a, b]);
        assert_eq!(set.root(b), a);
    }

    #[test]
    fn test_restricts() {
        let l = label(1, NO_LABEL, 0.0);
        assert!(l.restricts(1));
        assert!(!l.restricts(0));
        assert!(!l.restricts(NO_LOCAL));
        let t = EdgeLabel::transition(GraphId::INVALID, GraphId::INVALID, 0, Cost::ZERO, 0.0);
        assert!(!t.restricts(1));
    }

    #[test]
    fn test_clear() {
        let mut set = LabelSet::new(2);
        for i in 0..10 {
            set.create(label(i, NO_LABEL, i as f32));
        }
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.edge_status(GraphId::new(2, 1, 3).unwrap()), None);
    }
}
