//! Bidirectional A*
//!
//! A forward search from the origin and a reverse search from the destination
//! share nothing but the best meeting found so far. A meeting is an edge
//! labelled by both sides; its cost counts the edge once. The side with the
//! lower frontier minimum pops next, and the search ends when that minimum
//! can no longer beat the best meeting.

use tracing::debug;

use super::expand::DirectionState;
use super::heuristic::Heuristic;
use super::limits::Budget;
use super::location::PathLocation;
use super::{segments_for, Direction, Observer, PathAlgorithm, PathResult, SearchOptions};
use crate::cost::{Cost, DynamicCost};
use crate::error::RouteError;
use crate::graph_id::GraphId;
use crate::store::GraphReader;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Meeting {
    cost: Cost,
    forward: u32,
    reverse: u32,
}

pub struct Bidirectional {
    options: SearchOptions,
    observer: Option<Observer>,
    forward: Option<DirectionState>,
    reverse: Option<DirectionState>,
}

impl Bidirectional {
    pub fn new(options: SearchOptions) -> Self {
        Self {
            options,
            observer: None,
            forward: None,
            reverse: None,
        }
    }

    /// Labels created by the last search, forward and reverse
    pub fn label_counts(&self) -> (usize, usize) {
        (
            self.forward.as_ref().map_or(0, |s| s.labels.len()),
            self.reverse.as_ref().map_or(0, |s| s.labels.len()),
        )
    }
}

/// Cost of the path through forward label `f` and reverse label `r`, both
/// on the same edge
fn meeting_cost(fwd: &DirectionState, rev: &DirectionState, f: u32, r: u32) -> Option<Cost> {
    let fl = fwd.labels.get(f);
    let rl = rev.labels.get(r);
    debug_assert_eq!(fl.edge_id, rl.edge_id);
    if fl.origin && rl.destination {
        // both are seeds: the destination must lie ahead of the origin
        let from = fwd.anchors.get(&f)?;
        let to = rev.anchors.get(&r)?;
        if to.percent < from.percent {
            return None;
        }
    }
    Some(fl.cost + rl.cost - fl.edge_cost)
}

/// Records meetings for every forward/reverse pairing of `labels` (labels of
/// `side`) with the other side's labels on the same edge
fn check_meetings(
    fwd: &DirectionState,
    rev: &DirectionState,
    side: Direction,
    labels: &[u32],
    best: &mut Option<Meeting>,
) {
    let (own, other) = match side {
        Direction::Forward => (fwd, rev),
        Direction::Reverse => (rev, fwd),
    };
    for &idx in labels {
        let label = own.labels.get(idx);
        if label.is_transition() {
            continue;
        }
        for other_idx in other.edge_labels(label.edge_id) {
            let (f, r) = match side {
                Direction::Forward => (idx, other_idx),
                Direction::Reverse => (other_idx, idx),
            };
            let Some(cost) = meeting_cost(fwd, rev, f, r) else {
                continue;
            };
            if best.map_or(true, |m| cost.cost < m.cost.cost) {
                *best = Some(Meeting {
                    cost,
                    forward: f,
                    reverse: r,
                });
            }
        }
    }
}

impl Bidirectional {
    fn run(
        &mut self,
        origin: &PathLocation,
        destination: &PathLocation,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
    ) -> Result<PathResult, RouteError> {
        let factor = costing.a_star_cost_factor();
        let endpoints = vec![(origin.lat, origin.lon), (destination.lat, destination.lon)];
        let options = &self.options;
        let fwd = self.forward.get_or_insert_with(|| {
            DirectionState::new(Direction::Forward, options, Heuristic::zero(), Vec::new())
        });
        fwd.reset(
            options,
            Heuristic::new(vec![(destination.lat, destination.lon)], factor),
            endpoints.clone(),
        );
        let rev = self.reverse.get_or_insert_with(|| {
            DirectionState::new(Direction::Reverse, options, Heuristic::zero(), Vec::new())
        });
        rev.reset(
            options,
            Heuristic::new(vec![(origin.lat, origin.lon)], factor),
            endpoints,
        );
        let observer = &mut self.observer;
        let mut budget = Budget::start(options.limits);
        let mut best: Option<Meeting> = None;

        let seeded_fwd = fwd.seed_origin(reader, costing, origin, None, observer)?;
        let seeded_rev = rev.seed_destination(reader, costing, destination, observer)?;
        if seeded_fwd == 0 || seeded_rev == 0 {
            debug!(seeded_fwd, seeded_rev, "no usable endpoint candidate");
            return Err(RouteError::NoPath);
        }
        let touched = std::mem::take(&mut fwd.touched);
        check_meetings(fwd, rev, Direction::Forward, &touched, &mut best);
        fwd.touched = touched;
        fwd.touched.clear();
        rev.touched.clear();

        // either frontier running dry ends the search: every remaining path
        // would have to pass through it
        while let (Some(fk), Some(rk)) = (fwd.frontier.min_key(), rev.frontier.min_key()) {
            let side = if fk <= rk {
                Direction::Forward
            } else {
                Direction::Reverse
            };
            if best.is_some_and(|m| fk.min(rk) >= m.cost.cost) {
                break;
            }
            budget.tick()?;

            let state = match side {
                Direction::Forward => &mut *fwd,
                Direction::Reverse => &mut *rev,
            };
            let Some(idx) = state.frontier.pop() else {
                break;
            };
            state.settle(idx, observer);
            match side {
                Direction::Forward => fwd.expand_forward(reader, costing, idx, None, observer)?,
                Direction::Reverse => rev.expand_reverse(reader, costing, idx, observer)?,
            }

            let state = match side {
                Direction::Forward => &mut *fwd,
                Direction::Reverse => &mut *rev,
            };
            let mut touched = std::mem::take(&mut state.touched);
            touched.push(idx);
            check_meetings(fwd, rev, side, &touched, &mut best);
            touched.clear();
            match side {
                Direction::Forward => fwd.touched = touched,
                Direction::Reverse => rev.touched = touched,
            }
        }

        let Some(meeting) = best else {
            debug!(
                expansions = budget.expansions(),
                forward_labels = fwd.labels.len(),
                reverse_labels = rev.labels.len(),
                "frontiers exhausted without meeting, no path"
            );
            return Err(RouteError::NoPath);
        };

        let mut edges: Vec<GraphId> = fwd
            .labels
            .edge_chain(meeting.forward)
            .into_iter()
            .map(|i| fwd.labels.get(i).edge_id)
            .collect();
        let reverse_chain = rev.labels.edge_chain(meeting.reverse);
        edges.extend(
            reverse_chain
                .iter()
                .rev()
                .skip(1)
                .map(|&i| rev.labels.get(i).edge_id),
        );

        let start = fwd.anchors[&fwd.labels.root(meeting.forward)];
        let end = rev.anchors[&rev.labels.root(meeting.reverse)];
        let cost = meeting.cost - Cost::new(start.score + end.score, 0.0);
        debug!(
            algorithm = "bidirectional",
            expansions = budget.expansions(),
            forward_labels = fwd.labels.len(),
            reverse_labels = rev.labels.len(),
            edges = edges.len(),
            cost = cost.cost,
            elapsed_us = budget.elapsed().as_micros() as u64,
            "path found"
        );
        Ok(PathResult {
            segments: segments_for(&edges, start.percent, end.percent),
            cost,
            expansions: budget.expansions(),
            algorithm: "bidirectional",
        })
    }
}

impl PathAlgorithm for Bidirectional {
    fn name(&self) -> &'static str {
        "bidirectional"
    }

    fn get_best_path(
        &mut self,
        origin: &PathLocation,
        destination: &PathLocation,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
    ) -> Result<PathResult, RouteError> {
        origin.validate("origin")?;
        destination.validate("destination")?;
        self.run(origin, destination, reader, costing)
    }

    fn clear(&mut self) {
        self.forward = None;
        self.reverse = None;
    }

    fn set_observer(&mut self, observer: Observer) {
        self.observer = Some(observer);
    }
}
