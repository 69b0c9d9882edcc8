//! Unidirectional search: Dijkstra, or A* with the straight-line heuristic

use tracing::debug;

use super::expand::{destinations, DirectionState};
use super::heuristic::Heuristic;
use super::limits::Budget;
use super::location::PathLocation;
use super::{segments_for, Direction, Observer, PathAlgorithm, PathResult, SearchOptions};
use crate::cost::{Cost, DynamicCost};
use crate::error::RouteError;
use crate::graph_id::GraphId;
use crate::store::GraphReader;

pub struct AStar {
    options: SearchOptions,
    use_heuristic: bool,
    observer: Option<Observer>,
    state: Option<DirectionState>,
}

impl AStar {
    /// Zero heuristic: labels settle in plain cost order
    pub fn dijkstra(options: SearchOptions) -> Self {
        Self {
            options,
            use_heuristic: false,
            observer: None,
            state: None,
        }
    }

    pub fn astar(options: SearchOptions) -> Self {
        Self {
            use_heuristic: true,
            ..Self::dijkstra(options)
        }
    }

    /// Labels created by the last search
    pub fn label_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.labels.len())
    }

    fn run(
        &mut self,
        origin: &PathLocation,
        destination: &PathLocation,
        reader: &mut GraphReader,
        costing: &dyn DynamicCost,
    ) -> Result<PathResult, RouteError> {
        let heuristic = if self.use_heuristic {
            Heuristic::new(vec![(destination.lat, destination.lon)], costing.a_star_cost_factor())
        } else {
            Heuristic::zero()
        };
        let endpoints = vec![(origin.lat, origin.lon), (destination.lat, destination.lon)];
        let name = self.name();
        let state = self.state.get_or_insert_with(|| {
            DirectionState::new(Direction::Forward, &self.options, Heuristic::zero(), Vec::new())
        });
        state.reset(&self.options, heuristic, endpoints);
        let observer = &mut self.observer;

        let dests = destinations(destination);
        let mut budget = Budget::start(self.options.limits);
        if state.seed_origin(reader, costing, origin, Some(&dests), observer)? == 0 {
            debug!("no usable origin candidate");
            return Err(RouteError::NoPath);
        }

        while let Some(idx) = state.frontier.pop() {
            budget.tick()?;
            state.touched.clear();

            let label = state.labels.get(idx);
            if label.destination {
                let chain = state.labels.edge_chain(idx);
                let root = chain[0];
                let edges: Vec<GraphId> = chain.iter().map(|&i| state.labels.get(i).edge_id).collect();
                let start = state.anchors[&root];
                let Some(end) = edges.last().and_then(|e| dests.get(e)) else {
                    return Err(RouteError::InvalidInput(
                        "destination label without a destination candidate".into(),
                    ));
                };
                // a same-edge seed already folds the destination score into its anchor
                let scores = if idx == root {
                    start.score
                } else {
                    start.score + end.score
                };
                let cost = label.cost - Cost::new(scores, 0.0);
                debug!(
                    algorithm = name,
                    expansions = budget.expansions(),
                    labels = state.labels.len(),
                    edges = edges.len(),
                    cost = cost.cost,
                    elapsed_us = budget.elapsed().as_micros() as u64,
                    "path found"
                );
                return Ok(PathResult {
                    segments: segments_for(&edges, start.percent, end.percent),
                    cost,
                    expansions: budget.expansions(),
                    algorithm: name,
                });
            }

            state.settle(idx, observer);
            state.expand_forward(reader, costing, idx, Some(&dests), observer)?;
        }

        debug!(
            algorithm = name,
            expansions = budget.expansions(),
            labels = state.labels.len(),
            "frontier exhausted, no path"
        );
        Err(RouteError::NoPath)
    }
}

impl PathAlgorithm for AStar {
    fn name(&self) -> &'static str {
        if self.use_heuristic {
            "astar"
        } else {
            "dijkstra"
        }
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
        self.state = None;
    }

    fn set_observer(&mut self, observer: Observer) {
        self.observer = Some(observer);
    }
}
