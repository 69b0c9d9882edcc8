//! Search budgets and hierarchy pruning

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::RouteError;
use crate::geo::haversine_distance;

/// Caller-imposed budget; exceeding it ends the search with `RouteError::Timeout`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchLimits {
    pub max_expansions: Option<u64>,
    pub timeout: Option<Duration>,
}

impl SearchLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }
}

pub(crate) struct Budget {
    limits: SearchLimits,
    started: Instant,
    expansions: u64,
}

impl Budget {
    pub fn start(limits: SearchLimits) -> Self {
        Self {
            limits,
            started: Instant::now(),
            expansions: 0,
        }
    }

    pub fn expansions(&self) -> u64 {
        self.expansions
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Count one expansion; fail once the budget is spent
    pub fn tick(&mut self) -> Result<(), RouteError> {
        self.expansions += 1;
        let over_count = self
            .limits
            .max_expansions
            .is_some_and(|max| self.expansions > max);
        let over_time = self
            .limits
            .timeout
            .is_some_and(|t| self.started.elapsed() > t);
        if over_count || over_time {
            return Err(RouteError::Timeout {
                expansions: self.expansions - 1,
                elapsed: self.started.elapsed(),
            });
        }
        Ok(())
    }
}

/// Per-level pruning. A level stops expanding at junctions farther than
/// `expand_within_distance_m` from both endpoints once the search has taken
/// more than `max_up_transitions` transitions up from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HierarchyLimits {
    pub max_up_transitions: u32,
    pub expand_within_distance_m: f64,
}

impl HierarchyLimits {
    pub fn unlimited() -> Self {
        Self {
            max_up_transitions: u32::MAX,
            expand_within_distance_m: f64::INFINITY,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_up_transitions == u32::MAX || self.expand_within_distance_m.is_infinite()
    }
}

impl Default for HierarchyLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Hierarchy limits plus the up-transition counters of one search direction
#[derive(Debug, Clone)]
pub(crate) struct HierarchyState {
    limits: Vec<HierarchyLimits>,
    up_transitions: Vec<u32>,
    endpoints: Vec<(f64, f64)>,
}

impl HierarchyState {
    pub fn new(limits: &[HierarchyLimits], endpoints: Vec<(f64, f64)>) -> Self {
        Self {
            limits: limits.to_vec(),
            up_transitions: vec![0; limits.len()],
            endpoints,
        }
    }

    pub fn record_up_transition(&mut self, from_level: u8) {
        if let Some(count) = self.up_transitions.get_mut(from_level as usize) {
            *count = count.saturating_add(1);
        }
    }

    pub fn up_transitions(&self, level: u8) -> u32 {
        self.up_transitions.get(level as usize).copied().unwrap_or(0)
    }

    pub fn stop_expanding(&self, level: u8, lat: f64, lon: f64) -> bool {
        let Some(limits) = self.limits.get(level as usize) else {
            return false;
        };
        if limits.is_unlimited() || self.up_transitions(level) <= limits.max_up_transitions {
            return false;
        }
        self.endpoints.iter().all(|&(elat, elon)| {
            haversine_distance(lat, lon, elat, elon) > limits.expand_within_distance_m
        })
    }
}
