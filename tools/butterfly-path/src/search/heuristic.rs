//! A* distance heuristic

use crate::geo::haversine_distance;

/// Straight-line distance to the nearest target, scaled to cost units
#[derive(Debug, Clone, Default)]
pub struct Heuristic {
    targets: Vec<(f64, f64)>,
    factor: f32,
}

impl Heuristic {
    pub fn new(targets: Vec<(f64, f64)>, factor: f32) -> Self {
        Self { targets, factor }
    }

    /// Always zero: plain Dijkstra
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.factor <= 0.0 || self.targets.is_empty()
    }

    pub fn estimate(&self, lat: f64, lon: f64) -> f32 {
        if self.is_zero() {
            return 0.0;
        }
        let meters = self
            .targets
            .iter()
            .map(|&(tlat, tlon)| haversine_distance(lat, lon, tlat, tlon))
            .fold(f64::INFINITY, f64::min);
        meters as f32 * self.factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(Heuristic::zero().estimate(50.0, 4.0), 0.0);
        assert!(Heuristic::new(vec![(50.0, 4.0)], 0.0).is_zero());
    }

    #[test]
    fn test_nearest_target() {
        let h = Heuristic::new(vec![(50.0, 4.0), (50.0, 4.1)], 1.0);
        let near = h.estimate(50.0, 4.09);
        let d = haversine_distance(50.0, 4.09, 50.0, 4.1) as f32;
        assert!((near - d).abs() < 1e-3);
        assert_eq!(h.estimate(50.0, 4.0), 0.0);
    }

    #[test]
    fn test_scaled() {
        let h = Heuristic::new(vec![(0.0, 0.0)], 0.5);
        let d = haversine_distance(0.0, 0.01, 0.0, 0.0) as f32;
        assert!((h.estimate(0.0, 0.01) - d * 0.5).abs() < 1e-3);
    }
}
