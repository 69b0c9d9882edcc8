use geo::{Distance, Haversine, Point};

/// Great-circle distance in meters between two (lat, lon) positions
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    Haversine.distance(p1, p2)
}

/// Point a fraction `t` of the way from `a` to `b`, both (lat, lon)
pub fn interpolate(a: (f64, f64), b: (f64, f64), t: f64) -> (f64, f64) {
    let t = t.clamp(0.0, 1.0);
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}
