//! geo_math.rs — Great-circle and planar helpers on (lon, lat) points
//!
//! Formulas follow the spherical-earth model: mean radius 6,371 km, so
//! distances carry ≤0.5% error against the ellipsoid. Good enough for
//! waypoint spacing; not for survey work.
//!
//! All distances are meters, all angles are degrees unless a name says
//! otherwise.

use sail_types::GeoPoint;

/// Mean radius of the Earth, meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance represented by one degree of latitude, meters
pub const LATITUDE_DEGREE_M: f64 = 111_000.0;

/// Great-circle distance between two points (haversine).
pub fn haversine_distance(p1: GeoPoint, p2: GeoPoint) -> f64 {
    let dlat = (p1.lat - p2.lat).to_radians();
    let dlon = (p1.lon - p2.lon).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + p1.lat.to_radians().cos() * p2.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Forward azimuth from `p1` towards `p2`, in [0, 360).
pub fn initial_bearing(p1: GeoPoint, p2: GeoPoint) -> f64 {
    let (lat1, lat2) = (p1.lat.to_radians(), p2.lat.to_radians());
    let dlon = (p2.lon - p1.lon).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_bearing(y.atan2(x).to_degrees())
}

/// Point reached by travelling `distance_m` from `p1` along the great circle
/// with initial bearing `bearing_deg`. Negative distances travel backwards.
pub fn destination_point(p1: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let angular = distance_m / EARTH_RADIUS_M;
    let lat1 = p1.lat.to_radians();
    let brg = bearing_deg.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * brg.cos())
        .clamp(-1.0, 1.0)
        .asin();
    let lon2 = p1.lon.to_radians()
        + (brg.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(normalize_longitude(lon2.to_degrees()), lat2.to_degrees())
}

/// Flat-plane distance in degree units. Short-range comparisons only.
pub fn planar_distance(p1: GeoPoint, p2: GeoPoint) -> f64 {
    ((p2.lon - p1.lon).powi(2) + (p2.lat - p1.lat).powi(2)).sqrt()
}

/// Closest point to `p` on the segment `a`→`b`, computed in degree space.
pub fn nearest_point_on_segment(a: GeoPoint, b: GeoPoint, p: GeoPoint) -> GeoPoint {
    let (dx, dy) = (b.lon - a.lon, b.lat - a.lat);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return a;
    }
    let t = (((p.lon - a.lon) * dx + (p.lat - a.lat) * dy) / len2).clamp(0.0, 1.0);
    a.lerp(b, t)
}

/// Wrap any angle into [0, 360)
pub fn normalize_bearing(deg: f64) -> f64 {
    let b = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negatives
    if b >= 360.0 { 0.0 } else { b }
}

/// Smallest absolute angle between two bearings, in [0, 180]
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 { 360.0 - d } else { d }
}

fn normalize_longitude(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn haversine_matches_reference_distance() {
        let d = haversine_distance(GeoPoint::new(45.3425, 50.5678), GeoPoint::new(45.2573, 51.7325));
        assert!((d - 129_600.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn bearing_matches_reference() {
        let b = initial_bearing(GeoPoint::new(50.0, 50.0), GeoPoint::new(51.0, 50.5));
        assert!((b - 51.5933).abs() < 1e-3, "got {b}");
    }

    #[test]
    fn planar_distance_is_pythagorean() {
        assert_eq!(planar_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn destination_point_matches_reference() {
        let p = destination_point(GeoPoint::new(50.0, 50.0), 143.0, 56_700.0);
        assert!((p.lon - 50.4734).abs() < 1e-3, "lon {}", p.lon);
        assert!((p.lat - 49.5918).abs() < 1e-3, "lat {}", p.lat);
    }

    #[test]
    fn destination_point_wraps_longitude() {
        let p = destination_point(GeoPoint::new(179.99, 0.0), 90.0, 5_000.0);
        assert!(p.lon < -179.0, "lon {}", p.lon);
    }

    #[test]
    fn haversine_is_symmetric_and_zero_on_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let a = GeoPoint::new(rng.gen_range(-180.0..180.0), rng.gen_range(-85.0..85.0));
            let b = GeoPoint::new(rng.gen_range(-180.0..180.0), rng.gen_range(-85.0..85.0));
            let ab = haversine_distance(a, b);
            let ba = haversine_distance(b, a);
            assert!((ab - ba).abs() <= 1e-6 * ab.max(1.0));
            assert_eq!(haversine_distance(a, a), 0.0);
        }
    }

    #[test]
    fn bearing_round_trips_through_destination_point() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let p = GeoPoint::new(rng.gen_range(-180.0..180.0), rng.gen_range(-80.0..80.0));
            let b = rng.gen_range(0.0..360.0);
            let d = rng.gen_range(1.0..200_000.0);
            let q = destination_point(p, b, d);
            let back = initial_bearing(p, q);
            assert!(angular_difference(back, b) < 1e-3, "b={b} back={back} d={d}");
        }
    }

    #[test]
    fn angular_difference_handles_wraparound() {
        assert!((angular_difference(350.0, 10.0) - 20.0).abs() < 1e-12);
        assert!((angular_difference(10.0, 350.0) - 20.0).abs() < 1e-12);
        assert!((angular_difference(90.0, 270.0) - 180.0).abs() < 1e-12);
    }

    #[test]
    fn nearest_point_clamps_to_segment() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(10.0, 0.0);
        assert_eq!(nearest_point_on_segment(a, b, GeoPoint::new(5.0, 3.0)), GeoPoint::new(5.0, 0.0));
        assert_eq!(nearest_point_on_segment(a, b, GeoPoint::new(-4.0, 1.0)), a);
        assert_eq!(nearest_point_on_segment(a, b, GeoPoint::new(14.0, 1.0)), b);
    }
}
