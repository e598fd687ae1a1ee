//! tacking.rs — Decides between direct sailing and tacking
//!
//! The wind vector minus the boat's desired-heading vector gives the
//! apparent wind direction net of travel. A desired bearing within 90° of
//! that direction cannot be sailed directly; the boat alternates between
//! two legs 35° either side of the apparent wind instead.

use crate::geo_math::{angular_difference, normalize_bearing};

/// Offset of each tack leg from the apparent wind, degrees
pub const TACK_ANGLE_DEG: f64 = 35.0;

/// Sector either side of the apparent wind that cannot be sailed directly
pub const NO_GO_HALF_ANGLE_DEG: f64 = 90.0;

// Courses exactly on the no-go edge count as sailable
const EDGE_TOLERANCE_DEG: f64 = 1e-9;

/// Apparent wind weaker than this has no direction, m/s
pub const CALM_WIND_MPS: f64 = 1e-6;

/// Returns `(left, right)` candidate bearings.
///
/// When tacking is needed these are the two tack legs. When the course can be
/// sailed directly both elements are equal (the apparent wind direction, for
/// sail trim); callers treat an equal pair as "no tacking needed". In a
/// calm there is no wind to tack against and the desired bearing is returned
/// twice.
pub fn compute_sailable_bearings(
    desired_bearing: f64,
    wind_dir: f64,
    wind_speed: f64,
    boat_speed: f64,
) -> (f64, f64) {
    let Some(apparent) = apparent_wind_direction(desired_bearing, wind_dir, wind_speed, boat_speed) else {
        let course = normalize_bearing(desired_bearing);
        return (course, course);
    };
    if angular_difference(desired_bearing, apparent) < NO_GO_HALF_ANGLE_DEG - EDGE_TOLERANCE_DEG {
        (
            normalize_bearing(apparent - TACK_ANGLE_DEG),
            normalize_bearing(apparent + TACK_ANGLE_DEG),
        )
    } else {
        (apparent, apparent)
    }
}

/// True when a `(left, right)` pair from [`compute_sailable_bearings`] asks for tacking
pub fn requires_tacking(bearings: (f64, f64)) -> bool {
    bearings.0 != bearings.1
}

/// Direction of (wind vector − desired-heading vector), degrees; `None` when
/// the two cancel out.
pub fn apparent_wind_direction(desired_bearing: f64, wind_dir: f64, wind_speed: f64, boat_speed: f64) -> Option<f64> {
    let (wr, br) = (wind_dir.to_radians(), desired_bearing.to_radians());
    let x = wind_speed * wr.cos() - boat_speed * br.cos();
    let y = wind_speed * wr.sin() - boat_speed * br.sin();
    if x.hypot(y) < CALM_WIND_MPS {
        return None;
    }
    Some(normalize_bearing(y.atan2(x).to_degrees()))
}

/// Tack limit nearest to `bearing`; ties go to `upper`.
pub fn nearest_tack_limit(bearing: f64, lower: f64, upper: f64) -> f64 {
    if angular_difference(bearing, upper) > angular_difference(bearing, lower) {
        lower
    } else {
        upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        angular_difference(a, b) < tol
    }

    #[test]
    fn upwind_course_tacks_without_boat_speed() {
        let (l, r) = compute_sailable_bearings(130.0, 195.0, 25.0, 0.0);
        assert!(close(l, 160.0, 0.1) && close(r, 230.0, 0.1), "({l}, {r})");
    }

    #[test]
    fn upwind_course_wraps_through_north() {
        let (l, r) = compute_sailable_bearings(320.0, 350.0, 25.0, 0.0);
        assert!(close(l, 315.0, 0.1) && close(r, 25.0, 0.1), "({l}, {r})");
    }

    #[test]
    fn upwind_course_tacks_with_boat_speed() {
        let (l, r) = compute_sailable_bearings(130.0, 195.0, 25.0, 5.0);
        assert!(close(l, 171.19, 0.1) && close(r, 241.19, 0.1), "({l}, {r})");

        let (l, r) = compute_sailable_bearings(320.0, 350.0, 25.0, 5.0);
        assert!(close(l, 321.89, 0.1) && close(r, 31.89, 0.1), "({l}, {r})");
    }

    #[test]
    fn off_wind_course_sails_direct() {
        let pair = compute_sailable_bearings(105.0, 195.0, 25.0, 0.0);
        assert!(close(pair.0, 195.0, 0.1) && close(pair.1, 195.0, 0.1), "{pair:?}");
        assert!(!requires_tacking(pair));

        let pair = compute_sailable_bearings(80.0, 350.0, 25.0, 0.0);
        assert!(close(pair.0, 350.0, 0.1) && !requires_tacking(pair), "{pair:?}");
    }

    #[test]
    fn off_wind_course_with_boat_speed() {
        let pair = compute_sailable_bearings(114.0, 195.0, 25.0, 5.0);
        assert!(close(pair.0, 206.52, 0.1) && !requires_tacking(pair), "{pair:?}");

        let pair = compute_sailable_bearings(80.0, 350.0, 25.0, 5.0);
        assert!(close(pair.0, 338.69, 0.1) && !requires_tacking(pair), "{pair:?}");
    }

    #[test]
    fn calm_sails_the_desired_bearing() {
        let pair = compute_sailable_bearings(10.0, 0.0, 0.0, 0.0);
        assert_eq!(pair, (10.0, 10.0));
        assert!(!requires_tacking(pair));

        // Wind and boat speed cancelling out is a calm too
        let pair = compute_sailable_bearings(90.0, 90.0, 4.0, 4.0);
        assert!(!requires_tacking(pair), "{pair:?}");
        assert!(apparent_wind_direction(90.0, 90.0, 4.0, 4.0).is_none());
    }

    #[test]
    fn nearest_limit_handles_wraparound() {
        assert_eq!(nearest_tack_limit(350.0, 315.0, 25.0), 25.0);
        assert_eq!(nearest_tack_limit(300.0, 315.0, 25.0), 315.0);
    }
}
