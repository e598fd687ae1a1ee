//! collision.rs — Predicts whether a proposed leg conflicts with a known obstacle
//!
//! Stationary obstacles are tested geometrically against the leg. Moving
//! obstacles are projected along their heading; where the leg crosses that
//! track, the obstacle's extent is advanced by the time the boat needs to get
//! there and the remaining clearance is measured.

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Intersects, Line};
use sail_types::{GeoPoint, Obstacle};
use tracing::debug;

use crate::config::PathFinderConfig;
use crate::geo_math::{destination_point, haversine_distance, initial_bearing, normalize_bearing};

/// Obstacles slower than this are treated as stationary, m/s
pub const STATIONARY_SPEED_MPS: f64 = 1e-4;

const MIN_BOAT_SPEED_MPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    /// Obstacle centroid for stationary obstacles, otherwise the crossing of
    /// the leg with the obstacle's projected track
    pub at: GeoPoint,
    pub obstacle: Obstacle,
    /// Predicted clearance at `at`, meters (0 when inside the extent)
    pub clearance_m: f64,
    /// Bearing of the leg plus one correction increment
    pub corrective_bearing: f64,
}

impl Collision {
    pub fn is_stationary(&self) -> bool {
        self.obstacle.speed_mps < STATIONARY_SPEED_MPS
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollisionResult {
    Clear,
    Collision(Collision),
}

/// Check the leg `start → end` against every obstacle, in registry order, and
/// report the first whose predicted clearance is below the threshold.
pub fn evaluate_leg(
    start: GeoPoint,
    end: GeoPoint,
    boat_speed: f64,
    obstacles: &[Obstacle],
    config: &PathFinderConfig,
) -> CollisionResult {
    for obstacle in obstacles {
        let Some((at, clearance_m)) = predict_clearance(start, end, boat_speed, obstacle, config) else {
            continue;
        };
        if clearance_m < config.collision_distance_threshold_m {
            let corrective_bearing =
                normalize_bearing(initial_bearing(start, end) + config.direction_change_angle_deg);
            debug!("leg {start:?} → {end:?} conflicts at {at:?}, clearance {clearance_m:.1} m");
            return CollisionResult::Collision(Collision {
                at,
                obstacle: obstacle.clone(),
                clearance_m,
                corrective_bearing,
            });
        }
    }
    CollisionResult::Clear
}

/// Point of closest interaction and predicted clearance for one obstacle, or
/// `None` when the leg never meets it.
pub fn predict_clearance(
    start: GeoPoint,
    end: GeoPoint,
    boat_speed: f64,
    obstacle: &Obstacle,
    config: &PathFinderConfig,
) -> Option<(GeoPoint, f64)> {
    let leg = Line::new(start.to_coord(), end.to_coord());

    if obstacle.speed_mps < STATIONARY_SPEED_MPS {
        return leg.intersects(&obstacle.polygon()).then(|| (obstacle.centroid(), 0.0));
    }

    // Track starts a little behind the obstacle so a leg through its centre still crosses it
    let origin = destination_point(obstacle.centroid(), obstacle.heading_deg, -config.obstacle_reverse_epsilon_m);
    let tip = destination_point(origin, obstacle.heading_deg, config.obstacle_projection_distance_m);
    let track = Line::new(origin.to_coord(), tip.to_coord());

    let crossing: GeoPoint = match line_intersection(leg, track)? {
        LineIntersection::SinglePoint { intersection, .. } => intersection.into(),
        LineIntersection::Collinear { intersection } => intersection.start.into(),
    };

    let t = if boat_speed > MIN_BOAT_SPEED_MPS {
        haversine_distance(start, crossing) / boat_speed
    } else {
        0.0
    };
    let moved = destination_point(origin, obstacle.heading_deg, obstacle.speed_mps * t);
    let extent = obstacle.extent.translated(moved.lon - origin.lon, moved.lat - origin.lat);

    let clearance = if extent.contains_point(crossing) {
        0.0
    } else {
        haversine_distance(crossing, extent.clamp(crossing))
    };
    Some((crossing, clearance))
}

/// Gap in seconds between the boat and the obstacle arriving at `point`.
/// Infinite when either of them is not moving.
pub fn time_to_collision_point(boat_position: GeoPoint, point: GeoPoint, obstacle: &Obstacle, boat_speed: f64) -> f64 {
    if boat_speed <= MIN_BOAT_SPEED_MPS || obstacle.speed_mps < STATIONARY_SPEED_MPS {
        return f64::INFINITY;
    }
    let boat_t = haversine_distance(boat_position, point) / boat_speed;
    let obstacle_t = haversine_distance(obstacle.centroid(), point) / obstacle.speed_mps;
    (boat_t - obstacle_t).abs()
}
