//! mission.rs — Batch waypoint generation for one voyage
//!
//! Planning works on a scratch copy of the boat's cursor state and produces a
//! `BatchPlan`. The plan is applied with `commit`, which refuses plans made
//! against a boat that has changed since. A batch stops at the upload limit,
//! on convergence with the leg destination, when the boat has to wait for a
//! moving obstacle, or when no usable leg can be found.

use std::sync::Arc;
use std::time::Duration;

use sail_types::{GeoPoint, Obstacle};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::boat::{Boat, TackSide, TackState};
use crate::collision::{evaluate_leg, time_to_collision_point, CollisionResult};
use crate::config::PlannerConfig;
use crate::geo_math::{
    angular_difference, haversine_distance, initial_bearing, nearest_point_on_segment, normalize_bearing,
};
use crate::selector::PointSelector;
use crate::tacking::{compute_sailable_bearings, nearest_tack_limit, requires_tacking, TACK_ANGLE_DEG};
use crate::water::WaterBoundaryCache;

/// Latest sensor readings used by one planning run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Readings {
    pub wind_dir_deg: f64,
    pub wind_speed: f64,
    pub boat_speed_mps: f64,
}

/// Why a batch stopped growing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StopReason {
    /// Committed path holds `waypoint_upload_limit` waypoints
    LimitReached,
    /// Leg destination appended as the last waypoint
    DestinationConverged,
    /// A moving obstacle will cross the next leg; retry after this long
    Wait(Duration),
    /// Every collision correction was blocked
    NoPathFound,
    /// The best next leg is shorter than the minimum waypoint distance
    Stalled,
    /// Every leg up to the final destination is already committed
    FinalDestinationReached,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("boat state changed while planning (planned against revision {planned}, now {current})")]
    Stale { planned: u64, current: u64 },
    #[error("no voyage is active")]
    NoActiveVoyage,
}

/// Read-only view of everything one planning run depends on.
pub struct PlanningContext<'a> {
    pub boat: &'a Boat,
    /// Snapshot of the obstacle registry taken for this run
    pub obstacles: &'a [Obstacle],
    pub config: &'a PlannerConfig,
    pub readings: Readings,
}

/// Uncommitted result of a planning run.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    base_revision: u64,
    new_leg: Option<GeoPoint>,
    pub waypoints: Vec<GeoPoint>,
    pub reason: StopReason,
    bearing: f64,
    tack: Option<TackState>,
    last_crossing: Option<GeoPoint>,
}

/// Committed batch, ready for upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub boat_id: u32,
    /// Number of waypoints issued to this boat before the batch
    pub first_index: usize,
    pub waypoints: Vec<GeoPoint>,
    pub reason: StopReason,
}

enum Step {
    Waypoint(GeoPoint),
    TooShort,
    Wait(Duration),
    Exhausted,
}

/// Scratch cursor state for one run
struct Run<'a> {
    selector: PointSelector<'a>,
    cursor: GeoPoint,
    bearing: f64,
    tack: Option<TackState>,
}

/// Start a voyage: the boat begins at `origin` with its first leg selected.
pub fn add_new_mission(boat_id: u32, origin: GeoPoint, destination: GeoPoint) -> Boat {
    info!("new mission for boat {boat_id}: {origin:?} → {destination:?}");
    Boat::new(boat_id, origin, destination)
}

#[derive(Clone)]
pub struct MissionPlanner {
    water: Arc<WaterBoundaryCache>,
}

impl MissionPlanner {
    pub fn new(water: Arc<WaterBoundaryCache>) -> Self {
        Self { water }
    }

    pub fn water(&self) -> &WaterBoundaryCache {
        &self.water
    }

    /// Plan the next batch without touching the boat. The batch only fills
    /// the room left under `waypoint_upload_limit` by the committed path.
    pub fn plan_batch(&self, ctx: &PlanningContext<'_>) -> BatchPlan {
        let boat = ctx.boat;
        let limits = &ctx.config.mission_planner;
        let room = limits.waypoint_upload_limit.saturating_sub(boat.path.len());
        let mut plan = BatchPlan {
            base_revision: boat.revision,
            new_leg: None,
            waypoints: Vec::new(),
            reason: StopReason::LimitReached,
            bearing: boat.bearing,
            tack: boat.tack,
            last_crossing: boat.last_crossing,
        };

        let mut leg = boat.destination;
        if boat.leg_complete() {
            match boat.mid_points.front() {
                Some(&next) => {
                    info!("boat {}: leg to {leg:?} planned, next leg {next:?}", boat.id);
                    plan.new_leg = Some(next);
                    leg = next;
                }
                None => {
                    plan.reason = StopReason::FinalDestinationReached;
                    return plan;
                }
            }
        }

        if room == 0 {
            debug!("boat {}: {} waypoints still committed, nothing to add", boat.id, boat.path.len());
            return plan;
        }

        let mut run = Run {
            selector: PointSelector::new(&self.water, ctx.config.boundary_offset_deg(), boat.last_crossing),
            cursor: boat.last_known_location,
            bearing: boat.bearing,
            tack: boat.tack,
        };

        let reason = loop {
            if plan.waypoints.len() >= room {
                break StopReason::LimitReached;
            }
            if haversine_distance(run.cursor, leg) < limits.min_waypoint_distance_m {
                if run.cursor != leg {
                    plan.waypoints.push(leg);
                }
                break StopReason::DestinationConverged;
            }

            match self.next_waypoint(ctx, &mut run, leg) {
                Step::Waypoint(wp) => {
                    let closest = nearest_point_on_segment(run.cursor, wp, leg);
                    if haversine_distance(closest, leg) < limits.min_waypoint_distance_m {
                        plan.waypoints.push(leg);
                        run.cursor = leg;
                        break StopReason::DestinationConverged;
                    }
                    plan.waypoints.push(wp);
                    run.cursor = wp;
                }
                Step::TooShort => break StopReason::Stalled,
                Step::Wait(d) => break StopReason::Wait(d),
                Step::Exhausted => break StopReason::NoPathFound,
            }
        };

        debug!("boat {}: planned {} waypoints ({reason:?})", boat.id, plan.waypoints.len());
        plan.reason = reason;
        plan.bearing = run.bearing;
        plan.tack = run.tack;
        plan.last_crossing = run.selector.last_crossing();
        plan
    }

    /// Apply a plan to the boat it was made for.
    pub fn commit(boat: &mut Boat, plan: BatchPlan) -> Result<BatchOutcome, PlanError> {
        if boat.revision != plan.base_revision {
            warn!("boat {}: discarding stale batch of {} waypoints", boat.id, plan.waypoints.len());
            return Err(PlanError::Stale { planned: plan.base_revision, current: boat.revision });
        }
        Ok(apply(boat, plan))
    }

    /// Plan and commit in one step while holding the boat exclusively.
    pub fn generate_waypoints(
        &self,
        boat: &mut Boat,
        obstacles: &[Obstacle],
        config: &PlannerConfig,
        readings: Readings,
    ) -> BatchOutcome {
        let plan = self.plan_batch(&PlanningContext { boat: &*boat, obstacles, config, readings });
        apply(boat, plan)
    }

    /// Handle a waypoint-reached report and replan when the committed path
    /// runs low. Returns the new batch, if one was generated.
    pub fn update_mission(
        &self,
        boat: &mut Boat,
        index: usize,
        obstacles: &[Obstacle],
        config: &PlannerConfig,
        readings: Readings,
    ) -> Option<BatchOutcome> {
        boat.advance_to(index);
        if boat.final_destination_reached() {
            info!("boat {}: FINAL DESTINATION REACHED", boat.id);
            return Some(BatchOutcome {
                boat_id: boat.id,
                first_index: boat.issued,
                waypoints: Vec::new(),
                reason: StopReason::FinalDestinationReached,
            });
        }
        if !needs_replan(boat, config) {
            return None;
        }
        Some(self.generate_waypoints(boat, obstacles, config, readings))
    }

    fn next_waypoint(&self, ctx: &PlanningContext<'_>, run: &mut Run<'_>, leg: GeoPoint) -> Step {
        let limits = &ctx.config.mission_planner;
        let path_finder = &ctx.config.path_finder;
        let readings = &ctx.readings;

        let desired = initial_bearing(run.cursor, leg);
        let pair =
            compute_sailable_bearings(desired, readings.wind_dir_deg, readings.wind_speed, readings.boat_speed_mps);
        if requires_tacking(pair) {
            let side = match run.tack {
                Some(t) => t.side,
                None if nearest_tack_limit(desired, pair.0, pair.1) == pair.0 => TackSide::Lower,
                None => TackSide::Upper,
            };
            let mut state = TackState { lower_limit: pair.0, upper_limit: pair.1, side };
            // A tack that loses ground is skipped in favour of the other one
            if angular_difference(state.active_limit(), desired) >= 90.0 {
                state.side = state.side.flipped();
            }
            if run.tack.is_none() {
                info!("tacking between {:.1}° and {:.1}°", pair.0, pair.1);
            }
            run.tack = Some(state);
            run.bearing = normalize_bearing(pair.0 + TACK_ANGLE_DEG);
        } else {
            if run.tack.take().is_some() {
                info!("course {desired:.1}° sailable, tacking ended");
            }
            run.bearing = desired;
        }

        let base = run.selector.next_point(run.cursor, leg, run.bearing);
        let mut length = haversine_distance(run.cursor, base);
        let mut heading = initial_bearing(run.cursor, base);
        if let Some(state) = run.tack {
            heading = state.active_limit();
            let progress = angular_difference(heading, desired).to_radians().cos().max(0.0);
            length = length.min(haversine_distance(run.cursor, leg) * progress);
        }
        if length < limits.min_waypoint_distance_m {
            warn!("next leg from {:?} only {length:.1} m; not worth sailing", run.cursor);
            return Step::TooShort;
        }

        for attempt in 0..=limits.max_collision_retries {
            let candidate = if attempt == 0 && run.tack.is_none() {
                base
            } else {
                let turn = path_finder.direction_change_angle_deg * attempt as f64;
                run.selector.steer(run.cursor, normalize_bearing(heading + turn), length)
            };
            if haversine_distance(run.cursor, candidate) < limits.min_waypoint_distance_m {
                debug!("correction {attempt} runs into the shore");
                continue;
            }

            match evaluate_leg(run.cursor, candidate, readings.boat_speed_mps, ctx.obstacles, path_finder) {
                CollisionResult::Clear => {
                    if let Some(state) = run.tack.as_mut() {
                        state.side = state.side.flipped();
                    }
                    return Step::Waypoint(candidate);
                }
                CollisionResult::Collision(c) if c.is_stationary() => {
                    info!("stationary obstacle at {:?}, turning to {:.1}°", c.at, c.corrective_bearing);
                }
                CollisionResult::Collision(c) => {
                    let gap = time_to_collision_point(run.cursor, c.at, &c.obstacle, readings.boat_speed_mps);
                    if gap < limits.time_offset_collision_s {
                        info!("moving obstacle crosses at {:?} within {gap:.1} s; waiting", c.at);
                        return Step::Wait(Duration::from_secs_f64(gap));
                    }
                    info!(
                        "moving obstacle near {:?} ({:.1} m), turning to {:.1}°",
                        c.at, c.clearance_m, c.corrective_bearing
                    );
                }
            }
        }

        warn!("no clear leg from {:?} after {} corrections", run.cursor, limits.max_collision_retries);
        Step::Exhausted
    }
}

/// Fewer than `replan_threshold` committed waypoints remain and the final
/// destination is not among them.
pub fn needs_replan(boat: &Boat, config: &PlannerConfig) -> bool {
    boat.path.len() < config.mission_planner.replan_threshold
        && boat.path.back() != Some(&boat.final_destination)
}

fn apply(boat: &mut Boat, plan: BatchPlan) -> BatchOutcome {
    if plan.new_leg.is_some() {
        boat.switch_point_to_go();
    }
    let first_index = boat.issued;
    for wp in &plan.waypoints {
        boat.extend(*wp);
    }
    boat.bearing = plan.bearing;
    boat.tack = plan.tack;
    boat.last_crossing = plan.last_crossing;
    boat.wait_time = match plan.reason {
        StopReason::Wait(d) => Some(d),
        _ => None,
    };
    BatchOutcome {
        boat_id: boat.id,
        first_index,
        waypoints: plan.waypoints,
        reason: plan.reason,
    }
}
