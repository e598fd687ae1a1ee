//! sail-planner — Waypoint generation for an autonomous sailboat
//!
//! Synchronous core: given the boat's voyage state, the known obstacles and
//! the navigable-water outline, produce bounded batches of waypoints that stay
//! in water, avoid predicted collisions and respect the wind.
//!
//! Network access is confined to the [`water::WaterDataProvider`] and
//! [`autopilot::AutopilotSink`] implementations supplied by the host.

pub mod autopilot;
pub mod boat;
pub mod collision;
pub mod config;
pub mod geo_math;
pub mod geofence;
pub mod mission;
pub mod obstacles;
pub mod selector;
pub mod tacking;
pub mod water;

pub use autopilot::AutopilotSink;
pub use boat::{Boat, TackSide, TackState};
pub use collision::{evaluate_leg, time_to_collision_point, Collision, CollisionResult};
pub use config::{ConfigError, GeofenceConfig, MissionPlannerConfig, PathFinderConfig, PlannerConfig};
pub use geofence::{fetch_geofence, GeofenceRefresh};
pub use mission::{
    add_new_mission, needs_replan, BatchOutcome, BatchPlan, MissionPlanner, PlanError, PlanningContext, Readings,
    StopReason,
};
pub use obstacles::ObstacleRegistry;
pub use tacking::compute_sailable_bearings;
pub use water::{WaterBoundaryCache, WaterDataError, WaterDataProvider};
