//! Planner configuration, loaded from the `[geofence]`, `[mission_planner]`
//! and `[path_finder]` tables of the navigator's TOML file.
//!
//! Every key is required. The core carries no fallback values.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading the planner configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeofenceConfig {
    /// Half-height of the geofence lookup box, degrees
    pub latitude_delta: f64,
    /// Half-width of the geofence lookup box, degrees
    pub longitude_delta: f64,
    /// Polygon simplification tolerance, meters. 0 disables simplification.
    pub simplification_tolerance_m: f64,
    /// Seconds between geofence regeneration attempts
    pub refresh_delay_s: u64,
    /// Minimum distance travelled before a new fence is generated, meters
    pub min_refresh_distance_m: f64,
    /// Maximum number of vertices uploaded to the autopilot
    pub max_points: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionPlannerConfig {
    /// Maximum waypoints in one upload batch
    pub waypoint_upload_limit: usize,
    /// Legs shorter than this are not worth sailing, meters
    pub min_waypoint_distance_m: f64,
    /// Below this time gap to a moving obstacle the boat waits, seconds
    pub time_offset_collision_s: f64,
    /// Collision corrections tried for one waypoint before giving up
    pub max_collision_retries: usize,
    /// Replan when fewer than this many committed waypoints remain
    pub replan_threshold: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathFinderConfig {
    /// Predicted clearance below which a collision is reported, meters
    pub collision_distance_threshold_m: f64,
    /// Bearing increment applied per collision correction, degrees
    pub direction_change_angle_deg: f64,
    /// Length of a moving obstacle's projected track, meters
    pub obstacle_projection_distance_m: f64,
    /// Track start offset behind the obstacle, meters
    pub obstacle_reverse_epsilon_m: f64,
    /// Boundary lookup box half-width is 10^-exponent degrees
    pub boundary_offset_exponent: i32,
}

/// Complete planner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    pub geofence: GeofenceConfig,
    pub mission_planner: MissionPlannerConfig,
    pub path_finder: PathFinderConfig,
}

impl PlannerConfig {
    /// Parse and validate a configuration document. Unrelated tables (for
    /// example the navigator's `[network]`) are ignored.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: PlannerConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.geofence;
        positive("geofence.latitude_delta", g.latitude_delta)?;
        positive("geofence.longitude_delta", g.longitude_delta)?;
        non_negative("geofence.simplification_tolerance_m", g.simplification_tolerance_m)?;
        non_negative("geofence.min_refresh_distance_m", g.min_refresh_distance_m)?;
        if g.max_points == 0 {
            return Err(invalid("geofence.max_points", "must be at least 1"));
        }

        let m = &self.mission_planner;
        if m.waypoint_upload_limit == 0 {
            return Err(invalid("mission_planner.waypoint_upload_limit", "must be at least 1"));
        }
        if m.max_collision_retries == 0 {
            return Err(invalid("mission_planner.max_collision_retries", "must be at least 1"));
        }
        non_negative("mission_planner.min_waypoint_distance_m", m.min_waypoint_distance_m)?;
        non_negative("mission_planner.time_offset_collision_s", m.time_offset_collision_s)?;

        let p = &self.path_finder;
        non_negative("path_finder.collision_distance_threshold_m", p.collision_distance_threshold_m)?;
        positive("path_finder.direction_change_angle_deg", p.direction_change_angle_deg)?;
        positive("path_finder.obstacle_projection_distance_m", p.obstacle_projection_distance_m)?;
        non_negative("path_finder.obstacle_reverse_epsilon_m", p.obstacle_reverse_epsilon_m)?;
        if !(0..=9).contains(&p.boundary_offset_exponent) {
            return Err(invalid("path_finder.boundary_offset_exponent", "must be within 0..=9"));
        }
        Ok(())
    }

    /// Half-width in degrees of the box queried around the boat for water data
    pub fn boundary_offset_deg(&self) -> f64 {
        10f64.powi(-self.path_finder.boundary_offset_exponent)
    }
}

fn invalid(key: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { key, reason }
}

fn positive(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 { Ok(()) } else { Err(invalid(key, "must be a positive number")) }
}

fn non_negative(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 { Ok(()) } else { Err(invalid(key, "must be a non-negative number")) }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"
        [geofence]
        latitude_delta = 0.01
        longitude_delta = 0.01
        simplification_tolerance_m = 5.0
        refresh_delay_s = 10
        min_refresh_distance_m = 50.0
        max_points = 70

        [mission_planner]
        waypoint_upload_limit = 10
        min_waypoint_distance_m = 30.0
        time_offset_collision_s = 20.0
        max_collision_retries = 8
        replan_threshold = 3

        [path_finder]
        collision_distance_threshold_m = 20.0
        direction_change_angle_deg = 15.0
        obstacle_projection_distance_m = 5000.0
        obstacle_reverse_epsilon_m = 1.0
        boundary_offset_exponent = 3

        [network]
        telemetry_port = 14560
    "#;

    pub(crate) fn sample() -> PlannerConfig {
        PlannerConfig::from_toml_str(SAMPLE).unwrap()
    }

    #[test]
    fn parses_sample_and_ignores_foreign_tables() {
        let cfg = sample();
        assert_eq!(cfg.mission_planner.waypoint_upload_limit, 10);
        assert!((cfg.boundary_offset_deg() - 0.001).abs() < 1e-15);
    }

    #[test]
    fn missing_key_is_an_error() {
        let raw = SAMPLE.replace("max_points = 70", "");
        assert!(matches!(PlannerConfig::from_toml_str(&raw), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn zero_upload_limit_is_rejected() {
        let raw = SAMPLE.replace("waypoint_upload_limit = 10", "waypoint_upload_limit = 0");
        match PlannerConfig::from_toml_str(&raw) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "mission_planner.waypoint_upload_limit"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
