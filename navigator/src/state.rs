use std::sync::Arc;

use sail_planner::{BatchOutcome, Boat, Readings};
use sail_types::GeoPoint;
use serde::Serialize;
use tokio::sync::RwLock;

// ─── Shared State ────────────────────────────────────────────────────────────

pub type SharedState = Arc<RwLock<NavState>>;

/// Everything the daemon knows about the vehicle. Written by the telemetry
/// hub and the planning task; read by the HTTP status surface.
#[derive(Debug, Default, Serialize)]
pub struct NavState {
    pub boat: Option<Boat>,
    /// Set by the first wind report; planning waits for it
    pub wind_received: bool,
    /// Direction the wind blows from, degrees
    pub wind_dir_deg: f64,
    pub wind_speed: f64,
    pub boat_speed_mps: f64,
    /// Latest GPS fix
    pub position: Option<GeoPoint>,
    pub last_outcome: Option<BatchOutcome>,
    pub fence_points: usize,
    pub mission_complete: bool,
}

impl NavState {
    /// Readings to plan with, once the wind is known.
    pub fn readings(&self) -> Option<Readings> {
        self.wind_received.then(|| Readings {
            wind_dir_deg: self.wind_dir_deg,
            wind_speed: self.wind_speed,
            boat_speed_mps: self.boat_speed_mps,
        })
    }
}

// ─── Status Snapshot ─────────────────────────────────────────────────────────

/// Body of `GET /mission`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionStatus {
    pub active: bool,
    pub complete: bool,
    pub boat_id: Option<u32>,
    pub destination: Option<GeoPoint>,
    pub final_destination: Option<GeoPoint>,
    pub position: Option<GeoPoint>,
    pub remaining: Vec<GeoPoint>,
    pub reached: usize,
    pub tacking: bool,
    pub awaiting_wind: bool,
    pub last_batch: Option<BatchOutcome>,
    pub fence_points: usize,
}

impl MissionStatus {
    pub fn from_state(state: &NavState) -> Self {
        let boat = state.boat.as_ref();
        Self {
            active: boat.is_some() && !state.mission_complete,
            complete: state.mission_complete,
            boat_id: boat.map(Boat::id),
            destination: boat.map(Boat::destination),
            final_destination: boat.map(Boat::final_destination),
            position: state.position,
            remaining: boat.map(Boat::path).unwrap_or_default(),
            reached: boat.map_or(0, Boat::wp_index),
            tacking: boat.is_some_and(Boat::is_tacking),
            awaiting_wind: !state.wind_received,
            last_batch: state.last_outcome.clone(),
            fence_points: state.fence_points,
        }
    }
}
