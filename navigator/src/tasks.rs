//! tasks.rs — Planner and geofence background tasks
//!
//! Planning runs on the blocking pool against a snapshot of the boat; the
//! resulting batch is committed under the state write lock and discarded if
//! telemetry changed the boat in the meantime.

use std::sync::Arc;
use std::time::Duration;

use sail_planner::{
    add_new_mission, fetch_geofence, needs_replan, AutopilotSink, GeofenceRefresh, MissionPlanner, ObstacleRegistry,
    PlanError, PlannerConfig, PlanningContext, StopReason,
};
use sail_types::GeoPoint;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::state::SharedState;

/// Attempts at committing a batch before giving up on a busy boat
const COMMIT_ATTEMPTS: usize = 3;

/// Shortest pause before replanning after a wait result
const MIN_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub enum NavEvent {
    StartMission { boat_id: u32, origin: GeoPoint, destination: GeoPoint },
    WaypointReached(usize),
    Replan,
}

/// Handles shared by the background tasks.
pub struct Navigator {
    pub planner: MissionPlanner,
    pub config: Arc<PlannerConfig>,
    pub obstacles: Arc<ObstacleRegistry>,
    pub uplink: Arc<dyn AutopilotSink>,
    pub state: SharedState,
    pub events: mpsc::Sender<NavEvent>,
}

// ── Planner Task ──────────────────────────────────────────────────────────────

pub async fn run_planner(nav: Arc<Navigator>, mut events: mpsc::Receiver<NavEvent>) {
    info!("⚓ Planner task running");
    while let Some(event) = events.recv().await {
        match event {
            NavEvent::StartMission { boat_id, origin, destination } => {
                {
                    let mut s = nav.state.write().await;
                    s.boat = Some(add_new_mission(boat_id, origin, destination));
                    s.last_outcome = None;
                    s.mission_complete = false;
                }
                plan_and_upload(&nav).await;
            }
            NavEvent::WaypointReached(index) => match on_waypoint_reached(&nav, index).await {
                Ok(true) => plan_and_upload(&nav).await,
                Ok(false) => {}
                Err(e) => warn!("waypoint {index} reported: {e}"),
            },
            NavEvent::Replan => plan_and_upload(&nav).await,
        }
    }
    warn!("Planner task: event channel closed");
}

/// Apply the acknowledgement. Returns whether a new batch is needed.
async fn on_waypoint_reached(nav: &Navigator, index: usize) -> Result<bool, PlanError> {
    let mut s = nav.state.write().await;
    let state = &mut *s;
    let boat = state.boat.as_mut().ok_or(PlanError::NoActiveVoyage)?;
    boat.advance_to(index);
    if boat.final_destination_reached() {
        info!("🏁 Boat {}: FINAL DESTINATION REACHED", boat.id());
        state.mission_complete = true;
        return Ok(false);
    }
    Ok(needs_replan(boat, &nav.config))
}

async fn plan_and_upload(nav: &Arc<Navigator>) {
    for attempt in 1..=COMMIT_ATTEMPTS {
        let (boat, readings) = {
            let s = nav.state.read().await;
            match (&s.boat, s.readings()) {
                (Some(_), _) if s.mission_complete => return,
                (Some(b), Some(r)) => (b.clone(), r),
                (Some(b), None) => {
                    info!("Planner: boat {} waiting for a wind report", b.id());
                    return;
                }
                (None, _) => return,
            }
        };
        let obstacles = nav.obstacles.snapshot();

        let worker = nav.clone();
        let planned = tokio::task::spawn_blocking(move || {
            worker.planner.plan_batch(&PlanningContext {
                boat: &boat,
                obstacles: &obstacles,
                config: &worker.config,
                readings,
            })
        })
        .await;
        let plan = match planned {
            Ok(p) => p,
            Err(e) => {
                error!("Planner: planning task failed: {e}");
                return;
            }
        };

        let outcome = {
            let mut s = nav.state.write().await;
            let state = &mut *s;
            let Some(boat) = state.boat.as_mut() else { return };
            match MissionPlanner::commit(boat, plan) {
                Ok(o) => {
                    state.last_outcome = Some(o.clone());
                    o
                }
                Err(e) => {
                    debug!("Planner: attempt {attempt}: {e}");
                    continue;
                }
            }
        };

        let (id, count) = (outcome.boat_id, outcome.waypoints.len());
        info!("Planner: boat {id} batch of {count} waypoints ({:?})", outcome.reason);
        nav.uplink.publish_batch(&outcome);

        if let Some(after) = retry_delay(&outcome.reason, &nav.config) {
            schedule_replan(nav, after);
        }
        return;
    }
    warn!("Planner: boat state kept changing, batch abandoned after {COMMIT_ATTEMPTS} attempts");
}

/// When to plan again without an acknowledgement from the autopilot. Waits
/// follow the crossing traffic; a boat that could not advance retries on the
/// geofence cadence, by which time wind, traffic or water data may have changed.
fn retry_delay(reason: &StopReason, config: &PlannerConfig) -> Option<Duration> {
    match reason {
        StopReason::Wait(d) => Some((*d).max(MIN_WAIT)),
        StopReason::NoPathFound | StopReason::Stalled => {
            warn!("Planner: could not advance ({reason:?}), retrying");
            Some(Duration::from_secs(config.geofence.refresh_delay_s).max(MIN_WAIT))
        }
        _ => None,
    }
}

fn schedule_replan(nav: &Navigator, after: Duration) {
    info!("Planner: replanning in {:.1}s", after.as_secs_f64());
    let events = nav.events.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if events.send(NavEvent::Replan).await.is_err() {
            debug!("Planner: gone before delayed replan");
        }
    });
}

// ── Geofence Refresh Task ─────────────────────────────────────────────────────

pub async fn run_geofence_refresh(nav: Arc<Navigator>) {
    let period = Duration::from_secs(nav.config.geofence.refresh_delay_s.max(1));
    let mut ticker = interval(period);
    let mut refresh = GeofenceRefresh::default();
    info!("🗺  Geofence refresh every {}s", period.as_secs());

    loop {
        ticker.tick().await;
        let Some(position) = nav.state.read().await.position else { continue };
        if !refresh.due(position, &nav.config.geofence) {
            continue;
        }

        let worker = nav.clone();
        let fence = match tokio::task::spawn_blocking(move || {
            fetch_geofence(worker.planner.water(), position, &worker.config.geofence)
        })
        .await
        {
            Ok(f) => f,
            Err(e) => {
                error!("Geofence: task failed: {e}");
                continue;
            }
        };
        if fence.is_empty() {
            continue;
        }

        nav.uplink.upload_geofence(position, &fence);
        refresh.mark(position);
        nav.state.write().await.fence_points = fence.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, LineString, MultiLineString};
    use sail_planner::{BatchOutcome, WaterBoundaryCache, WaterDataError, WaterDataProvider};
    use sail_types::{BoundingRegion, OsmNodeData};
    use tokio::sync::RwLock;

    use crate::state::NavState;

    /// Only unresolved coastline around the boat: every leg stalls
    struct CoastOnly;

    impl WaterDataProvider for CoastOnly {
        fn query(&self, region: &BoundingRegion) -> Result<Geometry<f64>, WaterDataError> {
            let shore = LineString::from(vec![(region.west, region.south), (region.east, region.north)]);
            Ok(Geometry::MultiLineString(MultiLineString::new(vec![shore])))
        }
    }

    struct Silent;

    impl AutopilotSink for Silent {
        fn upload_mission(&self, _boat_id: u32, _first_index: usize, _waypoints: &[GeoPoint]) {}
        fn upload_geofence(&self, _center: GeoPoint, _points: &[OsmNodeData]) {}
    }

    fn config(refresh_delay_s: u64) -> PlannerConfig {
        let mut cfg = PlannerConfig::from_toml_str(include_str!("../config.toml")).unwrap();
        cfg.geofence.refresh_delay_s = refresh_delay_s;
        cfg
    }

    fn navigator(provider: impl WaterDataProvider + 'static) -> (Arc<Navigator>, mpsc::Receiver<NavEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let nav = Navigator {
            planner: MissionPlanner::new(Arc::new(WaterBoundaryCache::new(provider))),
            config: Arc::new(config(1)),
            obstacles: Arc::new(ObstacleRegistry::new()),
            uplink: Arc::new(Silent),
            state: Arc::new(RwLock::new(NavState::default())),
            events: tx,
        };
        (Arc::new(nav), rx)
    }

    #[test]
    fn stuck_boats_retry_on_the_geofence_cadence() {
        let cfg = config(10);
        assert_eq!(retry_delay(&StopReason::Stalled, &cfg), Some(Duration::from_secs(10)));
        assert_eq!(retry_delay(&StopReason::NoPathFound, &cfg), Some(Duration::from_secs(10)));
        assert_eq!(retry_delay(&StopReason::Wait(Duration::from_millis(200)), &cfg), Some(MIN_WAIT));
        assert_eq!(retry_delay(&StopReason::LimitReached, &cfg), None);
        assert_eq!(retry_delay(&StopReason::DestinationConverged, &cfg), None);
    }

    #[tokio::test]
    async fn stalled_batch_schedules_a_replan() {
        let (nav, mut rx) = navigator(CoastOnly);
        {
            let mut s = nav.state.write().await;
            s.boat = Some(add_new_mission(3, GeoPoint::new(4.0, 52.0), GeoPoint::new(4.0, 52.1)));
            s.wind_received = true;
            s.wind_dir_deg = 180.0;
            s.wind_speed = 8.0;
        }

        plan_and_upload(&nav).await;
        let stalled: Option<BatchOutcome> = nav.state.read().await.last_outcome.clone();
        assert_eq!(stalled.map(|o| o.reason), Some(StopReason::Stalled));

        let next = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(next, Ok(Some(NavEvent::Replan))), "{next:?}");
    }

    #[tokio::test]
    async fn mission_waits_for_the_first_wind_report() {
        let (nav, _rx) = navigator(CoastOnly);
        nav.state.write().await.boat =
            Some(add_new_mission(3, GeoPoint::new(4.0, 52.0), GeoPoint::new(4.0, 52.1)));

        plan_and_upload(&nav).await;
        assert!(nav.state.read().await.last_outcome.is_none());
    }
}
