//! autopilot.rs — Outbound seam toward the vehicle's autopilot
//!
//! Implementations deliver batches and fences over whatever link the vehicle
//! uses. Delivery failures are logged by the implementation and never reach
//! the planner.

use sail_types::{GeoPoint, OsmNodeData};
use tracing::debug;

use crate::mission::BatchOutcome;

pub trait AutopilotSink: Send + Sync {
    /// Append `waypoints` to the vehicle mission, the first one at mission
    /// position `first_index`.
    fn upload_mission(&self, boat_id: u32, first_index: usize, waypoints: &[GeoPoint]);

    /// Replace the vehicle's geofence polygon.
    fn upload_geofence(&self, center: GeoPoint, points: &[OsmNodeData]);

    /// Upload a committed batch; empty batches are not sent.
    fn publish_batch(&self, outcome: &BatchOutcome) {
        if outcome.waypoints.is_empty() {
            debug!("boat {}: nothing to upload ({:?})", outcome.boat_id, outcome.reason);
            return;
        }
        self.upload_mission(outcome.boat_id, outcome.first_index, &outcome.waypoints);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::StopReason;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        missions: Mutex<Vec<(u32, usize, Vec<GeoPoint>)>>,
    }

    impl AutopilotSink for Recorder {
        fn upload_mission(&self, boat_id: u32, first_index: usize, waypoints: &[GeoPoint]) {
            self.missions.lock().unwrap().push((boat_id, first_index, waypoints.to_vec()));
        }

        fn upload_geofence(&self, _center: GeoPoint, _points: &[OsmNodeData]) {}
    }

    #[test]
    fn empty_batches_are_not_uploaded() {
        let sink = Recorder::default();
        sink.publish_batch(&BatchOutcome {
            boat_id: 3,
            first_index: 0,
            waypoints: vec![],
            reason: StopReason::NoPathFound,
        });
        sink.publish_batch(&BatchOutcome {
            boat_id: 3,
            first_index: 4,
            waypoints: vec![GeoPoint::new(4.0, 52.0)],
            reason: StopReason::LimitReached,
        });
        let sent = sink.missions.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, 4);
    }
}
