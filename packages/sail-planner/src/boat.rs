//! boat.rs — Navigation state of one voyage
//!
//! Mutated only by the mission planner (batch commits) and by waypoint-reached
//! acknowledgements. Every mutation bumps `revision` so a batch planned
//! against an older state can be detected and discarded at commit time.

use std::collections::VecDeque;
use std::time::Duration;

use sail_types::GeoPoint;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::geo_math::initial_bearing;

/// Which tack limit the next tacking leg sails on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TackSide {
    Lower,
    Upper,
}

impl TackSide {
    pub fn flipped(self) -> Self {
        match self {
            TackSide::Lower => TackSide::Upper,
            TackSide::Upper => TackSide::Lower,
        }
    }
}

/// Present only while tacking; both limits are set and distinct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TackState {
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub side: TackSide,
}

impl TackState {
    pub fn active_limit(&self) -> f64 {
        match self.side {
            TackSide::Lower => self.lower_limit,
            TackSide::Upper => self.upper_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Boat {
    pub(crate) id: u32,
    pub(crate) origin: GeoPoint,
    /// Destination of the current leg
    pub(crate) destination: GeoPoint,
    pub(crate) final_destination: GeoPoint,
    pub(crate) mid_points: VecDeque<GeoPoint>,
    /// Committed waypoints not yet reached
    pub(crate) path: VecDeque<GeoPoint>,
    /// Waypoints dropped from the committed path (diagnostic only)
    pub(crate) previous_path: VecDeque<GeoPoint>,
    /// Origin, or the most recently appended waypoint
    pub(crate) last_known_location: GeoPoint,
    pub(crate) bearing: f64,
    pub(crate) tack: Option<TackState>,
    pub(crate) wait_time: Option<Duration>,
    /// Number of waypoints the autopilot has reported reached
    pub(crate) wp_index: usize,
    /// Number of waypoints ever committed for upload
    pub(crate) issued: usize,
    /// Reached waypoints, oldest first
    pub(crate) history: Vec<GeoPoint>,
    /// Boundary crossing chosen by the previous selection (anti-oscillation)
    pub(crate) last_crossing: Option<GeoPoint>,
    pub(crate) revision: u64,
}

impl Boat {
    /// New voyage state. The mid-point queue holds the final destination and
    /// the first leg is taken from it immediately.
    pub fn new(id: u32, origin: GeoPoint, destination: GeoPoint) -> Self {
        let mut boat = Self {
            id,
            origin,
            destination,
            final_destination: destination,
            mid_points: VecDeque::new(),
            path: VecDeque::new(),
            previous_path: VecDeque::new(),
            last_known_location: origin,
            bearing: initial_bearing(origin, destination),
            tack: None,
            wait_time: None,
            wp_index: 0,
            issued: 0,
            history: Vec::new(),
            last_crossing: None,
            revision: 0,
        };
        boat.plan_trip();
        boat.switch_point_to_go();
        boat
    }

    /// Fill the mid-point queue. Legs are the direct destination; no ocean
    /// routing collaborator is wired in.
    fn plan_trip(&mut self) {
        self.extend_mid_point(self.final_destination);
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    pub fn destination(&self) -> GeoPoint {
        self.destination
    }

    pub fn final_destination(&self) -> GeoPoint {
        self.final_destination
    }

    pub fn last_known_location(&self) -> GeoPoint {
        self.last_known_location
    }

    pub fn bearing(&self) -> f64 {
        self.bearing
    }

    pub fn tack(&self) -> Option<TackState> {
        self.tack
    }

    pub fn is_tacking(&self) -> bool {
        self.tack.is_some()
    }

    pub fn wait_time(&self) -> Option<Duration> {
        self.wait_time
    }

    pub fn wp_index(&self) -> usize {
        self.wp_index
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn history(&self) -> &[GeoPoint] {
        &self.history
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mid_points(&self) -> Vec<GeoPoint> {
        self.mid_points.iter().copied().collect()
    }

    /// Copy of the committed path
    pub fn path(&self) -> Vec<GeoPoint> {
        self.path.iter().copied().collect()
    }

    pub fn previous_path(&self) -> Vec<GeoPoint> {
        self.previous_path.iter().copied().collect()
    }

    pub fn remaining(&self) -> usize {
        self.path.len()
    }

    /// The current leg's destination has been committed as a waypoint
    pub fn leg_complete(&self) -> bool {
        self.last_known_location == self.destination
    }

    /// All legs planned and the final destination reached by the autopilot
    pub fn final_destination_reached(&self) -> bool {
        self.mid_points.is_empty()
            && self.path.is_empty()
            && self.history.last() == Some(&self.final_destination)
    }

    // ── Path bookkeeping ──────────────────────────────────────────────────────

    /// Append a waypoint to the committed path
    pub fn extend(&mut self, point: GeoPoint) {
        self.path.push_back(point);
        self.last_known_location = point;
        self.issued += 1;
        self.touch();
    }

    pub fn pop(&mut self) -> Option<GeoPoint> {
        let p = self.path.pop_front();
        self.touch();
        p
    }

    /// Insert an intermediate waypoint ahead of the rest of the path
    pub fn add_to_front(&mut self, point: GeoPoint) {
        self.path.push_front(point);
        self.issued += 1;
        self.touch();
    }

    /// Insert at `index`, clamped to the path length
    pub fn insert(&mut self, index: usize, point: GeoPoint) {
        let at = index.min(self.path.len());
        if at == self.path.len() {
            self.extend(point);
        } else {
            self.path.insert(at, point);
            self.issued += 1;
            self.touch();
        }
    }

    pub fn extend_previous(&mut self, point: GeoPoint) {
        self.previous_path.push_back(point);
    }

    /// Move every committed waypoint into the previous path
    pub fn dump_path(&mut self) {
        while let Some(p) = self.path.pop_front() {
            self.previous_path.push_back(p);
        }
        self.touch();
    }

    pub fn extend_mid_point(&mut self, point: GeoPoint) {
        self.mid_points.push_back(point);
        self.touch();
    }

    pub fn pop_mid_point(&mut self) -> Option<GeoPoint> {
        let p = self.mid_points.pop_front();
        self.touch();
        p
    }

    /// Make the next mid-point the leg destination, or the final destination
    /// once the queue is empty.
    pub fn switch_point_to_go(&mut self) {
        self.destination = self.pop_mid_point().unwrap_or(self.final_destination);
        self.touch();
    }

    /// Apply a waypoint-reached acknowledgement for mission `index`.
    ///
    /// Returns false when the autopilot reports a waypoint that was never
    /// issued; the state is reconciled as if everything up to `index` had
    /// been consumed.
    pub fn advance_to(&mut self, index: usize) -> bool {
        if index < self.wp_index {
            debug!("stale waypoint ack {index} (already at {})", self.wp_index);
            return true;
        }
        while self.wp_index < index {
            match self.path.pop_front() {
                Some(p) => {
                    self.wp_index += 1;
                    self.history.push(p);
                }
                None => break,
            }
        }
        self.touch();

        if self.wp_index != index {
            error!(
                "autopilot reports waypoint {index} but only {} were issued to boat {}",
                self.issued, self.id
            );
            self.wp_index = index;
            return false;
        }
        info!("boat {} reached waypoint {index}, {} remaining", self.id, self.path.len());
        true
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
