//! # sail-types
//!
//! Shared navigation structures for the autonomous sailing navigator.
//!
//! These types are used by:
//! - `sail-planner`: waypoint generation, collision prediction, geofence export
//! - `navigator`: telemetry ingestion and the autopilot uplink
//!
//! ## Coordinate Conventions
//!
//! - **Points** are (longitude, latitude) in decimal degrees, x = longitude.
//! - **Bearings** are compass degrees, 0 = north, clockwise, in [0, 360).
//! - **Regions** are axis-aligned in degree space; antimeridian wraparound is
//!   not supported.

use geo::{Coord, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};

// ── GeoPoint ──────────────────────────────────────────────────────────────────

/// Geographic point, decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Planar coordinate used by the geometry kernels (x = lon, y = lat)
    pub fn to_coord(self) -> Coord<f64> {
        Coord { x: self.lon, y: self.lat }
    }

    /// Linear interpolation in degree space; `fraction` 0 → self, 1 → other
    pub fn lerp(self, other: GeoPoint, fraction: f64) -> GeoPoint {
        GeoPoint::new(
            self.lon + (other.lon - self.lon) * fraction,
            self.lat + (other.lat - self.lat) * fraction,
        )
    }
}

impl From<Coord<f64>> for GeoPoint {
    fn from(c: Coord<f64>) -> Self {
        Self { lon: c.x, lat: c.y }
    }
}

impl From<GeoPoint> for Coord<f64> {
    fn from(p: GeoPoint) -> Self {
        p.to_coord()
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(p: geo::Point<f64>) -> Self {
        Self { lon: p.x(), lat: p.y() }
    }
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo::Point::new(p.lon, p.lat)
    }
}

// ── Bounding Region ───────────────────────────────────────────────────────────

/// Axis-aligned region given by its four edges in decimal degrees.
/// Invariant: south ≤ north, west ≤ east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingRegion {
    /// Build a region, swapping edges given in the wrong order.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south: south.min(north),
            west: west.min(east),
            north: south.max(north),
            east: west.max(east),
        }
    }

    /// Region of half-height `lat_delta` and half-width `lon_delta` around `center`
    pub fn around(center: GeoPoint, lat_delta: f64, lon_delta: f64) -> Self {
        Self::new(
            center.lat - lat_delta,
            center.lon - lon_delta,
            center.lat + lat_delta,
            center.lon + lon_delta,
        )
    }

    /// True if `other` lies entirely inside this region (shared edges allowed)
    pub fn contains_region(&self, other: &BoundingRegion) -> bool {
        other.south >= self.south
            && other.north <= self.north
            && other.west >= self.west
            && other.east <= self.east
    }

    pub fn contains_point(&self, p: GeoPoint) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lon >= self.west && p.lon <= self.east
    }

    pub fn intersects(&self, other: &BoundingRegion) -> bool {
        self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }

    /// Region shifted by (dlon, dlat) degrees
    pub fn translated(&self, dlon: f64, dlat: f64) -> Self {
        Self {
            south: self.south + dlat,
            west: self.west + dlon,
            north: self.north + dlat,
            east: self.east + dlon,
        }
    }

    /// Nearest point of the region to `p` (p itself when inside)
    pub fn clamp(&self, p: GeoPoint) -> GeoPoint {
        GeoPoint::new(p.lon.clamp(self.west, self.east), p.lat.clamp(self.south, self.north))
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: self.west, y: self.south },
            Coord { x: self.east, y: self.north },
        )
    }

    /// Closed corner ring, counter-clockwise from the south-west corner
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.west, self.south),
                (self.east, self.south),
                (self.east, self.north),
                (self.west, self.north),
                (self.west, self.south),
            ]),
            vec![],
        )
    }
}

impl From<Rect<f64>> for BoundingRegion {
    fn from(r: Rect<f64>) -> Self {
        Self::new(r.min().y, r.min().x, r.max().y, r.max().x)
    }
}

// ── Obstacle ──────────────────────────────────────────────────────────────────

/// A hazard to be avoided, approximated by the region it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Area the obstacle covers (approximates a circular hazard)
    pub extent: BoundingRegion,
    /// Speed over ground, meters per second (≥ 0)
    pub speed_mps: f64,
    /// Direction of travel as a bearing, degrees
    pub heading_deg: f64,
}

impl Obstacle {
    pub fn new(extent: BoundingRegion, speed_mps: f64, heading_deg: f64) -> Self {
        Self { extent, speed_mps: speed_mps.max(0.0), heading_deg: heading_deg.rem_euclid(360.0) }
    }

    pub fn centroid(&self) -> GeoPoint {
        self.extent.center()
    }

    pub fn polygon(&self) -> Polygon<f64> {
        self.extent.to_polygon()
    }
}

// ── Geofence Export Record ────────────────────────────────────────────────────

/// One vertex of a geofence polygon uploaded to the autopilot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OsmNodeData {
    pub lat: f64,
    pub lon: f64,
    /// Index of the vertex in the original (simplified) contour
    pub order: usize,
    /// Haversine distance from the reference location, meters
    pub origin_dist_m: f64,
}

// ── Telemetry (vehicle → navigator) ───────────────────────────────────────────

/// JSON envelope received from the telemetry bridge, one per datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryMessage {
    /// Local wind sensor: direction (bearing, degrees) and speed
    Wind { direction_deg: f64, speed: f64 },
    /// GPS fix
    Gps { lat: f64, lon: f64 },
    /// Boat speed over ground, meters per second
    Speed { speed_mps: f64 },
    /// Autopilot reports it has reached the waypoint with this index
    WaypointReached { index: usize },
    ObstacleAdded { obstacle: Obstacle },
    ObstacleRemoved { obstacle: Obstacle },
    /// Start a new voyage for this vehicle, replacing any active one
    StartMission { boat_id: u32, origin: GeoPoint, destination: GeoPoint },
}

// ── Uplink (navigator → autopilot bridge) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UplinkMessage {
    /// Ordered waypoints to append to the autopilot mission
    Mission {
        boat_id: u32,
        /// Index the first waypoint of this batch takes in the mission
        first_index: usize,
        waypoints: Vec<GeoPoint>,
        issued_at_ms: i64,
    },
    /// Replacement geofence polygon, vertices in contour order
    Geofence {
        center: GeoPoint,
        points: Vec<OsmNodeData>,
        issued_at_ms: i64,
    },
}
