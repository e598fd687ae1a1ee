//! selector.rs — Boundary-aware choice of the next waypoint
//!
//! Works in planar lon/lat space against the merged water outline. When the
//! straight line to the destination stays inside the water the destination
//! itself is the target; otherwise the boat heads for the boundary crossing
//! along its working bearing that lies closer to the destination.

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{BoundingRect, Coord, Line, MultiPolygon};
use sail_types::{BoundingRegion, GeoPoint};
use tracing::{debug, warn};

use crate::geo_math::{destination_point, planar_distance};
use crate::water::{classify, WaterBoundaryCache, WaterOutline};

/// Fraction of the way to a boundary crossing the boat actually sails
pub const APPROACH_FRACTION: f64 = 0.95;

/// Intermediate fractions evaluated along the first candidate leg
pub const CHOICE_FRACTIONS: [f64; 5] = [0.5, 0.6, 0.7, 0.8, 0.9];

/// Below this share of the combined distance, the best crossing counts as a
/// return to the previous one.
pub const OSCILLATION_RATIO: f64 = 0.001;

// Parameter below which a crossing is considered to be at the cast origin
const ORIGIN_EPSILON: f64 = 1e-12;

/// Result of looking for the boundary crossing toward a destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossing {
    /// Straight path to the destination stays in water, or no water is known
    Direct(GeoPoint),
    /// Boundary crossing to head for
    Boundary(GeoPoint),
    /// Water geometry cannot be used; the boat should not advance
    Degenerate,
}

impl Crossing {
    /// Point to head for; `location` when the crossing is degenerate
    pub fn target(self, location: GeoPoint) -> GeoPoint {
        match self {
            Crossing::Direct(p) | Crossing::Boundary(p) => p,
            Crossing::Degenerate => location,
        }
    }
}

/// Stateful per planning run: remembers the previously chosen crossing for
/// anti-oscillation.
pub struct PointSelector<'a> {
    water: &'a WaterBoundaryCache,
    offset_deg: f64,
    last_crossing: Option<GeoPoint>,
}

impl<'a> PointSelector<'a> {
    pub fn new(water: &'a WaterBoundaryCache, offset_deg: f64, last_crossing: Option<GeoPoint>) -> Self {
        Self { water, offset_deg, last_crossing }
    }

    pub fn last_crossing(&self) -> Option<GeoPoint> {
        self.last_crossing
    }

    fn outline(&self, location: GeoPoint) -> WaterOutline {
        let region = BoundingRegion::around(location, self.offset_deg, self.offset_deg);
        classify(&self.water.fetch_boundary(&region))
    }

    /// Where the boat should head from `location` toward `destination` when
    /// sailing on `bearing`.
    pub fn crossing_toward(&mut self, location: GeoPoint, destination: GeoPoint, bearing: f64) -> Crossing {
        let water = match self.outline(location) {
            WaterOutline::Unknown => return Crossing::Direct(destination),
            WaterOutline::Unusable(why) => {
                warn!("water outline near {location:?} unusable ({why}); holding position");
                return Crossing::Degenerate;
            }
            WaterOutline::Polygons(mp) => mp,
        };

        let boundary = boundary_segments(&water);
        if !crosses_boundary(location, destination, &boundary) {
            return Crossing::Direct(destination);
        }

        let Some((first, second)) = boundary_crossings(location, bearing, &water, &boundary) else {
            warn!("no boundary crossing along {bearing:.1}° from {location:?}; holding position");
            return Crossing::Degenerate;
        };

        let (best, other) = if planar_distance(first, destination) <= planar_distance(second, destination) {
            (first, second)
        } else {
            (second, first)
        };
        let chosen = resolve_oscillation(self.last_crossing, best, other);
        self.last_crossing = Some(chosen);
        Crossing::Boundary(chosen)
    }

    /// Best next waypoint from `location`. Returns `location` itself when the
    /// water geometry is degenerate.
    ///
    /// Choices are taken along the in-water segment toward the crossing; the
    /// one whose own continuation ends nearest the destination wins, later
    /// choices winning ties.
    pub fn next_point(&mut self, location: GeoPoint, destination: GeoPoint, bearing: f64) -> GeoPoint {
        let first = match self.crossing_toward(location, destination, bearing) {
            Crossing::Degenerate => return location,
            Crossing::Direct(p) => return location.lerp(p, APPROACH_FRACTION),
            Crossing::Boundary(p) => location.lerp(p, APPROACH_FRACTION),
        };

        let mut best: Option<(f64, GeoPoint)> = None;
        for fraction in CHOICE_FRACTIONS {
            let choice = location.lerp(first, fraction);
            let onward = self.crossing_toward(choice, destination, bearing);
            if onward == Crossing::Degenerate {
                continue;
            }
            let d = planar_distance(onward.target(choice), destination);
            if best.map_or(true, |(best_d, _)| d <= best_d) {
                best = Some((d, choice));
            }
        }

        let Some((_, choice)) = best else {
            return first;
        };
        debug!("next point from {location:?}: best choice {choice:?}");
        location.lerp(choice, APPROACH_FRACTION)
    }

    /// Point `distance_m` from `location` along `bearing`, shortened to stay
    /// inside the known water.
    pub fn steer(&mut self, location: GeoPoint, bearing: f64, distance_m: f64) -> GeoPoint {
        let target = destination_point(location, bearing, distance_m);
        let WaterOutline::Polygons(water) = self.outline(location) else {
            return target;
        };
        let boundary = boundary_segments(&water);
        match first_crossing_on_segment(location, target, &boundary) {
            Some(edge) => location.lerp(edge, APPROACH_FRACTION),
            None => target,
        }
    }
}

/// Keep the alternative crossing when `best` is essentially the crossing
/// chosen last time, so the boat does not bounce between two points.
pub fn resolve_oscillation(previous: Option<GeoPoint>, best: GeoPoint, other: GeoPoint) -> GeoPoint {
    let Some(prev) = previous else {
        return best;
    };
    let to_best = planar_distance(prev, best);
    let to_other = planar_distance(prev, other);
    let total = to_best + to_other;
    if total > 0.0 && to_best / total < OSCILLATION_RATIO {
        other
    } else {
        best
    }
}

/// Every ring edge of the water polygons, islands included.
pub fn boundary_segments(water: &MultiPolygon<f64>) -> Vec<Line<f64>> {
    water
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()))
        .flat_map(|ring| ring.lines())
        .collect()
}

fn crosses_boundary(from: GeoPoint, to: GeoPoint, boundary: &[Line<f64>]) -> bool {
    let leg = Line::new(from.to_coord(), to.to_coord());
    boundary.iter().any(|edge| line_intersection(leg, *edge).is_some())
}

fn first_crossing_on_segment(from: GeoPoint, to: GeoPoint, boundary: &[Line<f64>]) -> Option<GeoPoint> {
    let leg = Line::new(from.to_coord(), to.to_coord());
    boundary
        .iter()
        .filter_map(|edge| line_intersection(leg, *edge))
        .map(|hit| match hit {
            LineIntersection::SinglePoint { intersection, .. } => GeoPoint::from(intersection),
            LineIntersection::Collinear { intersection } => GeoPoint::from(intersection.start),
        })
        .min_by(|a, b| planar_distance(from, *a).total_cmp(&planar_distance(from, *b)))
}

/// Nearest boundary crossings behind and ahead of `location` on a line cast
/// along `bearing`. If only one side has a crossing it is returned twice.
pub fn boundary_crossings(
    location: GeoPoint,
    bearing: f64,
    water: &MultiPolygon<f64>,
    boundary: &[Line<f64>],
) -> Option<(GeoPoint, GeoPoint)> {
    let rect = water.bounding_rect()?;
    let reach = 2.0 * (rect.width() + rect.height() + planar_distance(location, rect.center().into())) + 1.0;

    // Compass bearing to a lon/lat direction; longitude degrees shrink with latitude
    let b = bearing.to_radians();
    let cos_lat = location.lat.to_radians().cos().max(1e-6);
    let (dx, dy) = (b.sin() / cos_lat, b.cos());
    let norm = dx.hypot(dy);
    let dir = Coord { x: dx / norm, y: dy / norm };

    let origin = location.to_coord();
    let cast = Line::new(origin - dir * reach, origin + dir * reach);

    let mut behind: Option<(f64, GeoPoint)> = None;
    let mut ahead: Option<(f64, GeoPoint)> = None;
    for edge in boundary {
        let Some(hit) = line_intersection(cast, *edge) else { continue };
        let points = match hit {
            LineIntersection::SinglePoint { intersection, .. } => vec![intersection],
            LineIntersection::Collinear { intersection } => vec![intersection.start, intersection.end],
        };
        for p in points {
            let t = (p.x - origin.x) * dir.x + (p.y - origin.y) * dir.y;
            if t > ORIGIN_EPSILON {
                if ahead.map_or(true, |(best, _)| t < best) {
                    ahead = Some((t, p.into()));
                }
            } else if t < -ORIGIN_EPSILON && behind.map_or(true, |(best, _)| t > best) {
                behind = Some((t, p.into()));
            }
        }
    }

    match (behind, ahead) {
        (Some((_, b)), Some((_, a))) => Some((b, a)),
        (Some((_, p)), None) | (None, Some((_, p))) => Some((p, p)),
        (None, None) => None,
    }
}
