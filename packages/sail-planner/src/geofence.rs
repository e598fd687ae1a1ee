//! geofence.rs — Bounding polygon uploaded to the autopilot as a safety fence
//!
//! The fence is the simplified outline of the water around the boat, reduced
//! to the `max_points` vertices nearest to it while keeping contour order.

use geo::{Contains, MultiPolygon, Point, Simplify};
use sail_types::{BoundingRegion, GeoPoint, OsmNodeData};
use tracing::{debug, info, warn};

use crate::config::GeofenceConfig;
use crate::geo_math::{haversine_distance, LATITUDE_DEGREE_M};
use crate::water::{classify, WaterBoundaryCache, WaterOutline};

/// Fence vertices around `location`, in contour order. Empty when no water
/// polygon is known there.
pub fn fetch_geofence(water: &WaterBoundaryCache, location: GeoPoint, config: &GeofenceConfig) -> Vec<OsmNodeData> {
    let region = BoundingRegion::around(location, config.latitude_delta, config.longitude_delta);
    let polygons = match classify(&water.fetch_boundary(&region)) {
        WaterOutline::Polygons(mp) => mp,
        WaterOutline::Unknown => {
            warn!("no water known around {location:?}; geofence not generated");
            return Vec::new();
        }
        WaterOutline::Unusable(why) => {
            warn!("cannot build geofence around {location:?}: {why}");
            return Vec::new();
        }
    };

    let simplified = simplify_outline(polygons, config.simplification_tolerance_m);
    let contour = contour_points(&simplified, location);
    let fence = reduce_to_nearest(&contour, location, config.max_points);
    info!("geofence of {} points (outline had {})", fence.len(), contour.len());
    fence
}

/// Douglas-Peucker simplification with a tolerance given in meters. A zero
/// tolerance leaves the outline untouched.
pub fn simplify_outline(polygons: MultiPolygon<f64>, tolerance_m: f64) -> MultiPolygon<f64> {
    if tolerance_m <= 0.0 {
        return polygons;
    }
    polygons.simplify(&(tolerance_m / LATITUDE_DEGREE_M))
}

/// Exterior vertices of the polygons containing `location`, without the
/// closing vertex. Falls back to every polygon when none contains it.
pub fn contour_points(polygons: &MultiPolygon<f64>, location: GeoPoint) -> Vec<GeoPoint> {
    let here = Point::from(location);
    let containing: Vec<_> = polygons.iter().filter(|p| p.contains(&here)).collect();
    let chosen = if containing.is_empty() {
        debug!("boat at {location:?} outside every water polygon; using all outlines");
        polygons.iter().collect()
    } else {
        containing
    };

    chosen
        .into_iter()
        .flat_map(|p| {
            let ring = &p.exterior().0;
            let open = ring.len().saturating_sub(usize::from(p.exterior().is_closed()));
            ring[..open].iter().map(|c| GeoPoint::from(*c))
        })
        .collect()
}

/// The `n` points nearest to `reference`, returned in their original contour order.
pub fn reduce_to_nearest(points: &[GeoPoint], reference: GeoPoint, n: usize) -> Vec<OsmNodeData> {
    let mut nodes: Vec<OsmNodeData> = points
        .iter()
        .enumerate()
        .map(|(order, p)| OsmNodeData {
            lat: p.lat,
            lon: p.lon,
            order,
            origin_dist_m: haversine_distance(reference, *p),
        })
        .collect();

    nodes.sort_by(|a, b| a.origin_dist_m.total_cmp(&b.origin_dist_m));
    nodes.truncate(n);
    nodes.sort_by_key(|node| node.order);
    nodes
}

/// Decides when a new fence is due: the boat must have moved at least
/// `min_refresh_distance_m` since the last one.
#[derive(Debug, Clone, Default)]
pub struct GeofenceRefresh {
    last_center: Option<GeoPoint>,
}

impl GeofenceRefresh {
    pub fn due(&self, position: GeoPoint, config: &GeofenceConfig) -> bool {
        match self.last_center {
            None => true,
            Some(c) => haversine_distance(c, position) >= config.min_refresh_distance_m,
        }
    }

    pub fn mark(&mut self, position: GeoPoint) {
        self.last_center = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample;
    use geo::{LineString, Polygon};

    fn ring(points: &[(f64, f64)]) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(LineString::from(points.to_vec()), vec![])])
    }

    #[test]
    fn nearest_points_keep_contour_order() {
        let pts: Vec<GeoPoint> = [(0.0, 0.0), (0.0, 1.0), (0.0, 0.1), (0.0, 2.0), (0.0, 0.2)]
            .iter()
            .map(|&(lon, lat)| GeoPoint::new(lon, lat))
            .collect();
        let fence = reduce_to_nearest(&pts, GeoPoint::new(0.0, 0.0), 3);
        let orders: Vec<usize> = fence.iter().map(|n| n.order).collect();
        assert_eq!(orders, vec![0, 2, 4]);
    }

    #[test]
    fn fence_size_is_capped() {
        let pts: Vec<GeoPoint> = (0..100).map(|i| GeoPoint::new(i as f64 * 0.001, 0.0)).collect();
        assert_eq!(reduce_to_nearest(&pts, GeoPoint::new(0.0, 0.0), 70).len(), 70);
        assert_eq!(reduce_to_nearest(&pts[..5], GeoPoint::new(0.0, 0.0), 70).len(), 5);
    }

    #[test]
    fn closing_vertex_is_dropped() {
        let square = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        assert_eq!(contour_points(&square, GeoPoint::new(0.5, 0.5)).len(), 4);
    }

    #[test]
    fn only_the_containing_polygon_is_used() {
        let mut lakes = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        lakes.0.push(Polygon::new(
            LineString::from(vec![(5.0, 5.0), (6.0, 5.0), (6.0, 6.0), (5.0, 5.0)]),
            vec![],
        ));
        let pts = contour_points(&lakes, GeoPoint::new(5.8, 5.5));
        assert_eq!(pts.len(), 3);
        assert!(pts.iter().all(|p| p.lon >= 5.0));
    }

    #[test]
    fn simplification_removes_collinear_noise() {
        let noisy = ring(&[(0.0, 0.0), (0.5, 0.000001), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        let simplified = simplify_outline(noisy.clone(), 5.0);
        assert!(simplified.0[0].exterior().0.len() < noisy.0[0].exterior().0.len());
        assert_eq!(simplify_outline(noisy.clone(), 0.0), noisy);
    }

    #[test]
    fn refresh_requires_movement() {
        let cfg = sample().geofence;
        let mut refresh = GeofenceRefresh::default();
        let here = GeoPoint::new(4.0, 52.0);
        assert!(refresh.due(here, &cfg));
        refresh.mark(here);
        assert!(!refresh.due(GeoPoint::new(4.0, 52.0001), &cfg));
        assert!(refresh.due(GeoPoint::new(4.0, 52.001), &cfg));
    }
}
