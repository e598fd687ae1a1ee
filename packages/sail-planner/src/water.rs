//! water.rs — Navigable-water boundary lookup with an in-memory cache
//!
//! The cache is keyed by the encompassing rectangle of every geometry fetched
//! so far. A query is served from an entry only when the query region lies
//! fully inside that rectangle: geometry outside the original request bounds
//! may be incomplete, so mere overlap is not enough.
//!
//! Lookup is a linear scan over entries and entries are never evicted. Fine for
//! the handful of regions one voyage touches; a long-lived process covering a
//! large area would want an R-tree behind the same `fetch_boundary` contract.

use std::sync::{Arc, Mutex};

use geo::{BooleanOps, BoundingRect, Geometry, GeometryCollection, MultiLineString, MultiPolygon, Polygon};
use sail_types::BoundingRegion;
use thiserror::Error;
use tracing::{debug, info, warn};

// ── Provider seam ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum WaterDataError {
    #[error("water data request failed: {0}")]
    Transport(String),
    #[error("malformed water data: {0}")]
    Decode(String),
}

/// Remote source of water geometry. May be slow; implementations should bound
/// their own latency (request timeouts).
pub trait WaterDataProvider: Send + Sync {
    fn query(&self, region: &BoundingRegion) -> Result<Geometry<f64>, WaterDataError>;
}

impl<P: WaterDataProvider + ?Sized> WaterDataProvider for Arc<P> {
    fn query(&self, region: &BoundingRegion) -> Result<Geometry<f64>, WaterDataError> {
        (**self).query(region)
    }
}

// ── Outline classification ────────────────────────────────────────────────────

/// What a water geometry means for routing.
#[derive(Debug, Clone)]
pub enum WaterOutline {
    /// No water data known for the area
    Unknown,
    /// Merged water polygons
    Polygons(MultiPolygon<f64>),
    /// Geometry that cannot bound water (bare coastline, points)
    Unusable(&'static str),
}

pub fn empty_geometry() -> Geometry<f64> {
    Geometry::GeometryCollection(GeometryCollection(Vec::new()))
}

/// Merge raw provider features into one geometry: all polygons are unioned,
/// pure line work is gathered into a single multi-line.
pub fn merge_water(geometry: Geometry<f64>) -> Geometry<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut lines = Vec::new();
    let mut other = 0usize;
    flatten(geometry, &mut polygons, &mut lines, &mut other);

    if !polygons.is_empty() {
        let mut merged = polygons.into_iter().fold(MultiPolygon::new(Vec::new()), |acc, p| {
            acc.union(&MultiPolygon::new(vec![p]))
        });
        if merged.0.len() == 1 {
            if let Some(single) = merged.0.pop() {
                return Geometry::Polygon(single);
            }
        }
        return Geometry::MultiPolygon(merged);
    }
    if !lines.is_empty() {
        return Geometry::MultiLineString(MultiLineString::new(lines));
    }
    if other > 0 {
        debug!("water data held {other} non-areal features, ignored");
    }
    empty_geometry()
}

fn flatten(
    geometry: Geometry<f64>,
    polygons: &mut Vec<Polygon<f64>>,
    lines: &mut Vec<geo::LineString<f64>>,
    other: &mut usize,
) {
    match geometry {
        Geometry::Polygon(p) => polygons.push(p),
        Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
        Geometry::Rect(r) => polygons.push(r.to_polygon()),
        Geometry::LineString(l) => lines.push(l),
        Geometry::MultiLineString(ml) => lines.extend(ml.0),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                flatten(g, polygons, lines, other);
            }
        }
        _ => *other += 1,
    }
}

/// Decide how a (merged) geometry can be used to bound the boat.
pub fn classify(geometry: &Geometry<f64>) -> WaterOutline {
    match geometry {
        Geometry::Polygon(p) => WaterOutline::Polygons(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) if mp.0.is_empty() => WaterOutline::Unknown,
        Geometry::MultiPolygon(mp) => WaterOutline::Polygons(mp.clone()),
        Geometry::GeometryCollection(gc) if gc.0.is_empty() => WaterOutline::Unknown,
        Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Line(_) => {
            WaterOutline::Unusable("line work without enclosed water")
        }
        _ => WaterOutline::Unusable("unsupported geometry type"),
    }
}

// ── Cache ─────────────────────────────────────────────────────────────────────

struct CacheEntry {
    /// Minimal rectangle around the geometry fetched for an earlier query
    region: BoundingRegion,
    geometry: Geometry<f64>,
}

pub struct WaterBoundaryCache {
    provider: Box<dyn WaterDataProvider>,
    entries: Mutex<Vec<CacheEntry>>,
}

impl WaterBoundaryCache {
    pub fn new(provider: impl WaterDataProvider + 'static) -> Self {
        Self { provider: Box::new(provider), entries: Mutex::new(Vec::new()) }
    }

    /// Water geometry covering `region`, merged into a single outline.
    ///
    /// Provider failures are logged and yield an empty geometry ("no known
    /// water"); they never reach the caller as errors.
    pub fn fetch_boundary(&self, region: &BoundingRegion) -> Geometry<f64> {
        if let Some(hit) = self.lookup(region) {
            debug!("water cache hit for {region:?}");
            return hit;
        }

        // Remote call happens outside the lock; concurrent misses may both fetch.
        let raw = match self.provider.query(region) {
            Ok(g) => g,
            Err(e) => {
                warn!("water data unavailable for {region:?}: {e}");
                return empty_geometry();
            }
        };

        let merged = merge_water(raw);
        match merged.bounding_rect() {
            Some(rect) => {
                let encompassing = BoundingRegion::from(rect);
                info!("caching water geometry, encompassing {encompassing:?}");
                self.entries
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(CacheEntry { region: encompassing, geometry: merged.clone() });
            }
            None => warn!("no water geometry returned for {region:?}; not cached"),
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, region: &BoundingRegion) -> Option<Geometry<f64>> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .iter()
            .find(|e| e.region.contains_region(region))
            .map(|e| e.geometry.clone())
    }
}
