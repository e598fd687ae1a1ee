use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use geo::Geometry;
use sail_planner::water::{classify, WaterOutline};
use sail_planner::{WaterBoundaryCache, WaterDataError, WaterDataProvider};
use sail_types::BoundingRegion;

/// Returns a lake covering whatever region was asked for, padded by 0.1°.
struct PaddedLake {
    calls: Arc<AtomicUsize>,
}

impl WaterDataProvider for PaddedLake {
    fn query(&self, region: &BoundingRegion) -> Result<Geometry<f64>, WaterDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let padded = BoundingRegion::new(region.south - 0.1, region.west - 0.1, region.north + 0.1, region.east + 0.1);
        Ok(Geometry::Polygon(padded.to_polygon()))
    }
}

#[test]
fn concurrent_readers_see_the_same_outline() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(WaterBoundaryCache::new(PaddedLake { calls: calls.clone() }));

    // Warm the cache with a wide query
    cache.fetch_boundary(&BoundingRegion::new(52.0, 4.0, 52.2, 4.2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || {
                let offset = i as f64 * 0.01;
                let region = BoundingRegion::new(52.05 + offset, 4.05, 52.06 + offset, 4.06);
                cache.fetch_boundary(&region)
            })
        })
        .collect();

    for h in handles {
        let geometry = h.join().expect("reader thread");
        assert!(matches!(classify(&geometry), WaterOutline::Polygons(_)));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "contained queries must not reach the provider");
    assert_eq!(cache.len(), 1);
}

#[test]
fn regions_outside_every_entry_are_fetched_and_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = WaterBoundaryCache::new(PaddedLake { calls: calls.clone() });

    cache.fetch_boundary(&BoundingRegion::new(52.0, 4.0, 52.01, 4.01));
    cache.fetch_boundary(&BoundingRegion::new(54.0, 6.0, 54.01, 6.01));
    cache.fetch_boundary(&BoundingRegion::new(54.0, 6.0, 54.01, 6.01));

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
}
