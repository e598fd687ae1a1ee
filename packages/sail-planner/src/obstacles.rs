//! obstacles.rs — Process-wide registry of known obstacles
//!
//! Writers are the obstacle feed (add/remove); readers are planning cycles,
//! which take a snapshot and never iterate the live collection.

use std::sync::RwLock;

use sail_types::Obstacle;
use tracing::{debug, warn};

#[derive(Default)]
pub struct ObstacleRegistry {
    obstacles: RwLock<Vec<Obstacle>>,
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, obstacle: Obstacle) {
        debug!("obstacle added at {:?} ({:.1} m/s)", obstacle.centroid(), obstacle.speed_mps);
        self.obstacles.write().unwrap_or_else(|p| p.into_inner()).push(obstacle);
    }

    /// Remove the first obstacle equal to `obstacle`. Returns false if unknown.
    pub fn remove(&self, obstacle: &Obstacle) -> bool {
        let mut list = self.obstacles.write().unwrap_or_else(|p| p.into_inner());
        match list.iter().position(|o| o == obstacle) {
            Some(i) => {
                list.remove(i);
                true
            }
            None => {
                warn!("removal of unknown obstacle at {:?}", obstacle.centroid());
                false
            }
        }
    }

    /// Copy of the registry in insertion order, for one planning cycle
    pub fn snapshot(&self) -> Vec<Obstacle> {
        self.obstacles.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.obstacles.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sail_types::BoundingRegion;

    fn buoy(lat: f64) -> Obstacle {
        Obstacle::new(BoundingRegion::new(lat, 4.0, lat + 0.001, 4.001), 0.0, 0.0)
    }

    #[test]
    fn snapshot_preserves_insertion_order_and_is_detached() {
        let registry = ObstacleRegistry::new();
        registry.add(buoy(52.0));
        registry.add(buoy(52.1));

        let snap = registry.snapshot();
        registry.add(buoy(52.2));

        assert_eq!(snap, vec![buoy(52.0), buoy(52.1)]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn remove_by_value() {
        let registry = ObstacleRegistry::new();
        registry.add(buoy(52.0));
        assert!(registry.remove(&buoy(52.0)));
        assert!(!registry.remove(&buoy(52.0)));
        assert!(registry.is_empty());
    }
}
