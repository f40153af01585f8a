//! Known fixed-station (RFF) markers and the registry that owns them.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::geodesy::{DistanceUnit, LatLng, haversine_distance};

/// A fixed reference station whose location is known and used as the origin
/// of a line of position. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub location: LatLng,
}

/// Single source of truth for bearing origins.
///
/// The station set is rebuilt wholesale on each refresh from the external
/// feed; there is no incremental patching. Lookups take a read lock so a
/// caller never observes a half-replaced set.
#[derive(Debug, Default)]
pub struct StationRegistry {
    stations: RwLock<Vec<Station>>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swap the entire station set.
    pub fn replace_all(&self, stations: Vec<Station>) {
        let mut guard = self.stations.write().expect("station registry poisoned");
        *guard = stations;
    }

    /// Exact-match lookup by display name (case-sensitive, matching the
    /// external feed convention).
    pub fn find_by_name(&self, name: &str) -> Option<Station> {
        let guard = self.stations.read().expect("station registry poisoned");
        guard.iter().find(|s| s.name == name).cloned()
    }

    /// Nearest station to `point` by great-circle distance.
    ///
    /// Linear scan, O(n) per call; ties broken by registry order (first
    /// minimal element wins). Fine at tens of stations; a spatial index
    /// would only pay off at much larger counts.
    pub fn nearest(&self, point: LatLng) -> Option<Station> {
        let guard = self.stations.read().expect("station registry poisoned");
        let mut best: Option<(&Station, f64)> = None;
        for station in guard.iter() {
            let d = haversine_distance(point, station.location, DistanceUnit::StatuteMiles);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((station, d)),
            }
        }
        best.map(|(s, _)| s.clone())
    }

    /// Snapshot of the current station set, for the rendering layer.
    pub fn all(&self) -> Vec<Station> {
        self.stations
            .read()
            .expect("station registry poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.stations.read().expect("station registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
