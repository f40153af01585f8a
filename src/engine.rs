//! The overlay engine: one explicit object owning the station registry, the
//! event deduplicator, and the overlay store, with all mutation routed
//! through its methods.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::Config;
use crate::dedup::EventDeduplicator;
use crate::events::CallerEvent;
use crate::geodesy::LatLng;
use crate::hit_test;
use crate::lop::build_lines;
use crate::overlay_store::{OverlaySnapshot, OverlayStore};
use crate::stations::{Station, StationRegistry};

pub struct OverlayEngine {
    registry: StationRegistry,
    dedup: EventDeduplicator,
    store: OverlayStore,
    circle_radius_miles: f64,
}

impl OverlayEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: StationRegistry::new(),
            dedup: EventDeduplicator::new(),
            store: OverlayStore::new(config.decay_ttl(), config.debounce()),
            circle_radius_miles: config.circle_radius_miles,
        }
    }

    /// Atomically replace the known station set.
    pub fn replace_stations(&self, stations: Vec<Station>) {
        info!("Replacing station registry ({} stations)", stations.len());
        self.registry.replace_all(stations);
    }

    /// Station locations, for the rendering layer.
    pub fn stations(&self) -> Vec<Station> {
        self.registry.all()
    }

    pub fn has_stations(&self) -> bool {
        !self.registry.is_empty()
    }

    /// Ingest a batch of caller events: drop already-processed ids, build
    /// lines of position and fix circles for the rest, hand the geometry to
    /// the store, then mark the events processed. Returns how many events
    /// were new.
    ///
    /// Marking happens after the geometry is handed over, so a failure
    /// earlier in the tick cannot permanently lose an event.
    pub fn process_events(&self, events: Vec<CallerEvent>, now: DateTime<Utc>) -> usize {
        let new_events = self.dedup.filter_new(events);
        if new_events.is_empty() {
            return 0;
        }

        let mut total_lines = 0;
        for event in &new_events {
            let lines = build_lines(event, &self.registry, now);
            total_lines += lines.len();
            self.store.add_lines_batched(lines);

            if let Some(fix) = event.fix {
                self.store
                    .add_circle(fix, self.circle_radius_miles, Some(&event.id), now);
            }
        }

        let count = new_events.len();
        debug!("Processed {} new event(s) into {} line(s)", count, total_lines);
        metrics::counter!("rdfmap.events.processed").increment(count as u64);

        self.dedup.mark_processed(new_events.into_iter().map(|e| e.id));
        count
    }

    // Commands exposed to the UI layer

    pub fn pin(&self, id: &str) {
        self.store.pin(id);
    }

    pub fn unpin(&self, id: &str) {
        self.store.unpin(id);
    }

    pub fn remove(&self, id: &str) {
        self.store.remove(id);
    }

    pub fn set_decay_ttl(&self, ttl: Duration) {
        info!("Decay TTL set to {:?}", ttl);
        self.store.set_decay_ttl(ttl);
    }

    pub fn decay_ttl(&self) -> Duration {
        self.store.decay_ttl()
    }

    /// Nearest station to a clicked point; proximity-based disambiguation,
    /// see [`hit_test::nearest_station_to`].
    pub fn nearest_station_to(&self, point: LatLng) -> Option<Station> {
        hit_test::nearest_station_to(point, &self.registry)
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OverlaySnapshot> {
        self.store.subscribe()
    }

    /// Force the coalescing buffer out immediately (shutdown, tests).
    pub fn flush_pending(&self) {
        self.store.flush_pending();
    }

    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        self.store.sweep_expired(now)
    }

    /// Spawn the periodic decay sweep. Runs independently of ingestion.
    pub fn start_sweep(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        info!("Starting decay sweep every {:?}", period);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick completes immediately
            loop {
                interval.tick().await;
                self.sweep_expired(Utc::now());
            }
        })
    }
}
